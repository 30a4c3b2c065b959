use super::{body_message, build_client, describe_transport_error};
use crate::config::toml_config::JornayaConfig;
use crate::domain::model::{ServiceType, ValidationOutcome};
use crate::domain::ports::TokenVerifier;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const GENERIC_FAILURE: &str = "Error validating Jornaya token";
const INVALID_FORMAT: &str = "Invalid response format";

/// LeadID `Authenticate` call: `GET <endpoint>?lac=<licence>&id=<token>`.
pub struct JornayaVerifier {
    client: Client,
    endpoint: String,
    lac: String,
}

impl JornayaVerifier {
    pub fn new(endpoint: impl Into<String>, lac: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            lac: lac.into(),
        })
    }

    pub fn from_config(config: &JornayaConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.lac()?, config.timeout())
    }

    /// 解讀回應內容；body 可能是 JSON，也可能是被包成字串的 JSON
    pub fn interpret_response(body: &str) -> ValidationOutcome {
        let data = match parse_json_body(body) {
            Some(data) => data,
            None => return ValidationOutcome::invalid(INVALID_FORMAT),
        };

        let authenticate = match data.get("authenticate") {
            Some(authenticate) if authenticate.is_object() => authenticate,
            _ => return ValidationOutcome::invalid(INVALID_FORMAT),
        };

        let authentic = match authenticate.get("authentic").and_then(coerce_number) {
            Some(authentic) => authentic,
            None => return ValidationOutcome::invalid(INVALID_FORMAT),
        };

        let outcome = if authentic == 1.0 {
            ValidationOutcome::valid("Valid token")
        } else {
            ValidationOutcome::invalid("Invalid token")
        };

        outcome
            .with_field("token", authenticate["token"].clone())
            .with_field("transid", data["transid"].clone())
    }
}

fn parse_json_body(body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body).ok()? {
        Value::String(inner) => serde_json::from_str(&inner).ok(),
        other => Some(other),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[async_trait]
impl TokenVerifier for JornayaVerifier {
    fn service_type(&self) -> ServiceType {
        ServiceType::Jornaya
    }

    async fn verify(&self, token: &str) -> Result<ValidationOutcome> {
        tracing::debug!("🔎 Authenticating Jornaya token {}", token);

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("lac", self.lac.as_str()), ("id", token)])
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Jornaya request failed for {}: {}", token, e);
                return Ok(ValidationOutcome::invalid(format!(
                    "{}: {}",
                    GENERIC_FAILURE,
                    describe_transport_error(&e)
                )));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Jornaya response unreadable for {}: {}", token, e);
                return Ok(ValidationOutcome::invalid(format!(
                    "{}: {}",
                    GENERIC_FAILURE,
                    describe_transport_error(&e)
                )));
            }
        };

        if !status.is_success() {
            tracing::warn!("Jornaya returned {} for {}", status, token);
            return Ok(ValidationOutcome::invalid(
                body_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }

        Ok(Self::interpret_response(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn verifier(server: &MockServer) -> JornayaVerifier {
        JornayaVerifier::new(server.url("/Authenticate"), "LAC-1", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_interpret_authentic_number() {
        let outcome = JornayaVerifier::interpret_response(
            r#"{"authenticate":{"authentic":1,"token":"ABC"},"transid":"T-1"}"#,
        );
        assert!(outcome.valid);
        assert_eq!(outcome.message, "Valid token");
        assert_eq!(outcome.fields["token"], json!("ABC"));
        assert_eq!(outcome.fields["transid"], json!("T-1"));
    }

    #[test]
    fn test_interpret_authentic_string_and_zero() {
        assert!(JornayaVerifier::interpret_response(r#"{"authenticate":{"authentic":"1"}}"#).valid);

        let outcome = JornayaVerifier::interpret_response(r#"{"authenticate":{"authentic":0}}"#);
        assert!(!outcome.valid);
        assert_eq!(outcome.message, "Invalid token");
    }

    #[test]
    fn test_interpret_json_as_string() {
        let body = serde_json::to_string(r#"{"authenticate":{"authentic":1}}"#).unwrap();
        assert!(JornayaVerifier::interpret_response(&body).valid);
    }

    #[test]
    fn test_interpret_shape_mismatch() {
        for body in [
            "not json",
            r#"{"result":"ok"}"#,
            r#"{"authenticate":"yes"}"#,
            r#"{"authenticate":{"authentic":"maybe"}}"#,
            r#"{"authenticate":{}}"#,
        ] {
            let outcome = JornayaVerifier::interpret_response(body);
            assert!(!outcome.valid, "{}", body);
            assert_eq!(outcome.message, "Invalid response format");
        }
    }

    #[tokio::test]
    async fn test_verify_sends_licence_and_token() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/Authenticate")
                .query_param("lac", "LAC-1")
                .query_param("id", "ABC123")
                .header("accept", "application/json");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"authenticate": {"authentic": 1, "token": "ABC123"}, "transid": "tx"}));
        });

        let outcome = verifier(&server).verify("ABC123").await.unwrap();

        api_mock.assert();
        assert!(outcome.valid);
        assert_eq!(outcome.fields["transid"], json!("tx"));
    }

    #[tokio::test]
    async fn test_verify_http_error_uses_body_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/Authenticate");
            then.status(403).json_body(json!({"message": "Invalid lac"}));
        });

        let outcome = verifier(&server).verify("ABC123").await.unwrap();

        assert!(!outcome.valid);
        assert_eq!(outcome.message, "Invalid lac");
    }

    #[tokio::test]
    async fn test_verify_http_error_without_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/Authenticate");
            then.status(500).body("boom");
        });

        let outcome = verifier(&server).verify("ABC123").await.unwrap();

        assert!(!outcome.valid);
        assert_eq!(outcome.message, "Error validating Jornaya token");
    }

    #[tokio::test]
    async fn test_verify_timeout_is_graceful() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/Authenticate");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"authenticate": {"authentic": 1}}));
        });

        let verifier =
            JornayaVerifier::new(server.url("/Authenticate"), "LAC-1", Duration::from_millis(50)).unwrap();
        let outcome = verifier.verify("ABC123").await.unwrap();

        assert!(!outcome.valid);
        assert!(outcome.message.starts_with("Error validating Jornaya token"));
    }

    #[tokio::test]
    async fn test_verify_unreachable_service_is_graceful() {
        let verifier =
            JornayaVerifier::new("http://127.0.0.1:9/Authenticate", "LAC-1", Duration::from_secs(2)).unwrap();
        let outcome = verifier.verify("ABC123").await.unwrap();

        assert!(!outcome.valid);
        assert!(outcome.message.starts_with("Error validating Jornaya token"));
    }
}
