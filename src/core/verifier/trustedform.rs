use super::{body_message, build_client, describe_transport_error};
use crate::config::toml_config::TrustedFormConfig;
use crate::domain::model::{ServiceType, ValidationOutcome};
use crate::domain::ports::TokenVerifier;
use crate::utils::error::{LeadCheckError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const GENERIC_FAILURE: &str = "Error validating TrustedForm certificate";

static CERT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"trustedform\.com/([^/?#]+)").expect("certificate url pattern is valid")
});

/// Bare certificate id from a certificate URL (`https://cert.trustedform.com/<id>[.html]`)
/// or from an id that is already bare.
pub fn extract_cert_id(input: &str) -> String {
    let input = input.trim();
    match CERT_URL.captures(input) {
        Some(caps) => {
            let id = &caps[1];
            id.strip_suffix(".html").unwrap_or(id).to_string()
        }
        None => input.to_string(),
    }
}

/// Certificate validation: `GET <endpoint>/<cert id>/validate` with basic auth.
pub struct TrustedFormVerifier {
    client: Client,
    endpoint: Url,
    username: String,
    password: String,
}

impl TrustedFormVerifier {
    pub fn new(
        endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| LeadCheckError::InvalidConfigValueError {
            field: "trustedform.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(LeadCheckError::InvalidConfigValueError {
                field: "trustedform.endpoint".to_string(),
                value: endpoint.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn from_config(config: &TrustedFormConfig) -> Result<Self> {
        let (username, password) = config.credentials()?;
        Self::new(&config.endpoint, username, password, config.timeout())
    }

    fn validate_url(&self, cert_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(cert_id).push("validate");
        }
        url
    }

    fn interpret_success(body: &str, cert_id: &str) -> ValidationOutcome {
        let data: Value = match serde_json::from_str(body) {
            Ok(data) => data,
            Err(_) => return ValidationOutcome::invalid("Invalid response format"),
        };

        let outcome = data["outcome"].as_str().unwrap_or_default();
        let reason = data["reason"].as_str();

        let result = if outcome == "success" {
            ValidationOutcome::valid("Valid certificate")
        } else {
            ValidationOutcome::invalid(reason.unwrap_or("Certificate validation failed"))
        };

        result
            .with_field("certId", cert_id)
            .with_field("outcome", data["outcome"].clone())
            .with_field("reason", data["reason"].clone())
    }
}

#[async_trait]
impl TokenVerifier for TrustedFormVerifier {
    fn service_type(&self) -> ServiceType {
        ServiceType::TrustedForm
    }

    async fn verify(&self, certificate: &str) -> Result<ValidationOutcome> {
        let cert_id = extract_cert_id(certificate);
        let url = self.validate_url(&cert_id);
        tracing::debug!("🔎 Validating TrustedForm certificate {} via {}", cert_id, url);

        let response = match self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("TrustedForm request failed for {}: {}", cert_id, e);
                return Ok(ValidationOutcome::invalid(format!(
                    "{}: {}",
                    GENERIC_FAILURE,
                    describe_transport_error(&e)
                ))
                .with_field("certId", cert_id));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let outcome = match status {
            s if s.is_success() => Self::interpret_success(&body, &cert_id),
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("TrustedForm rejected credentials (401)");
                ValidationOutcome::invalid("Authentication failed - check credentials")
                    .with_field("certId", cert_id.as_str())
            }
            StatusCode::NOT_FOUND => ValidationOutcome::invalid("Certificate not found")
                .with_field("certId", cert_id.as_str()),
            other => {
                tracing::warn!("TrustedForm returned {} for {}: {}", other, cert_id, body);
                ValidationOutcome::invalid(
                    body_message(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                )
                .with_field("certId", cert_id.as_str())
            }
        };

        Ok(outcome)
    }
}
