//! External verification services behind the [`TokenVerifier`] port.

pub mod jornaya;
pub mod trustedform;

pub use jornaya::JornayaVerifier;
pub use trustedform::{extract_cert_id, TrustedFormVerifier};

use crate::domain::model::ServiceType;
use crate::domain::ports::{ConfigProvider, TokenVerifier};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds the verifier for `service_type`. Fails with a configuration error
/// when the service's credentials are missing.
pub fn create_verifier<C: ConfigProvider + ?Sized>(
    service_type: ServiceType,
    config: &C,
) -> Result<Arc<dyn TokenVerifier>> {
    let verifier: Arc<dyn TokenVerifier> = match service_type {
        ServiceType::Jornaya => Arc::new(JornayaVerifier::from_config(config.jornaya())?),
        ServiceType::TrustedForm => {
            Arc::new(TrustedFormVerifier::from_config(config.trustedform())?)
        }
    };
    Ok(verifier)
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("leadcheck/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// `message` field of a JSON error body, if any.
pub(crate) fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

pub(crate) fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "could not connect to service".to_string()
    } else {
        e.to_string()
    }
}
