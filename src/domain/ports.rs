use crate::config::toml_config::{JornayaConfig, TrustedFormConfig};
use crate::domain::model::{RawTable, ResultSet, ServiceType, ValidationOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn jornaya(&self) -> &JornayaConfig;
    fn trustedform(&self) -> &TrustedFormConfig;
    fn pacing_delay(&self) -> Duration;
}

/// One external verification service.
///
/// Expected failures (transport errors, 401/404, malformed bodies) come back
/// as `Ok` with `valid == false`; `Err` is reserved for unexpected failures
/// and is turned into an "Error" row by the orchestrator.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    fn service_type(&self) -> ServiceType;
    async fn verify(&self, identifier: &str) -> Result<ValidationOutcome>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawTable>;
    async fn transform(&self, table: RawTable) -> Result<ResultSet>;
    async fn load(&self, result: ResultSet) -> Result<String>;
}
