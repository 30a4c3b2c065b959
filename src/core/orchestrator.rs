use crate::core::{decoder, resolver, verifier};
use crate::domain::model::{AnnotatedRow, RawTable, Record, ResultSet, ServiceType, ValidationStatus};
use crate::domain::ports::{ConfigProvider, TokenVerifier};
use crate::utils::error::{LeadCheckError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum pause between the end of one external call and the start of the next.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_finished: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_finished: None,
        }
    }

    /// 等到上一次呼叫結束後至少 `interval`；第一次呼叫不等待
    pub async fn ready(&mut self) {
        if let Some(last) = self.last_finished {
            tokio::time::sleep_until(last + self.interval).await;
        }
    }

    /// Marks the end of the external call that followed `ready`.
    pub fn finished(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}

/// Drives one validation run: resolves the identifier column once, then
/// checks every row in order with the configured verifier.
///
/// Only decode / column resolution / empty input abort the run. Every
/// per-row problem ends up inside the result set.
pub struct ValidationOrchestrator {
    verifier: Arc<dyn TokenVerifier>,
    pacing: Duration,
}

impl ValidationOrchestrator {
    pub fn new(verifier: Arc<dyn TokenVerifier>, pacing: Duration) -> Self {
        Self { verifier, pacing }
    }

    /// Orchestrator wired to the real service for `service_type`.
    pub fn for_service<C: ConfigProvider + ?Sized>(service_type: ServiceType, config: &C) -> Result<Self> {
        let verifier = verifier::create_verifier(service_type, config)?;
        Ok(Self::new(verifier, config.pacing_delay()))
    }

    pub fn service_type(&self) -> ServiceType {
        self.verifier.service_type()
    }

    /// Decode an upload and validate it.
    pub async fn validate_bytes(&self, bytes: &[u8], filename: &str) -> Result<ResultSet> {
        let table = decoder::decode(bytes, filename)?;
        self.validate(table).await
    }

    pub async fn validate(&self, table: RawTable) -> Result<ResultSet> {
        let service_type = self.service_type();
        if table.is_empty() {
            return Err(LeadCheckError::EmptyTable);
        }

        let token_column = resolver::resolve(&table, service_type)?;
        let total = table.len();
        tracing::info!(
            "🚀 Validating {} rows against {} (column '{}')",
            total,
            service_type,
            token_column
        );

        let mut pacer = Pacer::new(self.pacing);
        let mut rows = Vec::with_capacity(total);

        for (index, row) in table.rows.into_iter().enumerate() {
            let token = row
                .get_str(&token_column)
                .map(str::trim)
                .unwrap_or_default()
                .to_string();

            if token.is_empty() {
                tracing::debug!("Row {}/{}: missing token", index + 1, total);
                rows.push(AnnotatedRow::new(
                    row,
                    ValidationStatus::MissingToken,
                    "Token ID is empty",
                    service_type,
                ));
                continue;
            }

            pacer.ready().await;
            let annotated = self.check_row(row, &token, service_type).await;
            pacer.finished();
            tracing::debug!(
                "Row {}/{}: {} ({})",
                index + 1,
                total,
                annotated.status,
                annotated.message
            );
            rows.push(annotated);
        }

        let result = ResultSet::new(rows);
        let summary = result.summary();
        tracing::info!(
            "✅ {} validation finished: {} total, {} valid, {} invalid",
            service_type,
            summary.total,
            summary.valid,
            summary.invalid
        );
        Ok(result)
    }

    /// 單列驗證；驗證器的非預期錯誤轉成 "Error" 列，不中斷整批
    async fn check_row(&self, row: Record, token: &str, service_type: ServiceType) -> AnnotatedRow {
        match self.verifier.verify(token).await {
            Ok(outcome) => {
                let status = if outcome.valid {
                    ValidationStatus::Valid
                } else {
                    ValidationStatus::Invalid
                };
                AnnotatedRow::new(row, status, outcome.message, service_type)
            }
            Err(e) => {
                tracing::error!("❌ Unexpected verifier failure for {}: {}", token, e);
                AnnotatedRow::new(
                    row,
                    ValidationStatus::Error,
                    format!("Validation error: {}", e),
                    service_type,
                )
            }
        }
    }
}
