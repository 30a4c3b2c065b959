use crate::core::exporter::{self, ExportFormat};
use crate::core::orchestrator::ValidationOrchestrator;
use crate::core::decoder;
use crate::domain::model::{RawTable, ResultSet};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::Result;

/// File-to-file validation run used by the CLI: read + decode the input,
/// validate every row, write the annotated export into the sink.
pub struct FileValidationPipeline<S: Storage> {
    source: S,
    sink: S,
    input_name: String,
    output_dir: String,
    format: ExportFormat,
    orchestrator: ValidationOrchestrator,
}

impl<S: Storage> FileValidationPipeline<S> {
    pub fn new(
        source: S,
        sink: S,
        input_name: impl Into<String>,
        output_dir: impl Into<String>,
        format: ExportFormat,
        orchestrator: ValidationOrchestrator,
    ) -> Self {
        Self {
            source,
            sink,
            input_name: input_name.into(),
            output_dir: output_dir.into(),
            format,
            orchestrator,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for FileValidationPipeline<S> {
    async fn extract(&self) -> Result<RawTable> {
        tracing::debug!("Reading input file: {}", self.input_name);
        let bytes = self.source.read_file(&self.input_name).await?;
        decoder::decode(&bytes, &self.input_name)
    }

    async fn transform(&self, table: RawTable) -> Result<ResultSet> {
        self.orchestrator.validate(table).await
    }

    async fn load(&self, result: ResultSet) -> Result<String> {
        let bytes = exporter::export(&result.to_records(), self.format)?;
        let file_name = self.format.file_name();

        tracing::debug!("Writing {} ({} bytes) to storage", file_name, bytes.len());
        self.sink.write_file(&file_name, &bytes).await?;

        Ok(format!("{}/{}", self.output_dir.trim_end_matches('/'), file_name))
    }
}
