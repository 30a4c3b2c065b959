use crate::domain::model::Summary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub output_path: String,
    pub summary: Summary,
}

/// Runs a [`Pipeline`] end to end, optionally logging resource usage per phase.
pub struct ValidationEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ValidationEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("📥 Reading input...");
        let table = self.pipeline.extract().await?;
        tracing::info!("Decoded {} rows", table.len());
        self.monitor.log_stats("Extract");

        tracing::info!("🔎 Validating...");
        let result = self.pipeline.transform(table).await?;
        let summary = result.summary();
        self.monitor.log_stats("Validate");

        tracing::info!("💾 Writing results...");
        let output_path = self.pipeline.load(result).await?;
        self.monitor.log_stats("Export");
        self.monitor.log_final_stats();

        Ok(RunReport {
            output_path,
            summary,
        })
    }
}
