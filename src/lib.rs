pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};
pub use config::{AppConfig, LocalStorage};

pub use core::{
    engine::{RunReport, ValidationEngine},
    exporter::ExportFormat,
    orchestrator::ValidationOrchestrator,
    pipeline::FileValidationPipeline,
};
pub use domain::model::{AnnotatedRow, RawTable, Record, ResultSet, ServiceType, ValidationStatus};
pub use server::{create_router, start_server, AppState};
pub use utils::error::{LeadCheckError, Result};
