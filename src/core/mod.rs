pub mod decoder;
pub mod engine;
pub mod exporter;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;
pub mod verifier;

pub use crate::domain::model::{AnnotatedRow, RawTable, Record, ResultSet, ServiceType};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage, TokenVerifier};
pub use crate::utils::error::Result;
