use crate::domain::model::ServiceType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadCheckError {
    #[error("Unsupported file format: {filename}")]
    UnsupportedFormat { filename: String },

    #[error("No valid {} column found in file", .service.column_label())]
    NoTokenColumn { service: ServiceType },

    #[error("No tokens found in file")]
    EmptyTable,

    #[error("Export failed: {message}")]
    ExportFailure { message: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet read error: {message}")]
    SpreadsheetError { message: String },

    #[error("Spreadsheet write error: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 使用者上傳或請求內容有問題
    Input,
    Configuration,
    /// 外部服務或網路
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LeadCheckError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LeadCheckError::UnsupportedFormat { .. }
            | LeadCheckError::NoTokenColumn { .. }
            | LeadCheckError::EmptyTable
            | LeadCheckError::InvalidRequest { .. } => ErrorCategory::Input,
            LeadCheckError::ConfigError { .. }
            | LeadCheckError::InvalidConfigValueError { .. }
            | LeadCheckError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            LeadCheckError::ApiError(_) => ErrorCategory::External,
            LeadCheckError::ExportFailure { .. }
            | LeadCheckError::CsvError(_)
            | LeadCheckError::SpreadsheetError { .. }
            | LeadCheckError::XlsxError(_)
            | LeadCheckError::IoError(_)
            | LeadCheckError::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::External => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// Errors that abort a whole validation run with no partial results.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            LeadCheckError::UnsupportedFormat { .. }
                | LeadCheckError::NoTokenColumn { .. }
                | LeadCheckError::EmptyTable
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            LeadCheckError::UnsupportedFormat { .. } => {
                "Upload a CSV or XLSX file with a header row".to_string()
            }
            LeadCheckError::NoTokenColumn { service } => format!(
                "Rename the identifier column to one of: {}",
                service.aliases().join(", ")
            ),
            LeadCheckError::EmptyTable => "Add at least one data row below the header".to_string(),
            LeadCheckError::InvalidRequest { .. } => "Check the request parameters".to_string(),
            LeadCheckError::ApiError(_) => {
                "Check network connectivity to the verification service and retry".to_string()
            }
            LeadCheckError::ConfigError { .. }
            | LeadCheckError::InvalidConfigValueError { .. }
            | LeadCheckError::ConfigValidationError { .. } => {
                "Check the configuration file and the JORNAYA_* / TRUSTEDFORM_* environment variables"
                    .to_string()
            }
            LeadCheckError::ExportFailure { .. } => {
                "Export a non-empty result set produced by a validation run".to_string()
            }
            _ => "Check the logs for details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => self.to_string(),
            ErrorCategory::External => {
                format!("Verification service unavailable: {}", self)
            }
            ErrorCategory::Internal => format!("Internal error: {}", self),
        }
    }
}

impl From<calamine::Error> for LeadCheckError {
    fn from(e: calamine::Error) -> Self {
        LeadCheckError::SpreadsheetError {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LeadCheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_token_column_message_names_service() {
        let err = LeadCheckError::NoTokenColumn {
            service: ServiceType::TrustedForm,
        };
        assert_eq!(
            err.to_string(),
            "No valid TrustedForm certificate column found in file"
        );
        assert!(err.recovery_suggestion().contains("cert_url"));
    }

    #[test]
    fn test_batch_fatal_errors_are_input_errors() {
        let errors = [
            LeadCheckError::UnsupportedFormat {
                filename: "x.bin".into(),
            },
            LeadCheckError::NoTokenColumn {
                service: ServiceType::Jornaya,
            },
            LeadCheckError::EmptyTable,
        ];
        for err in errors {
            assert!(err.is_batch_fatal());
            assert_eq!(err.category(), ErrorCategory::Input);
            assert_eq!(err.severity(), ErrorSeverity::High);
        }
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = LeadCheckError::ConfigError {
            message: "TrustedForm username is not configured".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_batch_fatal());
    }
}
