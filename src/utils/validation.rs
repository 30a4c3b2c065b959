use crate::utils::error::{LeadCheckError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Extensions accepted for uploads (lower-case, without the dot).
pub const UPLOAD_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> LeadCheckError {
    LeadCheckError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Verification endpoints must be absolute http(s) URLs with a host.
pub fn validate_endpoint(field: &str, endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| invalid(field, endpoint, format!("Invalid URL format: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            endpoint,
            format!("Unsupported URL scheme: {}", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(field, endpoint, "URL has no host"));
    }
    Ok(())
}

pub fn validate_dir_path(field: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field, path.escape_default(), "Path contains null bytes"));
    }
    Ok(())
}

/// Inclusive bounds check for numeric settings.
pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// 檢查上傳檔名的副檔名（不分大小寫）
pub fn validate_upload_extension(filename: &str, allowed_extensions: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension {
        Some(ext) if allowed_extensions.contains(&ext.as_str()) => Ok(()),
        _ => Err(LeadCheckError::InvalidRequest {
            message: "Only CSV and Excel files are allowed".to_string(),
        }),
    }
}
