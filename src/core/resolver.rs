use crate::domain::model::{RawTable, ServiceType};
use crate::utils::error::{LeadCheckError, Result};

/// Finds the identifier column for `service_type`.
///
/// Headers are scanned in table order and compared case-insensitively after
/// trimming; the first header in the alias set wins, whatever its position
/// in the alias list.
pub fn resolve(table: &RawTable, service_type: ServiceType) -> Result<String> {
    let aliases = service_type.aliases();

    table
        .first_row_headers()
        .into_iter()
        .find(|header| aliases.contains(&header.trim().to_lowercase().as_str()))
        .map(str::to_string)
        .ok_or(LeadCheckError::NoTokenColumn {
            service: service_type,
        })
}
