use crate::domain::model::Record;
use crate::utils::error::{LeadCheckError, Result};
use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const SHEET_NAME: &str = "Validation Results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    /// `validation-results-<millis>.<ext>`
    pub fn file_name(&self) -> String {
        format!(
            "validation-results-{}.{}",
            Utc::now().timestamp_millis(),
            self.extension()
        )
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Excel => f.write_str("excel"),
        }
    }
}

/// Serialises annotated records. Headers are the first record's keys; later
/// records are looked up by those keys (missing -> empty, extra keys dropped).
pub fn export(records: &[Record], format: ExportFormat) -> Result<Vec<u8>> {
    let headers: Vec<String> = match records.first() {
        Some(first) => first.keys().cloned().collect(),
        None => {
            return Err(LeadCheckError::ExportFailure {
                message: "no results to export".to_string(),
            })
        }
    };

    tracing::debug!("Exporting {} rows as {}", records.len(), format);
    match format {
        ExportFormat::Csv => export_csv(&headers, records),
        ExportFormat::Excel => export_excel(&headers, records),
    }
}

fn export_csv(headers: &[String], records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for record in records {
        writer.write_record(
            headers
                .iter()
                .map(|h| cell_text(record.data.get(h).unwrap_or(&Value::Null))),
        )?;
    }

    writer.into_inner().map_err(|e| LeadCheckError::ExportFailure {
        message: e.to_string(),
    })
}

fn export_excel(headers: &[String], records: &[Record]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, column_index(col)?, header, &header_format)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = u32::try_from(index + 1).map_err(|_| LeadCheckError::ExportFailure {
            message: "too many rows for a worksheet".to_string(),
        })?;
        for (col, header) in headers.iter().enumerate() {
            let col = column_index(col)?;
            match record.data.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(row, col, f)?;
                    }
                    None => {
                        worksheet.write_string(row, col, n.to_string())?;
                    }
                },
                Some(other) => {
                    worksheet.write_string(row, col, cell_text(other))?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| LeadCheckError::ExportFailure {
        message: "too many columns for a worksheet".to_string(),
    })
}

/// 儲存格文字；null 為空字串，巢狀值輸出為 JSON
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
