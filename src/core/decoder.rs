//! Upload decoding: bytes + original filename -> [`RawTable`].
//!
//! Uploads are sometimes mislabeled, so the format is picked by a fallback
//! chain rather than by extension alone:
//!
//! 1. `*.csv` names are tried as CSV first.
//! 2. Anything else (or a CSV attempt with no rows) is tried as a workbook,
//!    first sheet only.
//! 3. CSV again regardless of extension, for spreadsheet-named text files.
//!
//! Header names are trimmed. When two headers collide after trimming the
//! first column wins and the later column's values are not reachable by name.

use crate::domain::model::{RawTable, Record};
use crate::utils::error::{LeadCheckError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, Timelike};
use std::io::Cursor;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

pub fn decode(bytes: &[u8], filename: &str) -> Result<RawTable> {
    let named_csv = filename.to_lowercase().ends_with(".csv");

    if named_csv {
        if let Some(table) = try_parse_csv(bytes) {
            tracing::debug!("📄 {}: decoded {} CSV rows", filename, table.len());
            return Ok(table);
        }
    }

    match try_parse_spreadsheet(bytes) {
        Ok(Some(table)) => {
            tracing::debug!("📄 {}: decoded {} spreadsheet rows", filename, table.len());
            return Ok(table);
        }
        Ok(None) => tracing::debug!("📄 {}: first sheet has no data rows", filename),
        Err(e) => tracing::debug!("📄 {}: not a readable workbook: {}", filename, e),
    }

    // 副檔名不是 csv 的最後再試一次 CSV
    if !named_csv {
        if let Some(table) = try_parse_csv(bytes) {
            tracing::debug!(
                "📄 {}: decoded {} CSV rows despite spreadsheet extension",
                filename,
                table.len()
            );
            return Ok(table);
        }
    }

    Err(LeadCheckError::UnsupportedFormat {
        filename: filename.to_string(),
    })
}

/// CSV with a header row. Returns `None` unless at least one data row exists.
/// Non UTF-8 input is never treated as CSV.
fn try_parse_csv(bytes: &[u8]) -> Option<RawTable> {
    let text = std::str::from_utf8(bytes).ok()?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return None;
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("CSV decode stopped: {}", e);
                return None;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        rows.push(build_record(&headers, cells));
    }

    finish_table(headers, rows)
}

/// First worksheet of an xlsx / xls / ods workbook, first row as headers.
fn try_parse_spreadsheet(bytes: &[u8]) -> Result<Option<RawTable>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(None),
    };

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect(),
        None => return Ok(None),
    };

    let rows = sheet_rows
        .filter(|cells| cells.iter().any(|cell| !cell_to_string(cell).trim().is_empty()))
        .map(|cells| build_record(&headers, cells.iter().map(cell_to_string).collect()))
        .collect();

    Ok(finish_table(headers, rows))
}

fn finish_table(headers: Vec<String>, rows: Vec<Record>) -> Option<RawTable> {
    if rows.is_empty() {
        return None;
    }
    let mut unique = Vec::with_capacity(headers.len());
    for header in headers {
        if !unique.contains(&header) {
            unique.push(header);
        }
    }
    Some(RawTable {
        headers: unique,
        rows,
    })
}

/// 依表頭順序建立記錄；缺值補空字串，重複表頭以第一個為準
fn build_record(headers: &[String], cells: Vec<String>) -> Record {
    let mut cells = cells.into_iter();
    let mut record = Record::new();
    for header in headers {
        let value = cells.next().unwrap_or_default();
        if !record.data.contains_key(header) {
            record.insert(header.clone(), value);
        }
    }
    record
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) if !dt.is_duration() => match dt.as_datetime() {
            Some(datetime) => format_datetime(datetime),
            None => cell.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 日期格式的儲存格轉成 ISO 字串；午夜只保留日期
fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.hour() == 0 && datetime.minute() == 0 && datetime.second() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Picks the most frequent candidate delimiter on the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header_line = text.lines().next().unwrap_or_default();
    DELIMITER_CANDIDATES
        .iter()
        .map(|&d| (d, header_line.bytes().filter(|&b| b == d).count()))
        .fold((b',', 0), |best, (d, count)| if count > best.1 { (d, count) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn xlsx_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_csv_rows_follow_header_order() {
        let table = decode(b"token,email,phone\nABC,a@x.com,555\nDEF,b@x.com,556\n", "leads.csv").unwrap();

        assert_eq!(table.headers, vec!["token", "email", "phone"]);
        assert_eq!(table.len(), 2);
        let keys: Vec<&str> = table.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["token", "email", "phone"]);
        assert_eq!(table.rows[1].get_str("email"), Some("b@x.com"));
    }

    #[test]
    fn test_csv_skips_blank_lines() {
        let table = decode(b"token,email\n\nABC,a@x.com\n,\n\nDEF,\n", "leads.csv").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1].get_str("token"), Some("DEF"));
        assert_eq!(table.rows[1].get_str("email"), Some(""));
    }

    #[test]
    fn test_csv_keeps_empty_token_when_other_cells_present() {
        let table = decode(b"token,name\nABC123,a\n,b\nXYZ789,c\n", "leads.csv").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[1].get_str("token"), Some(""));
    }

    #[test]
    fn test_csv_sniffs_semicolon_delimiter() {
        let table = decode(b"LeadID;Email\nABC;a@x.com\n", "leads.csv").unwrap();

        assert_eq!(table.headers, vec!["LeadID", "Email"]);
        assert_eq!(table.rows[0].get_str("LeadID"), Some("ABC"));
    }

    #[test]
    fn test_csv_strips_bom_and_trims_headers() {
        let table = decode("\u{feff} token ,email\nABC,a@x.com\n".as_bytes(), "leads.csv").unwrap();

        assert_eq!(table.headers, vec!["token", "email"]);
        assert_eq!(table.rows[0].get_str("token"), Some("ABC"));
    }

    #[test]
    fn test_csv_ragged_rows_are_padded() {
        let table = decode(b"token,email,phone\nABC\nDEF,d@x.com,1,extra\n", "leads.csv").unwrap();

        assert_eq!(table.rows[0].get_str("phone"), Some(""));
        assert_eq!(table.rows[1].get_str("phone"), Some("1"));
        assert_eq!(table.rows[1].data.len(), 3);
    }

    #[test]
    fn test_duplicate_headers_first_wins() {
        let table = decode(b"token, token ,email\nFIRST,SECOND,a@x.com\n", "leads.csv").unwrap();

        assert_eq!(table.headers, vec!["token", "email"]);
        assert_eq!(table.rows[0].get_str("token"), Some("FIRST"));
        assert_eq!(table.rows[0].data.len(), 2);
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let table = decode(b"certificate,note\n\"https://cert.trustedform.com/abc\",\"a, \"\"quoted\"\" note\"\n", "certs.csv").unwrap();

        assert_eq!(table.rows[0].get_str("note"), Some("a, \"quoted\" note"));
    }

    #[test]
    fn test_xlsx_first_sheet_with_missing_cells() {
        let bytes = xlsx_bytes(&[
            &["certificate", "email"],
            &["https://cert.trustedform.com/abcde12345.html", ""],
            &["", ""],
            &["bare-id", "b@x.com"],
        ]);

        let table = decode(&bytes, "certs.xlsx").unwrap();

        assert_eq!(table.headers, vec!["certificate", "email"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].get_str("email"), Some(""));
        assert_eq!(table.rows[1].get_str("certificate"), Some("bare-id"));
    }

    #[test]
    fn test_xlsx_numbers_and_booleans_are_stringified() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "token").unwrap();
        worksheet.write_string(0, 1, "score").unwrap();
        worksheet.write_string(0, 2, "flag").unwrap();
        worksheet.write_number(1, 0, 12345.0).unwrap();
        worksheet.write_number(1, 1, 0.5).unwrap();
        worksheet.write_boolean(1, 2, true).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = decode(&bytes, "numbers.xlsx").unwrap();

        assert_eq!(table.rows[0].get_str("token"), Some("12345"));
        assert_eq!(table.rows[0].get_str("score"), Some("0.5"));
        assert_eq!(table.rows[0].get_str("flag"), Some("true"));
    }

    #[test]
    fn test_workbook_named_csv_still_decodes() {
        let bytes = xlsx_bytes(&[&["token"], &["ABC"]]);

        let table = decode(&bytes, "mislabeled.csv").unwrap();

        assert_eq!(table.rows[0].get_str("token"), Some("ABC"));
    }

    #[test]
    fn test_csv_text_named_xlsx_falls_back_to_csv() {
        let table = decode(b"token\nABC\n", "really-text.xlsx").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].get_str("token"), Some("ABC"));
    }

    #[test]
    fn test_header_only_is_unsupported() {
        let err = decode(b"token,email\n", "empty.csv").unwrap_err();
        assert!(matches!(err, LeadCheckError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_binary_garbage_is_unsupported() {
        let bytes: Vec<u8> = vec![0xff, 0xfe, 0x00, 0x9c, 0x12, 0x80, 0x0a, 0xc3];
        let err = decode(&bytes, "upload.xlsx").unwrap_err();
        assert!(matches!(err, LeadCheckError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_empty_input_is_unsupported() {
        assert!(decode(b"", "empty.csv").is_err());
        assert!(decode(b"", "empty.xlsx").is_err());
    }

    #[test]
    fn test_date_cells_decode_as_iso_strings() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let stamp_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        worksheet.write_string(0, 0, "token").unwrap();
        worksheet.write_string(0, 1, "lead_date").unwrap();
        worksheet.write_string(1, 0, "ABC").unwrap();
        let date = ExcelDateTime::from_ymd(2024, 5, 17).unwrap();
        worksheet.write_datetime_with_format(1, 1, &date, &date_format).unwrap();
        worksheet.write_string(2, 0, "DEF").unwrap();
        let stamp = ExcelDateTime::from_ymd(2024, 5, 17)
            .unwrap()
            .and_hms(14, 30, 0)
            .unwrap();
        worksheet.write_datetime_with_format(2, 1, &stamp, &stamp_format).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = decode(&bytes, "leads.xlsx").unwrap();
        assert_eq!(table.rows[0].get_str("lead_date"), Some("2024-05-17"));
        assert_eq!(table.rows[1].get_str("lead_date"), Some("2024-05-17T14:30:00"));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(sniff_delimiter("a;b;c"), b';');
        assert_eq!(sniff_delimiter("a\tb"), b'\t');
        assert_eq!(sniff_delimiter("token"), b',');
    }
}
