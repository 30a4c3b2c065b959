use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 一筆資料列：欄位名稱 -> 值，保留欄位插入順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// Decoded upload: the header sequence plus one record per data line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names as seen on the first row, in insertion order.
    pub fn first_row_headers(&self) -> Vec<&str> {
        match self.rows.first() {
            Some(row) => row.keys().map(String::as_str).collect(),
            None => self.headers.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Jornaya,
    TrustedForm,
}

impl ServiceType {
    /// 可接受的欄位名稱（小寫、已 trim）
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ServiceType::Jornaya => &["token", "leadid_token", "leadid", "leadidtoken"],
            ServiceType::TrustedForm => &["certificate", "trustedform", "cert_url", "certid"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Jornaya => "jornaya",
            ServiceType::TrustedForm => "trustedform",
        }
    }

    /// Human label of the identifier column, used in error messages.
    pub fn column_label(&self) -> &'static str {
        match self {
            ServiceType::Jornaya => "LeadID / token",
            ServiceType::TrustedForm => "TrustedForm certificate",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jornaya" => Ok(ServiceType::Jornaya),
            "trustedform" => Ok(ServiceType::TrustedForm),
            other => Err(format!("Unsupported service type: {}", other)),
        }
    }
}

/// Normalised answer of one external verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: String,
    /// Service specific extras (Jornaya token / transid, TrustedForm outcome / reason ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl ValidationOutcome {
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.fields.insert(key.to_string(), value);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Valid,
    Invalid,
    #[serde(rename = "Missing Token ID")]
    MissingToken,
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "Valid",
            ValidationStatus::Invalid => "Invalid",
            ValidationStatus::MissingToken => "Missing Token ID",
            ValidationStatus::Error => "Error",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input row plus its validation annotation. `isValid` is derived from
/// the status so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRow {
    pub row: Record,
    pub status: ValidationStatus,
    pub message: String,
    pub service_type: ServiceType,
    pub validated_at: DateTime<Utc>,
}

impl AnnotatedRow {
    pub fn new(
        row: Record,
        status: ValidationStatus,
        message: impl Into<String>,
        service_type: ServiceType,
    ) -> Self {
        Self {
            row,
            status,
            message: message.into(),
            service_type,
            validated_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    /// 展平成輸出用的記錄：原始欄位在前，註記欄位附加在後
    pub fn to_record(&self) -> Record {
        let mut record = self.row.clone();
        record.insert("validationStatus", self.status.as_str());
        record.insert("isValid", self.is_valid());
        record.insert("validationMessage", self.message.clone());
        record.insert("serviceType", self.service_type.as_str());
        record.insert(
            "validatedAt",
            self.validated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        record
    }
}

impl Serialize for AnnotatedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Ordered annotated rows. The summary is always recomputed from the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    rows: Vec<AnnotatedRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<AnnotatedRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[AnnotatedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let valid = self.rows.iter().filter(|r| r.is_valid()).count();
        Summary {
            total: self.rows.len(),
            valid,
            invalid: self.rows.len() - valid,
        }
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.rows.iter().map(AnnotatedRow::to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(token: &str) -> Record {
        let mut r = Record::new();
        r.insert("token", token);
        r.insert("email", "a@example.com");
        r
    }

    #[test]
    fn test_service_type_parsing() {
        assert_eq!("jornaya".parse::<ServiceType>().unwrap(), ServiceType::Jornaya);
        assert_eq!(" TrustedForm ".parse::<ServiceType>().unwrap(), ServiceType::TrustedForm);
        assert!("leadid".parse::<ServiceType>().is_err());
    }

    #[test]
    fn test_annotated_row_appends_fields_after_original_columns() {
        let annotated = AnnotatedRow::new(row("ABC"), ValidationStatus::Valid, "Valid token", ServiceType::Jornaya);
        let record = annotated.to_record();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec!["token", "email", "validationStatus", "isValid", "validationMessage", "serviceType", "validatedAt"]
        );
        assert_eq!(record.data["isValid"], Value::Bool(true));
        assert_eq!(record.get_str("serviceType"), Some("jornaya"));
        assert!(record.get_str("validatedAt").unwrap().ends_with('Z'));
    }

    #[test]
    fn test_is_valid_only_for_valid_status() {
        for status in [
            ValidationStatus::Valid,
            ValidationStatus::Invalid,
            ValidationStatus::MissingToken,
            ValidationStatus::Error,
        ] {
            let annotated = AnnotatedRow::new(row("x"), status, "", ServiceType::Jornaya);
            assert_eq!(annotated.is_valid(), status == ValidationStatus::Valid);
        }
    }

    #[test]
    fn test_summary_counts_follow_rows() {
        let set = ResultSet::new(vec![
            AnnotatedRow::new(row("a"), ValidationStatus::Valid, "", ServiceType::Jornaya),
            AnnotatedRow::new(row(""), ValidationStatus::MissingToken, "", ServiceType::Jornaya),
            AnnotatedRow::new(row("c"), ValidationStatus::Error, "", ServiceType::Jornaya),
        ]);
        let summary = set.summary();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.valid + summary.invalid, set.len());
    }

    #[test]
    fn test_outcome_skips_null_fields() {
        let outcome = ValidationOutcome::invalid("Invalid token")
            .with_field("token", "abc")
            .with_field("transid", Value::Null);

        assert_eq!(outcome.fields.len(), 1);
        assert_eq!(outcome.fields["token"], Value::String("abc".into()));
    }
}
