//! Opaque telemetry records.
//!
//! The pipeline never looks inside a record. It only needs to move it to the
//! submitter intact and serialize it into the submitter's wire shape.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// One unit of telemetry, e.g. a vulnerability finding.
///
/// Immutable once handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(serde_json::Value);

impl From<serde_json::Value> for Record {
    fn from(value: serde_json::Value) -> Self {
        Record(value)
    }
}

/// Parse a JSON array of records.
///
/// Every element has to be an object; the content of the objects is not
/// validated.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let serde_json::Value::Array(items) = value else {
        return Err(IngestError::config(
            "data file must contain a JSON array of records",
        ));
    };

    if let Some(position) = items.iter().position(|item| !item.is_object()) {
        return Err(IngestError::config(format!(
            "record {} is not a JSON object",
            position + 1
        )));
    }

    Ok(items.into_iter().map(Record).collect())
}

/// Load records from a JSON data file.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    parse_records(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_records_keeps_order_and_content() {
        let records = parse_records(
            r#"[{"VulnId":"CVE-2024-10001","CVSS":9.8},{"VulnId":"CVE-2024-10002"}]"#,
        )
        .unwrap();

        assert_eq!(
            records,
            vec![
                Record::from(json!({"VulnId": "CVE-2024-10001", "CVSS": 9.8})),
                Record::from(json!({"VulnId": "CVE-2024-10002"})),
            ]
        );
    }

    #[test]
    fn test_parse_records_rejects_non_array() {
        let err = parse_records(r#"{"VulnId":"CVE-2024-10001"}"#).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn test_parse_records_rejects_scalar_element() {
        let err = parse_records(r#"[{"a":1}, 2]"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: record 2 is not a JSON object"
        );
    }

    #[test]
    fn test_parse_records_invalid_json() {
        let err = parse_records("[{").unwrap_err();
        assert!(matches!(err, IngestError::Serialization(_)));
    }

    #[test]
    fn test_record_serializes_transparently() {
        let record = Record::from(json!({"Severity": "High"}));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"Severity":"High"}"#
        );
    }
}
