//! Structured sensor readings.

use serde_json::{Value, json};
use stagechain_shared::{Record, Result};

use super::{RecordFormat, invalid_format};

/// Accepts structured records and reports temperature readings.
///
/// After the stage chain the record must carry `sensor: "temp"`, a numeric
/// `value` and a string `unit`. The `valid` flag set by enrichment decides
/// whether the reading is reported in the normal range.
pub struct StructuredFormat;

impl RecordFormat for StructuredFormat {
    fn name(&self) -> &str {
        "structured"
    }

    fn describe(&self) -> &str {
        "Enriched with metadata and validation"
    }

    fn accepts(&self, record: &Record) -> Result<()> {
        match record {
            Record::Structured(_) => Ok(()),
            _ => Err(invalid_format()),
        }
    }

    fn summarize(&self, output: Record) -> Result<String> {
        let map = output.as_structured().ok_or_else(invalid_format)?;

        if map.get("sensor").and_then(Value::as_str) != Some("temp") {
            return Err(invalid_format());
        }
        let value = map
            .get("value")
            .filter(|v| v.is_number())
            .ok_or_else(invalid_format)?;
        let unit = map
            .get("unit")
            .and_then(Value::as_str)
            .ok_or_else(invalid_format)?;
        let status = match map.get("valid").and_then(Value::as_bool) {
            Some(true) => "Normal",
            _ => "Abnormal",
        };

        Ok(format!(
            "Processed temperature reading: {value}°{unit} ({status} range)"
        ))
    }

    fn representative(&self) -> Record {
        Record::structured([
            ("sensor", json!("temp")),
            ("value", json!(23.5)),
            ("unit", json!("C")),
        ])
    }

    /// Structured pipelines consume whatever the previous pipeline produced.
    fn chain_input(&self, carried: Record) -> Record {
        carried
    }
}
