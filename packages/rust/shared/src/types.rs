//! Core domain types for stagechain records.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A unit of input flowing through a pipeline.
///
/// Records are passed by value: every stage consumes one and returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Named fields, e.g. `{"sensor": "temp", "value": 23.5, "unit": "C"}`.
    Structured(Map<String, Value>),
    /// Delimited or opaque text.
    Text(String),
    /// Tokens produced by splitting delimited text.
    Fields(Vec<String>),
    /// A batch of numeric values.
    Numbers(Vec<f64>),
    /// No value at all.
    Absent,
}

/// Shape tag for a [`Record`], used in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Structured,
    Text,
    Fields,
    Numbers,
    Absent,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Structured => "structured",
            Self::Text => "text",
            Self::Fields => "fields",
            Self::Numbers => "numbers",
            Self::Absent => "absent",
        };
        f.write_str(name)
    }
}

impl Record {
    /// Build a structured record from `(name, value)` pairs.
    pub fn structured<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Structured(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a text record.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The shape of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Structured(_) => RecordKind::Structured,
            Self::Text(_) => RecordKind::Text,
            Self::Fields(_) => RecordKind::Fields,
            Self::Numbers(_) => RecordKind::Numbers,
            Self::Absent => RecordKind::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Borrow the field map of a structured record.
    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Structured(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the text of a text record.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value into a record.
    ///
    /// Objects become `Structured`, strings `Text`, `null` `Absent`. Arrays must
    /// be homogeneous: all strings (`Fields`) or all numbers (`Numbers`).
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::Structured(map)),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Null => Ok(Self::Absent),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    let fields = items
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s),
                            _ => None,
                        })
                        .collect();
                    Ok(Self::Fields(fields))
                } else if items.iter().all(Value::is_number) {
                    Ok(Self::Numbers(items.iter().filter_map(Value::as_f64).collect()))
                } else {
                    Err(PipelineError::parse(
                        "arrays must contain only strings or only numbers",
                    ))
                }
            }
            other => Err(PipelineError::parse(format!(
                "unsupported record value: {other}"
            ))),
        }
    }

    /// Convert this record back into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Structured(map) => Value::Object(map.clone()),
            Self::Text(s) => Value::String(s.clone()),
            Self::Fields(fields) => {
                Value::Array(fields.iter().cloned().map(Value::String).collect())
            }
            Self::Numbers(values) => Value::Array(
                values
                    .iter()
                    .map(|v| serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number))
                    .collect(),
            ),
            Self::Absent => Value::Null,
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Record {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Record {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<f64>> for Record {
    fn from(values: Vec<f64>) -> Self {
        Self::Numbers(values)
    }
}

// ---------------------------------------------------------------------------
// Record files
// ---------------------------------------------------------------------------

/// Load a JSON array of records from disk.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    parse_records(&content)
        .map_err(|e| PipelineError::parse(format!("failed to parse {}: {e}", path.display())))
}

/// Parse a JSON array of records.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PipelineError::parse(e.to_string()))?;
    match value {
        Value::Array(items) => items.into_iter().map(Record::from_json).collect(),
        _ => Err(PipelineError::parse("expected a JSON array of records")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_shapes_map_to_records() {
        let rec = Record::from_json(json!({"sensor": "temp"})).expect("object");
        assert_eq!(rec.kind(), RecordKind::Structured);

        let rec = Record::from_json(json!("user,action,timestamp")).expect("string");
        assert_eq!(rec.as_text(), Some("user,action,timestamp"));

        let rec = Record::from_json(json!(["a", "b"])).expect("fields");
        assert_eq!(rec, Record::Fields(vec!["a".into(), "b".into()]));

        let rec = Record::from_json(json!([1, 2.5])).expect("numbers");
        assert_eq!(rec, Record::Numbers(vec![1.0, 2.5]));

        assert!(Record::from_json(Value::Null).expect("null").is_absent());
    }

    #[test]
    fn mixed_array_is_rejected() {
        let err = Record::from_json(json!(["a", 1])).unwrap_err();
        assert!(err.to_string().contains("only strings or only numbers"));
        assert!(Record::from_json(json!(true)).is_err());
    }

    #[test]
    fn display_uses_raw_text_and_json_otherwise() {
        assert_eq!(Record::text("hello").to_string(), "hello");
        let rec = Record::structured([("unit", json!("C"))]);
        assert_eq!(rec.to_string(), r#"{"unit":"C"}"#);
        assert_eq!(Record::Absent.to_string(), "null");
    }

    #[test]
    fn parse_records_requires_array() {
        assert!(parse_records(r#"{"sensor": "temp"}"#).is_err());
        let records = parse_records(r#"[{"a": 1}, "x", null]"#).expect("parse");
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn records_fixture_loads() {
        let records = load_records(Path::new("../../../fixtures/json/records.fixture.json"))
            .expect("load fixture");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind(), RecordKind::Structured);
        assert_eq!(records[1].as_text(), Some("user,action,timestamp"));
        assert_eq!(records[2].as_text(), Some("Real-time sensor stream"));
    }
}
