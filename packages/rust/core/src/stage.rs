//! Stage trait and the built-in stage library.
//!
//! A stage is a pure `Record -> Record` transformation. Stages hold no mutable
//! state, so a single instance is shared (`Arc<dyn Stage>`) by every pipeline
//! it is attached to.

use std::sync::Arc;

use serde_json::Value;
use stagechain_shared::{DEFAULT_SENTINEL, PipelineConfig, PipelineError, Record, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A single transformation step in a pipeline.
pub trait Stage: Send + Sync {
    /// Transform `record` into a new record.
    ///
    /// Returns [`PipelineError::StageExecution`] when the input does not have
    /// the shape this stage expects.
    fn process(&self, record: Record) -> Result<Record>;

    /// Human-readable stage name for tracing.
    fn name(&self) -> &str;
}

/// A stage shared between pipelines.
pub type SharedStage = Arc<dyn Stage>;

/// Wrap a stage for attachment to one or more pipelines.
pub fn shared<S: Stage + 'static>(stage: S) -> SharedStage {
    Arc::new(stage)
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Rejects absent input, passes everything else through.
pub struct InputStage;

impl Stage for InputStage {
    fn process(&self, record: Record) -> Result<Record> {
        if record.is_absent() {
            return Err(PipelineError::stage(self.name(), "data is absent"));
        }
        Ok(record)
    }

    fn name(&self) -> &str {
        "input"
    }
}

// ---------------------------------------------------------------------------
// Multi-format transform
// ---------------------------------------------------------------------------

/// Format-aware transform used by the standard three-pipeline setup.
///
/// - structured records gain a `valid: true` flag
/// - the sentinel text passes through unchanged
/// - any other text is split on the delimiter
/// - every other shape passes through
pub struct TransformStage {
    delimiter: char,
    sentinel: String,
}

impl TransformStage {
    pub fn new(delimiter: char, sentinel: impl Into<String>) -> Self {
        Self {
            delimiter,
            sentinel: sentinel.into(),
        }
    }
}

impl Default for TransformStage {
    fn default() -> Self {
        Self::new(',', DEFAULT_SENTINEL)
    }
}

impl From<&PipelineConfig> for TransformStage {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(config.delimiter, config.sentinel.clone())
    }
}

impl Stage for TransformStage {
    fn process(&self, record: Record) -> Result<Record> {
        Ok(match record {
            Record::Structured(map) => Record::Structured(mark_valid(map)),
            Record::Text(text) if text == self.sentinel => Record::Text(text),
            Record::Text(text) => Record::Fields(split_fields(&text, self.delimiter)),
            other => other,
        })
    }

    fn name(&self) -> &str {
        "transform"
    }
}

// ---------------------------------------------------------------------------
// Single-format stages
// ---------------------------------------------------------------------------

/// Adds `valid: true` to a structured record. Any other shape is an error.
pub struct EnrichStage;

impl Stage for EnrichStage {
    fn process(&self, record: Record) -> Result<Record> {
        match record {
            Record::Structured(map) => Ok(Record::Structured(mark_valid(map))),
            other => Err(PipelineError::stage(
                self.name(),
                format!("expected structured record, got {}", other.kind()),
            )),
        }
    }

    fn name(&self) -> &str {
        "enrich"
    }
}

/// Splits text into fields on a delimiter. Any other shape is an error.
pub struct SplitStage {
    delimiter: char,
}

impl SplitStage {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl Default for SplitStage {
    fn default() -> Self {
        Self::new(',')
    }
}

impl Stage for SplitStage {
    fn process(&self, record: Record) -> Result<Record> {
        match record {
            Record::Text(text) => Ok(Record::Fields(split_fields(&text, self.delimiter))),
            other => Err(PipelineError::stage(
                self.name(),
                format!("expected text, got {}", other.kind()),
            )),
        }
    }

    fn name(&self) -> &str {
        "split"
    }
}

/// Identity stage marking the end of a chain.
pub struct OutputStage;

impl Stage for OutputStage {
    fn process(&self, record: Record) -> Result<Record> {
        Ok(record)
    }

    fn name(&self) -> &str {
        "output"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mark_valid(mut map: serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    map.insert("valid".into(), Value::Bool(true));
    map
}

/// Empty tokens are kept, so `"a,,b"` yields three fields.
fn split_fields(text: &str, delimiter: char) -> Vec<String> {
    text.split(delimiter).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading() -> Record {
        Record::structured([
            ("sensor", json!("temp")),
            ("value", json!(23.5)),
            ("unit", json!("C")),
        ])
    }

    #[test]
    fn input_stage_rejects_absent() {
        let err = InputStage.process(Record::Absent).unwrap_err();
        assert!(matches!(err, PipelineError::StageExecution { ref stage, .. } if stage == "input"));
        assert_eq!(InputStage.process(Record::text("x")).unwrap(), Record::text("x"));
    }

    #[test]
    fn transform_enriches_structured() {
        let out = TransformStage::default().process(reading()).unwrap();
        let map = out.as_structured().expect("structured");
        assert_eq!(map.get("valid"), Some(&json!(true)));
        assert_eq!(map.get("sensor"), Some(&json!("temp")));
    }

    #[test]
    fn transform_passes_sentinel_and_splits_other_text() {
        let stage = TransformStage::default();
        assert_eq!(
            stage.process(Record::text(DEFAULT_SENTINEL)).unwrap(),
            Record::text(DEFAULT_SENTINEL)
        );
        assert_eq!(
            stage.process(Record::text("user,action,timestamp")).unwrap(),
            Record::Fields(vec!["user".into(), "action".into(), "timestamp".into()])
        );
        assert_eq!(
            stage.process(Record::Numbers(vec![1.0])).unwrap(),
            Record::Numbers(vec![1.0])
        );
    }

    #[test]
    fn transform_honours_configured_delimiter() {
        let config = PipelineConfig {
            delimiter: ';',
            ..PipelineConfig::default()
        };
        let stage = TransformStage::from(&config);
        assert_eq!(
            stage.process(Record::text("a;b")).unwrap(),
            Record::Fields(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn single_format_stages_reject_wrong_shape() {
        assert!(EnrichStage.process(Record::text("x")).is_err());
        assert!(SplitStage::default().process(reading()).is_err());
        assert_eq!(
            SplitStage::default().process(Record::text("a,,b")).unwrap(),
            Record::Fields(vec!["a".into(), String::new(), "b".into()])
        );
    }

    #[test]
    fn stages_do_not_mutate_their_input() {
        let original = reading();
        let _ = EnrichStage.process(original.clone()).unwrap();
        assert!(original.as_structured().unwrap().get("valid").is_none());
    }
}
