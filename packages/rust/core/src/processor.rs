//! Single-shot data processors.
//!
//! Unlike pipelines, a processor handles one record in one step: it checks the
//! record with [`DataProcessor::validate`] and renders a one-line result with
//! [`DataProcessor::process`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use stagechain_shared::{PipelineError, Record, Result};

/// A processor for one kind of record.
pub trait DataProcessor: Send + Sync {
    /// Human-readable processor name (e.g. `"Numeric"`).
    fn name(&self) -> &str;

    /// Whether `record` can be processed.
    fn validate(&self, record: &Record) -> bool;

    /// Process `record` into a one-line result.
    fn process(&self, record: &Record) -> Result<String>;

    /// Decorate a result for display.
    fn format_output(&self, result: &str) -> String {
        format!("Output: {result}")
    }
}

// ---------------------------------------------------------------------------
// Numeric
// ---------------------------------------------------------------------------

/// Sums and averages a non-empty list of numbers.
pub struct NumericProcessor;

impl DataProcessor for NumericProcessor {
    fn name(&self) -> &str {
        "Numeric"
    }

    fn validate(&self, record: &Record) -> bool {
        matches!(record, Record::Numbers(values) if !values.is_empty())
    }

    fn process(&self, record: &Record) -> Result<String> {
        let values = match record {
            Record::Numbers(values) if !values.is_empty() => values,
            _ => {
                return Err(PipelineError::validation(
                    "NumericProcessor expects a non-empty list of numbers",
                ));
            }
        };
        let sum: f64 = values.iter().sum();
        let avg = sum / values.len() as f64;
        Ok(format!(
            "Processed {} numeric values, sum={sum}, avg={avg:?}",
            values.len()
        ))
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Counts characters and space-separated words.
pub struct TextProcessor;

impl DataProcessor for TextProcessor {
    fn name(&self) -> &str {
        "Text"
    }

    fn validate(&self, record: &Record) -> bool {
        record.as_text().is_some()
    }

    fn process(&self, record: &Record) -> Result<String> {
        let text = record
            .as_text()
            .ok_or_else(|| PipelineError::validation("TextProcessor expects text input"))?;
        let chars = text.chars().count();
        let words = text.split(' ').filter(|w| !w.is_empty()).count();
        Ok(format!(
            "Processed text: {chars} characters, {words} words"
        ))
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// `LEVEL: message`, with exactly one separator.
static LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+): ?([^:]+)$").expect("valid regex")
});

/// Recognised levels and the tag each is reported with.
const LOG_LEVELS: [(&str, &str); 3] = [
    ("ERROR", "[ALERT]"),
    ("WARN", "[WARNING]"),
    ("INFO", "[INFO]"),
];

/// Classifies `LEVEL: message` log lines.
pub struct LogProcessor;

impl LogProcessor {
    fn parse<'a>(&self, line: &'a str) -> Option<(&'static str, &'static str, &'a str)> {
        let caps = LOG_RE.captures(line)?;
        let level = caps.get(1)?.as_str();
        let message = caps.get(2)?.as_str();
        LOG_LEVELS
            .iter()
            .find(|(name, _)| *name == level)
            .map(|(name, tag)| (*name, *tag, message))
    }
}

impl DataProcessor for LogProcessor {
    fn name(&self) -> &str {
        "Log"
    }

    fn validate(&self, record: &Record) -> bool {
        record
            .as_text()
            .is_some_and(|line| self.parse(line).is_some())
    }

    fn process(&self, record: &Record) -> Result<String> {
        let (level, tag, message) = record
            .as_text()
            .and_then(|line| self.parse(line))
            .ok_or_else(|| {
                PipelineError::validation("LogProcessor expects format 'LEVEL: message'")
            })?;
        debug!(level, "log line classified");
        Ok(format!("{tag} {level} level detected: {message}"))
    }
}

/// The built-in processors, in demo order.
pub fn builtin_processors() -> Vec<Box<dyn DataProcessor>> {
    vec![
        Box::new(NumericProcessor),
        Box::new(TextProcessor),
        Box::new(LogProcessor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_sum_and_average() {
        let record = Record::Numbers(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(NumericProcessor.validate(&record));
        assert_eq!(
            NumericProcessor.process(&record).unwrap(),
            "Processed 5 numeric values, sum=15, avg=3.0"
        );
    }

    #[test]
    fn numeric_average_keeps_fraction() {
        let record = Record::Numbers(vec![1.0, 2.0]);
        assert_eq!(
            NumericProcessor.process(&record).unwrap(),
            "Processed 2 numeric values, sum=3, avg=1.5"
        );
    }

    #[test]
    fn numeric_rejects_empty_and_text() {
        assert!(!NumericProcessor.validate(&Record::Numbers(vec![])));
        assert!(NumericProcessor.process(&Record::text("1,2")).is_err());
    }

    #[test]
    fn text_counts_characters_and_words() {
        let record = Record::text("Hello Nexus World");
        assert_eq!(
            TextProcessor.process(&record).unwrap(),
            "Processed text: 17 characters, 3 words"
        );
        assert!(!TextProcessor.validate(&Record::Absent));
    }

    #[test]
    fn log_levels_are_tagged() {
        let record = Record::text("ERROR: Connection timeout");
        assert_eq!(
            LogProcessor.process(&record).unwrap(),
            "[ALERT] ERROR level detected: Connection timeout"
        );
        assert_eq!(
            LogProcessor.process(&Record::text("INFO: System ready")).unwrap(),
            "[INFO] INFO level detected: System ready"
        );
    }

    #[test]
    fn log_rejects_unknown_level_and_extra_separators() {
        assert!(!LogProcessor.validate(&Record::text("DEBUG: noisy")));
        assert!(!LogProcessor.validate(&Record::text("ERROR: a: b")));
        assert!(!LogProcessor.validate(&Record::text("no separator")));
    }

    #[test]
    fn default_output_format() {
        assert_eq!(TextProcessor.format_output("done"), "Output: done");
    }

    #[test]
    fn builtin_order() {
        let names: Vec<_> = builtin_processors()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Numeric", "Text", "Log"]);
    }
}
