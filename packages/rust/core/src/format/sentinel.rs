//! Sentinel-triggered stream summaries.

use stagechain_shared::{DEFAULT_SENTINEL, Record, Result};

use super::{RecordFormat, invalid_format};

/// Readings reported when no window is configured.
const DEFAULT_READINGS: [f64; 5] = [22.5, 21.8, 22.0, 22.3, 21.9];

/// Accepts exactly one recognised text and summarizes a window of readings.
pub struct SentinelFormat {
    sentinel: String,
    readings: Vec<f64>,
}

impl SentinelFormat {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            readings: DEFAULT_READINGS.to_vec(),
        }
    }

    /// Replace the reading window reported in the summary.
    pub fn with_readings(mut self, readings: Vec<f64>) -> Self {
        self.readings = readings;
        self
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    fn average(&self) -> f64 {
        if self.readings.is_empty() {
            return 0.0;
        }
        self.readings.iter().sum::<f64>() / self.readings.len() as f64
    }
}

impl Default for SentinelFormat {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

impl RecordFormat for SentinelFormat {
    fn name(&self) -> &str {
        "sentinel"
    }

    fn describe(&self) -> &str {
        "Aggregated and filtered"
    }

    fn accepts(&self, record: &Record) -> Result<()> {
        match record {
            Record::Text(_) => Ok(()),
            _ => Err(invalid_format()),
        }
    }

    fn summarize(&self, output: Record) -> Result<String> {
        match output.as_text() {
            Some(text) if text == self.sentinel => Ok(format!(
                "Stream summary: {} readings, avg: {:.1}°C",
                self.readings.len(),
                self.average()
            )),
            _ => Err(invalid_format()),
        }
    }

    fn representative(&self) -> Record {
        Record::text(self.sentinel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_summary() {
        let summary = SentinelFormat::default()
            .summarize(Record::text(DEFAULT_SENTINEL))
            .unwrap();
        assert_eq!(summary, "Stream summary: 5 readings, avg: 22.1°C");
    }

    #[test]
    fn custom_window_and_sentinel() {
        let format = SentinelFormat::new("tick").with_readings(vec![10.0, 20.0]);
        assert_eq!(
            format.summarize(Record::text("tick")).unwrap(),
            "Stream summary: 2 readings, avg: 15.0°C"
        );
        assert!(format.summarize(Record::text(DEFAULT_SENTINEL)).is_err());
    }

    #[test]
    fn split_output_is_rejected() {
        let fields = Record::Fields(vec!["a".into()]);
        assert!(SentinelFormat::default().summarize(fields).is_err());
    }
}
