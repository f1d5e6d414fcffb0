//! Delimited user-activity lines.

use stagechain_shared::{PipelineConfig, Record, Result};

use super::{RecordFormat, invalid_format};

/// Accepts delimited text and counts `action` tokens once it has been split.
pub struct DelimitedFormat {
    sample: String,
}

impl DelimitedFormat {
    /// Token counted in the summary.
    pub const ACTION_TOKEN: &'static str = "action";

    /// Fields of the representative activity line.
    const SAMPLE_FIELDS: [&'static str; 3] = ["user", Self::ACTION_TOKEN, "timestamp"];

    pub fn new() -> Self {
        Self::with_delimiter(',')
    }

    /// Representative line joined with `delimiter`.
    pub fn with_delimiter(delimiter: char) -> Self {
        Self::with_sample(Self::SAMPLE_FIELDS.join(delimiter.to_string().as_str()))
    }

    /// Use `sample` as the representative line for chained dispatch.
    pub fn with_sample(sample: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
        }
    }
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&PipelineConfig> for DelimitedFormat {
    fn from(config: &PipelineConfig) -> Self {
        Self::with_delimiter(config.delimiter)
    }
}

impl RecordFormat for DelimitedFormat {
    fn name(&self) -> &str {
        "delimited"
    }

    fn describe(&self) -> &str {
        "Parsed and structured data"
    }

    fn accepts(&self, record: &Record) -> Result<()> {
        match record {
            Record::Text(_) => Ok(()),
            _ => Err(invalid_format()),
        }
    }

    fn summarize(&self, output: Record) -> Result<String> {
        let Record::Fields(fields) = output else {
            return Err(invalid_format());
        };
        let actions = fields
            .iter()
            .filter(|field| field.as_str() == Self::ACTION_TOKEN)
            .count();
        Ok(format!("User activity logged: {actions} actions processed"))
    }

    fn representative(&self) -> Record {
        Record::text(self.sample.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_action_tokens() {
        let fields = Record::Fields(vec![
            "user".into(),
            "action".into(),
            "action".into(),
            "timestamp".into(),
        ]);
        assert_eq!(
            DelimitedFormat::new().summarize(fields).unwrap(),
            "User activity logged: 2 actions processed"
        );
    }

    #[test]
    fn unsplit_output_is_rejected() {
        let err = DelimitedFormat::new()
            .summarize(Record::text("user,action"))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid data format"));
    }

    #[test]
    fn representative_follows_configured_delimiter() {
        assert_eq!(
            DelimitedFormat::new().representative(),
            Record::text("user,action,timestamp")
        );

        let mut config = PipelineConfig::default();
        config.delimiter = '|';
        assert_eq!(
            DelimitedFormat::from(&config).representative(),
            Record::text("user|action|timestamp")
        );
    }

    #[test]
    fn chain_input_replaces_carried_record() {
        let format = DelimitedFormat::with_sample("a,action");
        assert_eq!(
            format.chain_input(Record::text("previous output")),
            Record::text("a,action")
        );
    }
}
