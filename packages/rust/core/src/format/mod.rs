//! Record formats: what a pipeline accepts and how it summarizes output.
//!
//! Every pipeline runs the same snapshot/stage/recover algorithm; the format
//! plugged into it decides the accepted input shape, the final validation
//! rule, and the summary template.

mod delimited;
mod sentinel;
mod structured;

use stagechain_shared::{PipelineError, Record, Result};

pub use delimited::DelimitedFormat;
pub use sentinel::SentinelFormat;
pub use structured::StructuredFormat;

/// Message attached to every shape mismatch.
pub const INVALID_FORMAT: &str = "Error detected in Stage 2: Invalid data format";

/// Shortcut for the shape-mismatch validation error.
pub(crate) fn invalid_format() -> PipelineError {
    PipelineError::validation(INVALID_FORMAT)
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Per-variant behaviour of a pipeline.
pub trait RecordFormat: Send + Sync {
    /// Short format name for tracing (e.g. `"structured"`).
    fn name(&self) -> &str;

    /// One-line description of what the stage chain does for this format.
    fn describe(&self) -> &str;

    /// Check the raw input shape before any stage runs.
    fn accepts(&self, record: &Record) -> Result<()>;

    /// Validate the stage chain's output and render the summary.
    fn summarize(&self, output: Record) -> Result<String>;

    /// A record this format accepts, used to drive chained dispatch.
    fn representative(&self) -> Record;

    /// Input for this pipeline's position in a chain, given what the previous
    /// pipeline produced. Formats replace it with their representative record
    /// unless they consume the carried value.
    fn chain_input(&self, _carried: Record) -> Record {
        self.representative()
    }
}
