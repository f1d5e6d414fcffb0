//! Error types for stagechain.
//!
//! Library crates use [`PipelineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all stagechain operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Record shape does not match what the pipeline variant accepts.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A stage rejected its input.
    #[error("stage '{stage}' failed: {message}")]
    StageExecution { stage: String, message: String },

    /// Dispatch requested while no capacity remains.
    #[error("capacity exhausted: no available processing slots")]
    CapacityExhausted,

    /// Capacity ran out part-way through a dispatch call.
    #[error("capacity exceeded during processing after {processed} records")]
    CapacityExceeded { processed: u64 },

    /// Negative record count passed to a chained dispatch.
    #[error("invalid record count {0}: records must be non-negative")]
    InvalidRecordCount(i64),

    /// Recovery was needed but the snapshot stack is empty.
    #[error("recovery unavailable: no snapshot to restore")]
    RecoveryUnavailable,

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input decoding error (record files, JSON payloads).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a stage execution error attributed to `stage`.
    pub fn stage(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is resolved inside a pipeline run by restoring a snapshot.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::StageExecution { .. })
    }
}
