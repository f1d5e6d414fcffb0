//! Pipeline execution and recovery engine for stagechain.
//!
//! This crate provides the stage library, the record formats, the
//! snapshot-recovering [`Pipeline`], and the capacity-bounded [`Manager`]
//! that dispatches records across pipelines.

pub mod capacity;
pub mod format;
pub mod manager;
pub mod pipeline;
pub mod processor;
pub mod stage;

pub use capacity::Capacity;
pub use format::{DelimitedFormat, RecordFormat, SentinelFormat, StructuredFormat};
pub use manager::{ChainProgress, ChainReport, Manager, SilentProgress, standard_pipelines};
pub use pipeline::{Pipeline, PipelineStats, RunOutcome, Snapshot};
pub use processor::{DataProcessor, LogProcessor, NumericProcessor, TextProcessor};
pub use stage::{
    EnrichStage, InputStage, OutputStage, SharedStage, SplitStage, Stage, TransformStage, shared,
};
