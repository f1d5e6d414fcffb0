//! Shared types, error model, and configuration for stagechain.
//!
//! This crate is the foundation depended on by the other stagechain crates.
//! It provides:
//! - [`PipelineError`]: the unified error type
//! - [`Record`]: the value that flows through pipelines
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChainConfig, DEFAULT_SENTINEL, ManagerConfig, PipelineConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PipelineError, Result};
pub use types::{Record, RecordKind, load_records, parse_records};
