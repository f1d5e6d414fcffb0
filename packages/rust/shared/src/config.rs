//! Application configuration for stagechain.
//!
//! User config lives at `~/.stagechain/stagechain.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stagechain.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stagechain";

/// Sentinel text recognised by stream pipelines unless configured otherwise.
pub const DEFAULT_SENTINEL: &str = "Real-time sensor stream";

// ---------------------------------------------------------------------------
// Config structs (matching stagechain.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Manager settings.
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Pipeline settings shared by every variant.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Chained dispatch settings.
    #[serde(default)]
    pub chain: ChainConfig,
}

/// `[manager]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Total records the manager may process over its lifetime.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> u64 {
    1000
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum snapshots kept per pipeline; the oldest is evicted beyond this.
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Delimiter used to split text records into fields.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Text a stream pipeline recognises as its input.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            delimiter: default_delimiter(),
            sentinel: default_sentinel(),
        }
    }
}

fn default_max_snapshots() -> usize {
    32
}
fn default_delimiter() -> char {
    ','
}
fn default_sentinel() -> String {
    DEFAULT_SENTINEL.into()
}

/// `[chain]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Default number of records threaded through the chain.
    #[serde(default = "default_chain_records")]
    pub records: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            records: default_chain_records(),
        }
    }
}

fn default_chain_records() -> i64 {
    100
}

impl AppConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_snapshots == 0 {
            return Err(PipelineError::config(
                "pipeline.max_snapshots must be at least 1",
            ));
        }
        if self.pipeline.sentinel.is_empty() {
            return Err(PipelineError::config("pipeline.sentinel must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stagechain/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PipelineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stagechain/stagechain.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PipelineError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PipelineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PipelineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
