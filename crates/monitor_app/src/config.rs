use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use monitor_engine::ChannelSettings;
use monitor_logging::monitor_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Monitor settings, read from a RON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base URL the `training-progress` / `evaluation-progress` endpoints hang off.
    pub server_url: String,
    pub grace_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub transcript_limit: usize,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000/ws/".to_string(),
            grace_delay_ms: 1000,
            connect_timeout_ms: 10_000,
            shutdown_timeout_ms: 2000,
            transcript_limit: monitor_core::DEFAULT_TRANSCRIPT_LIMIT,
            log_destination: LogDestination::Terminal,
            log_level: "info".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                monitor_info!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            grace_delay: Duration::from_millis(self.grace_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }

    /// Unknown level names fall back to `Info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
