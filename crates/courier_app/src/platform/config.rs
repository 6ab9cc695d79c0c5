//! `courier.ron` loading. Every field has a default, so a missing file (or a
//! file that only sets a few fields) is fine; a file that does not parse is not.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use courier_engine::LoopbackSettings;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "courier.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogDestination {
    File,
    Terminal,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub destination: LogDestination,
    pub level: LogLevel,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: LogLevel::Info,
            file: PathBuf::from("./courier.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub enabled: bool,
    pub step_delay_ms: u64,
    pub failure_trigger: String,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        let settings = LoopbackSettings::default();
        Self {
            enabled: true,
            step_delay_ms: settings.step_delay.as_millis() as u64,
            failure_trigger: settings.failure_trigger,
        }
    }
}

impl LoopbackConfig {
    pub fn settings(&self) -> LoopbackSettings {
        LoopbackSettings {
            step_delay: Duration::from_millis(self.step_delay_ms),
            failure_trigger: self.failure_trigger.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    /// Scope that console input goes to until `/scope` switches it.
    pub default_scope: String,
    pub loopback: LoopbackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            default_scope: courier_core::Scope::CHAT.to_string(),
            loopback: LoopbackConfig::default(),
        }
    }
}

/// Config path from the first CLI argument, else `courier.ron` in the working directory.
pub fn config_path(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
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
