use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::render::DEFAULT_MAX_BYTES;
use crate::stream::AnomalyPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the assistant service.
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// What to do when a response starts while another is still streaming.
    pub anomaly_policy: AnomalyPolicy,
    /// Abandon a response after this many seconds without a chunk.
    /// Zero disables the timeout.
    pub timeout_secs: u64,
}

impl StreamConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Render assistant markdown. When off, responses are shown as plain text.
    pub markdown: bool,
    /// Responses larger than this are shown raw.
    pub max_bytes: usize,
    /// Use colors in the terminal. `NO_COLOR` overrides this.
    pub colors: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markdown: true,
            max_bytes: DEFAULT_MAX_BYTES,
            colors: true,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Custom log file. Defaults to ~/.local/share/hackgpt/client.log.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Resolve the log file, using the configured path or the XDG default.
    pub fn resolve_file(&self) -> PathBuf {
        if let Some(ref custom) = self.file {
            return PathBuf::from(custom);
        }

        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".local").join("share")
            });
        base.join("hackgpt").join("client.log")
    }
}

impl Config {
    /// Load a config file, failing on any read or parse error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the given file, or the default location. A missing file gives
    /// defaults; an unreadable or malformed one is reported and ignored.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        if !path.exists() {
            return Config::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            eprintln!("warning: {e}");
            Config::default()
        })
    }
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("hackgpt").join("config.toml")
}
