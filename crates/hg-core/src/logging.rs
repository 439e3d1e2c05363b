//! Log file setup. The terminal belongs to the UI, so all tracing output
//! goes to a file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| LoggingError::Filter {
        directive: level.to_string(),
        source,
    })
}

/// Install the global subscriber. Returns the log file in use.
pub fn init(config: &LoggingConfig, path_override: Option<&Path>) -> Result<PathBuf, LoggingError> {
    let path = path_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.resolve_file());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LoggingError::Open {
            path: path.clone(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::Open {
            path: path.clone(),
            source,
        })?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter(&config.level)?)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    tracing::info!(path = %path.display(), "logging initialized");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = filter("hg_core=notalevel").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }

    #[test]
    fn valid_levels_accepted() {
        assert!(filter("info").is_ok());
        assert!(filter("hg_core=debug,warn").is_ok());
    }

    #[test]
    fn unopenable_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let err = init(&LoggingConfig::default(), Some(dir.path())).unwrap_err();
        assert!(matches!(err, LoggingError::Open { .. }));
    }
}
