//! Configuration file loading for the PGN tool.
//!
//! Settings come from `pgn-tool.toml` in the working directory, or from the
//! file named with `--config`. Every key is optional.

use std::path::{Path, PathBuf};

use pgn_graph::{MergeOptions, NotationOptions};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML or has keys of the wrong type.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Tool settings.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// Log filter used when `RUST_LOG` is unset, e.g. "info" or
    /// "pgn_graph=debug".
    pub log_level: Option<String>,
    pub notation: NotationOptions,
    pub merge: MergeOptions,
}

impl ToolConfig {
    /// Name of the file looked up in the working directory.
    pub const DEFAULT_FILE: &'static str = "pgn-tool.toml";

    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the default file is read if
    /// present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(Self::DEFAULT_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
                path: path.clone(),
                source,
            })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}
