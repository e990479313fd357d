//! Configuration types for the Playback binary

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{PlaybackError, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local address the player listens on (e.g. `http://127.0.0.1:8080/`)
    pub base_address: String,
    /// Upstream base URL requests are recorded against
    pub remote_address: String,
    /// Cassette file to load and save
    pub cassette: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlaybackError::InvalidArgument(format!("Failed to read config file: {e}"))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PlaybackError::InvalidArgument(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_address.trim().is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "base_address cannot be empty".to_string(),
            ));
        }
        if !self.base_address.starts_with("http://") {
            return Err(PlaybackError::InvalidArgument(format!(
                "base_address must be an http:// prefix, got '{}'",
                self.base_address
            )));
        }

        if self.remote_address.trim().is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "remote_address cannot be empty".to_string(),
            ));
        }
        if !self.remote_address.starts_with("http://")
            && !self.remote_address.starts_with("https://")
        {
            return Err(PlaybackError::InvalidArgument(format!(
                "remote_address must be http or https, got '{}'",
                self.remote_address
            )));
        }

        if self.cassette.as_os_str().is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "cassette path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
