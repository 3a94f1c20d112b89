// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{PipeOptions, StreamOptions, TransformOptions, WritableOptions};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Stream configuration as loaded from a file.
///
/// Every section is optional; anything left out falls back to the
/// documented defaults.
///
/// # Fields
/// * `readable` - Pull-side options (prefetch unit and low-water mark)
/// * `writable` - Push-side options (backpressure watermarks)
/// * `pipe` - Default options for `pipe` registrations
///
/// # Example
/// ```yaml
/// readable:
///   buffer_size: 65536
///   low_water_mark: 4096
/// writable:
///   high_water_mark: 65536
/// pipe:
///   end: true
///   chunk_size: 1024
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub readable: StreamOptions,
    pub writable: WritableOptions,
    pub pipe: PipeOptions,
}

impl Config {
    /// Options for a transform stage built from this configuration.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            readable: self.readable,
            writable: self.writable,
        }
    }
}

/// File formats understood by [`load_config`], picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat { extension }),
        }
    }
}

/// Parse configuration text in the given format.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string())),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }
}

/// Load a config from a YAML, TOML or JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = parse_config(&content, format)?;
    tracing::debug!(path = %path.display(), ?format, "loaded stream configuration");
    Ok(cfg)
}

/// Load and validate a config file
///
/// Loading succeeds only when every rule in
/// [`validate_config`](crate::config::validate_config) holds.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}
