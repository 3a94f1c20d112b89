// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single rule violated by a loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A size that must be positive was zero.
    ZeroSize {
        /// Dotted path of the offending field
        field: &'static str,
    },
    /// A low-water mark sits above the limit it is meant to trail.
    WatermarkAboveLimit {
        /// Dotted path of the low-water mark
        field: &'static str,
        low_water_mark: usize,
        /// Dotted path of the limit it was compared against
        limit_field: &'static str,
        limit: usize,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroSize { field } => {
                write!(f, "'{}' must be greater than zero", field)
            }
            ValidationError::WatermarkAboveLimit {
                field,
                low_water_mark,
                limit_field,
                limit,
            } => {
                write!(
                    f,
                    "'{}' ({}) must not exceed '{}' ({})",
                    field, low_water_mark, limit_field, limit
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format '{extension}' (expected yaml, yml, toml or json)")]
    UnsupportedFormat { extension: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("configuration validation failed:\n{}", format_violations(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_violations(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
