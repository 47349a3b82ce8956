// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while loading or validating an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file '{path}': {reason}")]
    Io { path: String, reason: String },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// The file extension does not map to a supported configuration format.
    #[error("Unsupported configuration format '{extension}' (expected yaml, yml or toml)")]
    UnsupportedFormat { extension: String },

    /// A configured value is outside its allowed range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
