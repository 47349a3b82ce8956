// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// A dataset path could not be resolved to concrete files.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    /// No file matched the (possibly globbed) external path.
    #[error("Could not find file at {path}")]
    FileNotFound { path: String },

    /// No internal dataset matched the internal path inside a container file.
    #[error("Could not find internal path '{internal_path}' in {file}")]
    InternalPathNotFound { file: String, internal_path: String },

    /// A stack mixes files of different extensions.
    #[error("Multiple extensions unsupported as a single data source: {path}")]
    MixedExtensions { path: String },

    /// A stack of several files was given without an axis to stack along.
    #[error("A sequence axis must be specified when loading a stack of {count} files")]
    MissingSequenceAxis { count: usize },

    /// No provider is registered for the file extension.
    #[error("No data provider registered for extension '{extension}'")]
    UnsupportedExtension { extension: String },

    /// The glob pattern could not be compiled.
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A directory could not be listed while expanding a pattern.
    #[error("Could not list {path}: {reason}")]
    Io { path: String, reason: String },
}
