// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Violations of the [`MetaDict`](crate::metadata::MetaDict) invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    /// `len(axistags) != len(shape)`.
    #[error("Axis count mismatch: shape has {shape_len} axes but axistags has {axes_len}")]
    AxisCountMismatch { shape_len: usize, axes_len: usize },

    /// An axis key outside of `tczyx` (or another known key) was used.
    #[error("Unknown axis key '{0}'")]
    UnknownAxis(char),

    /// The same axis key appears twice.
    #[error("Duplicate axis key '{0}'")]
    DuplicateAxis(char),

    /// One of the fields required for readiness is missing.
    #[error("Metadata is incomplete: missing {0}")]
    Incomplete(&'static str),

    /// An unrecognized element type name.
    #[error("Unknown dtype '{0}'")]
    UnknownDtype(String),
}
