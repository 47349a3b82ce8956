// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failure of a single request.
///
/// Execution errors never tear down the operator graph; they are delivered to
/// the request's failure callbacks or returned from a blocking wait.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The request was cancelled before it produced a result.
    #[error("Request was cancelled")]
    Cancelled,

    /// The slot was read while it was not ready.
    #[error("Slot '{slot}' is not ready")]
    NotReady { slot: String },

    /// The requested region does not fit inside the slot's shape.
    #[error("Region {start:?}..{stop:?} is out of bounds for shape {shape:?}")]
    RegionOutOfBounds {
        start: Vec<usize>,
        stop: Vec<usize>,
        shape: Vec<usize>,
    },

    /// An operator returned data that does not match the published metadata.
    #[error("Operator '{operator}' violated its output contract: {message}")]
    ContractViolation { operator: String, message: String },

    /// The operator's `execute` reported a failure.
    #[error("Operator '{operator}' failed: {message}")]
    OperatorFailed { operator: String, message: String },

    /// An I/O failure inside a provider or sink.
    #[error("I/O error: {0}")]
    Io(String),

    /// The engine itself failed to run the request.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Io(err.to_string())
    }
}
