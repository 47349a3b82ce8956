// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{ExecutionError, MetaError, ResolutionError};

/// Structural and configuration failures of the operator graph.
///
/// Configuration-class variants abort the `set_value` / `connect` call that
/// triggered them; the slot is rolled back to its previous source before the
/// error is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The operator declares no slot with this name.
    #[error("Operator '{operator}' has no slot named '{slot}'")]
    UnknownSlot { operator: String, slot: String },

    /// Two slots of different nesting levels were connected, or a leveled
    /// slot was used where a flat one is required.
    #[error("Slot '{slot}' has level {found}, expected level {expected}")]
    LevelMismatch {
        slot: String,
        expected: usize,
        found: usize,
    },

    /// The value or upstream slot does not match the declared slot type.
    #[error("Slot '{slot}' expects {expected} but was given {found}")]
    TypeMismatch {
        slot: String,
        expected: String,
        found: String,
    },

    /// A connection that can never be valid (self-connection, torn-down slot).
    #[error("Cannot connect slot '{slot}': {reason}")]
    InvalidConnection { slot: String, reason: String },

    /// The slot is not ready.
    #[error("Slot '{slot}' is not ready")]
    NotReady { slot: String },

    /// A sub-slot index outside of the slot's current length.
    #[error("Index {index} is out of range for slot '{slot}' of length {len}")]
    IndexOutOfRange {
        slot: String,
        index: usize,
        len: usize,
    },

    /// The slot's length is dictated by the output it is connected to.
    #[error("Slot '{slot}' follows an upstream output and cannot be resized directly")]
    ResizeFollower { slot: String },

    /// `setup_outputs` rejected the current inputs.
    #[error("Operator '{operator}' could not be configured: {message}")]
    Configuration { operator: String, message: String },

    /// Declared structural requirements were violated.
    #[error("Constraint violated in '{operator}': {message}")]
    ConstraintViolation { operator: String, message: String },

    /// A replacement dataset has a different rank than the one it replaces.
    #[error("Operator '{operator}' was configured for {expected}-dimensional data but the replacement is {found}-dimensional")]
    DimensionalityMismatch {
        operator: String,
        expected: usize,
        found: usize,
    },

    /// The operator has already been cleaned up.
    #[error("Operator '{operator}' has been torn down")]
    TornDown { operator: String },

    /// The worker pool could not be started.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Metadata(#[from] MetaError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl GraphError {
    /// Convenience constructor for configuration errors.
    pub fn configuration(operator: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::Configuration {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for the constraint violation signal.
    pub fn constraint(operator: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::ConstraintViolation {
            operator: operator.into(),
            message: message.into(),
        }
    }
}
