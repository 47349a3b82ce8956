// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for a consistent, human-readable
//! line and [`StructuredLog`] to emit the event with its fields attached.
//!
//! # Organization
//!
//! * `graph` - operator lifecycle, slot wiring and lane replication
//! * `request` - request lifecycle
//! * `selection` - data selection decisions
//! * `export` - volume export progress
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_voxelflow::observability::messages::request::RequestCancelled;
//!
//! let msg = RequestCancelled { request_id: 12 };
//! tracing::debug!("{}", msg);
//! ```

pub mod export;
pub mod graph;
pub mod request;
pub mod selection;

use tracing::Span;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a `tracing` event.
    fn log(&self);

    /// Create a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
