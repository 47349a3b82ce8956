// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! All diagnostic output of the engine goes through `tracing`. Message types
//! live in [`messages`], one module per subsystem, and implement `Display`
//! plus [`messages::StructuredLog`] so that every event carries both a
//! human-readable line and structured fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::graph` - slot wiring, operator configuration and lane replication
//! * `messages::request` - request scheduling, completion and cancellation
//! * `messages::selection` - provider selection and axis normalization
//! * `messages::export` - export progress and completion
//!
//! # Usage
//!
//! ```rust
//! use the_voxelflow::observability::messages::graph::OperatorConfigured;
//! use the_voxelflow::observability::messages::StructuredLog;
//!
//! let msg = OperatorConfigured {
//!     operator: "OpArrayPiper",
//!     node_id: 3,
//!     outputs: 1,
//! };
//!
//! msg.log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

use crate::config::consts::DEFAULT_LOG_FILTER;

/// Install a global `tracing-subscriber` formatter.
///
/// `RUST_LOG` wins over `fallback_filter`; when neither is given the
/// built-in default filter is used. Calling this more than once is harmless:
/// only the first call installs a subscriber.
pub fn init_tracing(fallback_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(Some("debug"));
        init_tracing(None);
        tracing::debug!("tracing initialized twice without panicking");
    }
}
