// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for request lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Request handed to the worker pool, or run on the waiting thread.
pub struct RequestSubmitted {
    pub request_id: u64,
    pub inline: bool,
}

impl Display for RequestSubmitted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let place = if self.inline { "inline" } else { "on the worker pool" };
        write!(f, "Request #{} running {}", self.request_id, place)
    }
}

impl StructuredLog for RequestSubmitted {
    fn log(&self) {
        tracing::trace!(request_id = self.request_id, inline = self.inline, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("request", span_name = name, request_id = self.request_id)
    }
}

/// Request produced its result.
pub struct RequestFinished {
    pub request_id: u64,
    pub duration: Duration,
}

impl Display for RequestFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Request #{} finished in {:?}",
            self.request_id, self.duration
        )
    }
}

impl StructuredLog for RequestFinished {
    fn log(&self) {
        tracing::trace!(
            request_id = self.request_id,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("request", span_name = name, request_id = self.request_id)
    }
}

/// Request failed.
///
/// # Log Level
/// `debug!` - Failures are delivered to the caller, which decides how loud to be
///
/// # Example
/// ```
/// use the_voxelflow::observability::messages::request::RequestFailed;
/// use the_voxelflow::errors::ExecutionError;
///
/// let error = ExecutionError::Io("disk gone".into());
/// let msg = RequestFailed { request_id: 7, error: &error };
/// tracing::debug!("{}", msg);
/// ```
pub struct RequestFailed<'a> {
    pub request_id: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for RequestFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Request #{} failed: {}", self.request_id, self.error)
    }
}

impl StructuredLog for RequestFailed<'_> {
    fn log(&self) {
        tracing::debug!(request_id = self.request_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("request", span_name = name, request_id = self.request_id)
    }
}

/// Request was cancelled; any late result is dropped.
pub struct RequestCancelled {
    pub request_id: u64,
}

impl Display for RequestCancelled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Request #{} cancelled", self.request_id)
    }
}

impl StructuredLog for RequestCancelled {
    fn log(&self) {
        tracing::debug!(request_id = self.request_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("request", span_name = name, request_id = self.request_id)
    }
}
