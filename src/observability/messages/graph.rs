// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for operator lifecycle and slot wiring events.
//!
//! This module contains message types for logging events related to:
//! * Operator configuration (`setup_outputs`) success and failure
//! * Slot connection, disconnection, resizing and rollback
//! * Lane replication in operator wrappers
//! * Operator cleanup

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Operator configured its outputs.
///
/// # Log Level
/// `debug!` - Routine lifecycle event
///
/// # Example
/// ```
/// use the_voxelflow::observability::messages::graph::OperatorConfigured;
///
/// let msg = OperatorConfigured {
///     operator: "OpReorderAxes",
///     node_id: 4,
///     outputs: 1,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct OperatorConfigured<'a> {
    pub operator: &'a str,
    pub node_id: u64,
    pub outputs: usize,
}

impl Display for OperatorConfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' (#{}) configured: {} output(s) published",
            self.operator, self.node_id, self.outputs
        )
    }
}

impl StructuredLog for OperatorConfigured<'_> {
    fn log(&self) {
        tracing::debug!(
            operator = self.operator,
            node_id = self.node_id,
            outputs = self.outputs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operator_configured",
            span_name = name,
            operator = self.operator,
            node_id = self.node_id,
        )
    }
}

/// Operator fell back to the unconfigured state because required inputs are not ready.
///
/// # Log Level
/// `debug!` - Routine lifecycle event
pub struct OperatorUnconfigured<'a> {
    pub operator: &'a str,
    pub node_id: u64,
    pub missing: &'a [String],
}

impl Display for OperatorUnconfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' (#{}) unconfigured: waiting for {}",
            self.operator,
            self.node_id,
            self.missing.join(", ")
        )
    }
}

impl StructuredLog for OperatorUnconfigured<'_> {
    fn log(&self) {
        tracing::debug!(
            operator = self.operator,
            node_id = self.node_id,
            missing = ?self.missing,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operator_unconfigured",
            span_name = name,
            operator = self.operator,
            node_id = self.node_id,
        )
    }
}

/// `setup_outputs` raised a configuration error.
///
/// # Log Level
/// `warn!` - The triggering call fails, the graph stays consistent
///
/// # Example
/// ```
/// use the_voxelflow::observability::messages::graph::SetupFailed;
/// use the_voxelflow::errors::GraphError;
///
/// let error = GraphError::constraint("OpDataSelection", "no x axis");
/// let msg = SetupFailed {
///     operator: "OpDataSelection",
///     node_id: 9,
///     error: &error,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct SetupFailed<'a> {
    pub operator: &'a str,
    pub node_id: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for SetupFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' (#{}) failed to configure: {}",
            self.operator, self.node_id, self.error
        )
    }
}

impl StructuredLog for SetupFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            operator = self.operator,
            node_id = self.node_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "setup_failed",
            span_name = name,
            operator = self.operator,
            node_id = self.node_id,
        )
    }
}

/// Operator and its children were torn down.
pub struct OperatorCleanedUp<'a> {
    pub operator: &'a str,
    pub node_id: u64,
    pub children: usize,
}

impl Display for OperatorCleanedUp<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' (#{}) cleaned up with {} child operator(s)",
            self.operator, self.node_id, self.children
        )
    }
}

impl StructuredLog for OperatorCleanedUp<'_> {
    fn log(&self) {
        tracing::debug!(
            operator = self.operator,
            node_id = self.node_id,
            children = self.children,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operator_cleaned_up",
            span_name = name,
            operator = self.operator,
            node_id = self.node_id,
        )
    }
}

/// A slot was connected to an upstream slot.
pub struct SlotConnected<'a> {
    pub slot: &'a str,
    pub upstream: &'a str,
}

impl Display for SlotConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Slot '{}' connected to '{}'", self.slot, self.upstream)
    }
}

impl StructuredLog for SlotConnected<'_> {
    fn log(&self) {
        tracing::trace!(slot = self.slot, upstream = self.upstream, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "slot_connected",
            span_name = name,
            slot = self.slot,
            upstream = self.upstream,
        )
    }
}

/// A leveled slot changed length.
pub struct SlotResized<'a> {
    pub slot: &'a str,
    pub old_len: usize,
    pub new_len: usize,
}

impl Display for SlotResized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Slot '{}' resized from {} to {}",
            self.slot, self.old_len, self.new_len
        )
    }
}

impl StructuredLog for SlotResized<'_> {
    fn log(&self) {
        tracing::trace!(
            slot = self.slot,
            old_len = self.old_len,
            new_len = self.new_len,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("slot_resized", span_name = name, slot = self.slot)
    }
}

/// A value or connection was reverted because it broke downstream configuration.
///
/// # Log Level
/// `warn!` - The caller receives the original error
pub struct ChangeRolledBack<'a> {
    pub slot: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChangeRolledBack<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Change to slot '{}' rolled back: {}",
            self.slot, self.error
        )
    }
}

impl StructuredLog for ChangeRolledBack<'_> {
    fn log(&self) {
        tracing::warn!(slot = self.slot, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("change_rolled_back", span_name = name, slot = self.slot)
    }
}

/// A structural listener (insert/remove) returned an error.
pub struct ListenerFailed<'a> {
    pub slot: &'a str,
    pub event: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ListenerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Listener for '{}' on slot '{}' failed: {}",
            self.event, self.slot, self.error
        )
    }
}

impl StructuredLog for ListenerFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            slot = self.slot,
            event = self.event,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "listener_failed",
            span_name = name,
            slot = self.slot,
            event = self.event,
        )
    }
}

/// A lane was added to an operator wrapper.
///
/// # Log Level
/// `debug!` - Routine structural change
pub struct LaneAdded<'a> {
    pub wrapper: &'a str,
    pub index: usize,
    pub lanes: usize,
}

impl Display for LaneAdded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Wrapper '{}' added lane {} ({} lane(s))",
            self.wrapper, self.index, self.lanes
        )
    }
}

impl StructuredLog for LaneAdded<'_> {
    fn log(&self) {
        tracing::debug!(
            wrapper = self.wrapper,
            index = self.index,
            lanes = self.lanes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "lane_added",
            span_name = name,
            wrapper = self.wrapper,
            index = self.index,
        )
    }
}

/// A lane was removed from an operator wrapper.
pub struct LaneRemoved<'a> {
    pub wrapper: &'a str,
    pub index: usize,
    pub lanes: usize,
}

impl Display for LaneRemoved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Wrapper '{}' removed lane {} ({} lane(s) left)",
            self.wrapper, self.index, self.lanes
        )
    }
}

impl StructuredLog for LaneRemoved<'_> {
    fn log(&self) {
        tracing::debug!(
            wrapper = self.wrapper,
            index = self.index,
            lanes = self.lanes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "lane_removed",
            span_name = name,
            wrapper = self.wrapper,
            index = self.index,
        )
    }
}
