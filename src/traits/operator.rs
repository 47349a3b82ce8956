// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec};

/// A computation placed in a graph.
///
/// The graph calls `setup_outputs` whenever the operator's inputs change and
/// every required input is ready, `execute` to produce a region of an output,
/// and `propagate_dirty` when a region of an input becomes stale.
///
/// ```ignore
/// struct OpInvert;
///
/// impl Operator for OpInvert {
///     fn name(&self) -> &'static str { "OpInvert" }
///
///     fn slots(&self) -> Vec<SlotSpec> {
///         vec![SlotSpec::input("Input"), SlotSpec::output("Output")]
///     }
///
///     fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
///         let meta = ctx.input_meta("Input")?;
///         ctx.publish_meta("Output", (*meta).clone())
///     }
///
///     fn execute(&self, ctx: &ExecuteContext, _: &Slot, roi: &Roi) -> Result<ArrayData, ExecutionError> {
///         let data = ctx.request_input("Input", roi)?;
///         Ok(invert(&data))
///     }
///
///     fn propagate_dirty(&self, node: &Node, _: &Slot, roi: &Roi) -> Result<(), GraphError> {
///         node.output("Output")?.set_dirty(roi)
///     }
/// }
/// ```
pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Slot declarations, in declaration order.
    fn slots(&self) -> Vec<SlotSpec>;

    /// Called once after the node and its slots exist, before the first setup.
    fn attach(&mut self, _node: &Node) -> Result<(), GraphError> {
        Ok(())
    }

    /// Derive output metadata from the inputs.
    ///
    /// Must not block on data from this operator's own outputs. Children
    /// created here are torn down again if this returns an error.
    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError>;

    /// Produce `roi` of `slot`. The result must have the region's shape and the
    /// published dtype.
    fn execute(
        &self,
        ctx: &ExecuteContext,
        slot: &Slot,
        roi: &Roi,
    ) -> Result<ArrayData, ExecutionError>;

    /// Map a stale input region to the affected output regions and mark them dirty.
    fn propagate_dirty(&self, node: &Node, slot: &Slot, roi: &Roi) -> Result<(), GraphError>;

    /// Release resources held for the current configuration.
    ///
    /// Called when the operator becomes unconfigured, when setup fails, and on
    /// clean-up. Must tolerate being called when nothing is held.
    fn teardown(&mut self, _node: &Node) {}
}
