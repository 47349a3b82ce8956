// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec};
use crate::traits::Operator;

/// Passes `Input` through to `Output` unchanged.
#[derive(Debug, Default)]
pub struct OpArrayPiper;

impl OpArrayPiper {
    pub fn new() -> Self {
        Self
    }
}

impl Operator for OpArrayPiper {
    fn name(&self) -> &'static str {
        "OpArrayPiper"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![SlotSpec::input("Input"), SlotSpec::output("Output")]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        let meta = ctx.input_meta("Input")?;
        ctx.publish_meta("Output", (*meta).clone())
    }

    fn execute(
        &self,
        ctx: &ExecuteContext,
        _slot: &Slot,
        roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        let data = ctx.request_input("Input", roi)?;
        Ok((*data).clone())
    }

    fn propagate_dirty(&self, node: &Node, _slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        node.output("Output")?.set_dirty(roi)
    }
}
