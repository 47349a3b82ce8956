// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec, SlotType};
use crate::metadata::MetaDict;
use crate::traits::Operator;

/// Overlays the `Metadata` dict on the metadata of `Input`.
///
/// Keys left unset in the overlay pass through. Data is not touched, so the
/// overlay must not change shape or dtype in a way the data contradicts.
#[derive(Debug, Default)]
pub struct OpMetadataInjector;

impl OpMetadataInjector {
    pub fn new() -> Self {
        Self
    }
}

impl Operator for OpMetadataInjector {
    fn name(&self) -> &'static str {
        "OpMetadataInjector"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("Input"),
            SlotSpec::input("Metadata").of_type(SlotType::Object),
            SlotSpec::output("Output"),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        let meta = ctx.input_meta("Input")?;
        let overlay = ctx.input_object::<MetaDict>("Metadata")?;
        let merged = meta.merged(&overlay);
        if merged.shape != meta.shape || merged.dtype != meta.dtype {
            return Err(GraphError::configuration(
                self.name(),
                "metadata overlay may not change shape or dtype",
            ));
        }
        ctx.publish_meta("Output", merged)
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

    fn propagate_dirty(&self, node: &Node, slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        let output = node.output("Output")?;
        match slot.name() {
            "Input" => output.set_dirty(roi),
            _ => output.set_dirty_all(),
        }
    }
}
