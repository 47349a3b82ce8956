// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Axis reordering.
//!
//! [`OpReorderAxes`] presents its input in the axis order given on
//! `AxisOrder`. Axes the input lacks are added as singletons; axes the order
//! lacks are dropped, which is only allowed for singleton axes.

use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec, SlotType};
use crate::metadata::AxisTags;
use crate::traits::Operator;

pub const DEFAULT_AXIS_ORDER: &str = "tczyx";

/// How a source region maps onto the requested order.
#[derive(Debug, Clone, PartialEq)]
struct AxisPlan {
    source: Vec<char>,
    target: Vec<char>,
    /// Source indices of the singleton axes the target lacks, ascending.
    dropped: Vec<usize>,
    /// Permutation applied after dropping.
    permutation: Vec<usize>,
    /// Target indices of the singleton axes the source lacks, ascending.
    inserted: Vec<usize>,
}

impl AxisPlan {
    fn new(source: &AxisTags, shape: &[usize], target: &AxisTags) -> Result<Self, String> {
        let source: Vec<char> = source.iter().map(|t| t.key).collect();
        let target: Vec<char> = target.iter().map(|t| t.key).collect();

        let mut dropped = Vec::new();
        for (i, key) in source.iter().enumerate() {
            if !target.contains(key) {
                if shape[i] != 1 {
                    return Err(format!(
                        "cannot drop axis '{}' of extent {}",
                        key, shape[i]
                    ));
                }
                dropped.push(i);
            }
        }

        let kept: Vec<char> = source
            .iter()
            .copied()
            .filter(|k| target.contains(k))
            .collect();
        let permutation = target
            .iter()
            .filter_map(|k| kept.iter().position(|c| c == k))
            .collect();
        let inserted = target
            .iter()
            .enumerate()
            .filter(|(_, k)| !source.contains(k))
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            source,
            target,
            dropped,
            permutation,
            inserted,
        })
    }

    fn target_shape(&self, shape: &[usize]) -> Vec<usize> {
        self.target
            .iter()
            .map(|k| {
                self.source
                    .iter()
                    .position(|c| c == k)
                    .map_or(1, |i| shape[i])
            })
            .collect()
    }

    /// The source region needed to serve `roi` of the output.
    fn source_roi(&self, roi: &Roi) -> Roi {
        let (start, stop): (Vec<usize>, Vec<usize>) = self
            .source
            .iter()
            .map(|k| match self.target.iter().position(|c| c == k) {
                Some(o) => (roi.start[o], roi.stop[o]),
                None => (0, 1),
            })
            .unzip();
        Roi::new(start, stop)
    }

    /// The output region affected by a change to `roi` of the source.
    fn target_roi(&self, roi: &Roi) -> Roi {
        let (start, stop): (Vec<usize>, Vec<usize>) = self
            .target
            .iter()
            .map(|k| match self.source.iter().position(|c| c == k) {
                Some(i) => (roi.start[i], roi.stop[i]),
                None => (0, 1),
            })
            .unzip();
        Roi::new(start, stop)
    }

    fn apply(&self, data: &ArrayData) -> Result<ArrayData, ExecutionError> {
        let mut out = data.clone();
        for &i in self.dropped.iter().rev() {
            out = out.remove_axis(i)?;
        }
        out = out.permuted(&self.permutation)?;
        for &i in &self.inserted {
            out = out.insert_axis(i)?;
        }
        Ok(out)
    }
}

/// Presents `Input` in the order given by `AxisOrder`.
#[derive(Debug, Default)]
pub struct OpReorderAxes {
    plan: Option<AxisPlan>,
}

impl OpReorderAxes {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for OpReorderAxes {
    fn name(&self) -> &'static str {
        "OpReorderAxes"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("Input"),
            SlotSpec::input("AxisOrder")
                .of_type(SlotType::String)
                .default_value(DEFAULT_AXIS_ORDER),
            SlotSpec::output("Output"),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        self.plan = None;
        let meta = ctx.input_meta("Input")?;
        let target = AxisTags::from_keys(&ctx.input_string("AxisOrder")?)?;
        let (Some(source), Some(shape)) = (meta.axistags.as_ref(), meta.shape.as_ref()) else {
            return Err(GraphError::configuration(self.name(), "input has no axistags"));
        };

        let plan = AxisPlan::new(source, shape, &target)
            .map_err(|message| GraphError::configuration(self.name(), message))?;

        let mut out = (*meta).clone();
        out.shape = Some(plan.target_shape(shape));
        out.axistags = Some(target);
        self.plan = Some(plan);
        ctx.publish_meta("Output", out)
    }

    fn execute(
        &self,
        ctx: &ExecuteContext,
        _slot: &Slot,
        roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| ExecutionError::Internal("axis order was not configured".to_string()))?;
        let data = ctx.request_input("Input", &plan.source_roi(roi))?;
        plan.apply(&data)
    }

    fn propagate_dirty(&self, node: &Node, slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        let output = node.output("Output")?;
        match (slot.name(), &self.plan) {
            ("Input", Some(plan)) => output.set_dirty(&plan.target_roi(roi)),
            _ => output.set_dirty_all(),
        }
    }
}
