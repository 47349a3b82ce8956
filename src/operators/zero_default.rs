// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec, SlotType};
use crate::metadata::MetaDict;
use crate::traits::Operator;

/// Serves `Input` when it is ready, and zeros shaped like `MetaInput`
/// otherwise.
///
/// Stands in for data that is described but not available, so downstream
/// operators can be configured before the real source exists.
#[derive(Debug, Default)]
pub struct OpZeroDefault {
    passthrough: bool,
}

impl OpZeroDefault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for OpZeroDefault {
    fn name(&self) -> &'static str {
        "OpZeroDefault"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("MetaInput").of_type(SlotType::Object),
            SlotSpec::input("Input").optional(),
            SlotSpec::output("Output"),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        let input = ctx.input("Input")?;
        self.passthrough = input.is_ready();
        let meta = if self.passthrough {
            (*input.meta()).clone()
        } else {
            (*ctx.input_object::<MetaDict>("MetaInput")?).clone()
        };
        ctx.publish_meta("Output", meta)
    }

    fn execute(
        &self,
        ctx: &ExecuteContext,
        slot: &Slot,
        roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        if self.passthrough {
            let data = ctx.request_input("Input", roi)?;
            return Ok((*data).clone());
        }
        let dtype = slot.meta().dtype.ok_or_else(|| ExecutionError::NotReady {
            slot: slot.qualified_name(),
        })?;
        Ok(ArrayData::zeros(dtype, &roi.shape()))
    }

    fn propagate_dirty(&self, node: &Node, slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        let output = node.output("Output")?;
        match slot.name() {
            "Input" if self.passthrough => output.set_dirty(roi),
            "Input" => Ok(()),
            _ => output.set_dirty_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{TaggedArray, Value};
    use crate::graph::Graph;
    use crate::metadata::{AxisTags, Dtype};

    fn template() -> MetaDict {
        MetaDict::for_array(vec![2, 3], Dtype::F32, AxisTags::from_keys("yx").unwrap())
    }

    #[test]
    fn serves_zeros_without_input() {
        let graph = Graph::with_defaults().unwrap();
        let node = Node::new(&graph, OpZeroDefault::new()).unwrap();
        node.input("MetaInput")
            .unwrap()
            .set_value(Value::object(template()))
            .unwrap();

        let output = node.output("Output").unwrap();
        assert_eq!(output.meta().shape, Some(vec![2, 3]));
        let data = output.get(&Roi::full(&[2, 3])).wait().unwrap();
        assert_eq!(*data, ArrayData::zeros(Dtype::F32, &[2, 3]));
    }

    #[test]
    fn switches_to_the_input_once_it_is_set() {
        let graph = Graph::with_defaults().unwrap();
        let node = Node::new(&graph, OpZeroDefault::new()).unwrap();
        node.input("MetaInput")
            .unwrap()
            .set_value(Value::object(template()))
            .unwrap();

        let real = ArrayData::from_shape_vec(&[1, 2], vec![7u8, 9]).unwrap();
        node.input("Input")
            .unwrap()
            .set_value(TaggedArray::tagged(real.clone(), AxisTags::from_keys("yx").unwrap()))
            .unwrap();

        let output = node.output("Output").unwrap();
        assert_eq!(output.meta().dtype, Some(Dtype::U8));
        assert_eq!(*output.get(&Roi::full(&[1, 2])).wait().unwrap(), real);
    }
}
