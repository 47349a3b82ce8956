// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Weak};

use super::op_data_selection::OpDataSelection;
use crate::array::{ArrayData, Roi, Value};
use crate::config::ProviderRegistry;
use crate::engine::OperatorWrapper;
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Graph, Node, NodeInner, SetupContext, Slot, SlotSpec, SlotType};
use crate::traits::Operator;

/// Inputs every role of a group shares.
const SHARED_INPUTS: [&str; 3] = ["ProjectFile", "ProjectDataGroup", "WorkingDirectory"];

/// One [`OpDataSelection`] per dataset role of a single lane.
///
/// `DatasetRoles` holds the role names (a `Vec<String>` object) and sizes
/// `DatasetGroup` to match. `DatasetGroup[i]` takes the [`DatasetInfo`] of
/// role `i`. `Image`, `Image1` and `Image2` are shortcuts to the first three
/// roles, `ImageName` and `AllowLabels` come from the first role.
///
/// [`DatasetInfo`]: super::DatasetInfo
pub struct OpDataSelectionGroup {
    registry: Arc<ProviderRegistry>,
    force_axis_order: Option<Vec<String>>,
    roles: Vec<String>,
    selections: Option<OperatorWrapper>,
}

impl OpDataSelectionGroup {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            force_axis_order: None,
            roles: Vec::new(),
            selections: None,
        }
    }

    pub fn with_force_axis_order(mut self, orders: Option<Vec<String>>) -> Self {
        self.force_axis_order = orders;
        self
    }

    fn clean_up_selections(&mut self) {
        if let Some(selections) = self.selections.take() {
            selections.clean_up();
        }
    }

    fn build_selections(&self, ctx: &SetupContext) -> Result<OperatorWrapper, GraphError> {
        let registry = self.registry.clone();
        let force = self.force_axis_order.clone();
        let selections = OperatorWrapper::new_child(
            ctx.node(),
            move || OpDataSelection::new(registry.clone()).with_force_axis_order(force.clone()),
            &SHARED_INPUTS,
        )?;
        for name in SHARED_INPUTS {
            selections.input(name)?.connect(&ctx.input(name)?)?;
        }
        selections.input("Dataset")?.connect(&ctx.input("DatasetGroup")?)?;
        Ok(selections)
    }
}

impl Operator for OpDataSelectionGroup {
    fn name(&self) -> &'static str {
        "OpDataSelectionGroup"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("ProjectFile")
                .of_type(SlotType::Object)
                .optional(),
            SlotSpec::input("ProjectDataGroup")
                .of_type(SlotType::String)
                .optional(),
            SlotSpec::input("WorkingDirectory").of_type(SlotType::String),
            SlotSpec::input("DatasetRoles").of_type(SlotType::Object),
            SlotSpec::input("DatasetGroup")
                .of_type(SlotType::Object)
                .level(1)
                .optional(),
            SlotSpec::output("ImageGroup").level(1),
            SlotSpec::output("NonTransposedImageGroup").level(1),
            SlotSpec::output("Image"),
            SlotSpec::output("Image1"),
            SlotSpec::output("Image2"),
            SlotSpec::output("AllowLabels").of_type(SlotType::Bool),
            SlotSpec::output("ImageName").of_type(SlotType::String),
        ]
    }

    fn attach(&mut self, node: &Node) -> Result<(), GraphError> {
        let weak: Weak<NodeInner> = Arc::downgrade(&node.0);
        node.input("DatasetRoles")?.notify_ready(move |slot| {
            let Some(node) = weak.upgrade().map(Node) else {
                return;
            };
            let Some(roles) = slot.value().ok().and_then(|v| v.downcast::<Vec<String>>()) else {
                return;
            };
            let resized = node
                .input("DatasetGroup")
                .and_then(|group| group.resize(roles.len()));
            if let Err(e) = resized {
                tracing::warn!(error = %e, roles = roles.len(), "could not resize dataset group");
            }
        });
        Ok(())
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        let roles = ctx.input_object::<Vec<String>>("DatasetRoles")?;
        let group = ctx.input("DatasetGroup")?;
        if group.len() != roles.len() {
            group.resize(roles.len())?;
        }

        if self.selections.is_none() || self.roles != *roles {
            self.clean_up_selections();
            self.selections = Some(self.build_selections(ctx)?);
            self.roles = roles.to_vec();
        }
        let Some(selections) = self.selections.clone() else {
            return Ok(());
        };

        let role_names = selections.input("RoleName")?;
        for (index, role) in roles.iter().enumerate() {
            let Some(slot) = role_names.subslot(index) else {
                continue;
            };
            let current = slot.value().ok().and_then(|v| v.as_str().map(str::to_string));
            if current.as_deref() != Some(role.as_str()) {
                slot.set_value(role.as_str())?;
            }
        }

        ctx.forward("ImageGroup", &selections.output("Image")?)?;
        ctx.forward(
            "NonTransposedImageGroup",
            &selections.output("NonTransposedImage")?,
        )?;

        let images = selections.output("Image")?;
        for (index, name) in ["Image", "Image1", "Image2"].into_iter().enumerate() {
            match images.subslot(index) {
                Some(image) => ctx.forward(name, &image)?,
                None => ctx.disconnect_output(name)?,
            }
        }

        for name in ["ImageName", "AllowLabels"] {
            match selections.output(name)?.subslot(0) {
                Some(first) => ctx.forward(name, &first)?,
                None => ctx.disconnect_output(name)?,
            }
        }
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecuteContext,
        slot: &Slot,
        _roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        Err(ExecutionError::Internal(format!(
            "'{}' is served by the group's selections",
            slot.qualified_name()
        )))
    }

    fn propagate_dirty(&self, node: &Node, slot: &Slot, _roi: &Roi) -> Result<(), GraphError> {
        // Other inputs reach the selections through their connections.
        if slot.name() != "DatasetRoles" {
            return Ok(());
        }
        for name in ["ImageGroup", "NonTransposedImageGroup"] {
            for image in node.output(name)?.subslots() {
                image.set_dirty_all()?;
            }
        }
        for name in ["Image", "Image1", "Image2"] {
            node.output(name)?.set_dirty_all()?;
        }
        Ok(())
    }

    fn teardown(&mut self, _node: &Node) {
        self.clean_up_selections();
        self.roles.clear();
    }
}

/// A lane-replicated [`OpDataSelectionGroup`].
///
/// Project, working directory and role inputs are shared by every lane;
/// `DatasetGroup` is promoted, so `DatasetGroup[lane][role]` addresses one
/// dataset.
pub fn multi_lane_data_selection(
    graph: &Graph,
    registry: Arc<ProviderRegistry>,
    force_axis_order: Option<Vec<String>>,
) -> Result<OperatorWrapper, GraphError> {
    OperatorWrapper::new(
        graph,
        move || {
            OpDataSelectionGroup::new(registry.clone()).with_force_axis_order(force_axis_order.clone())
        },
        &[
            "ProjectFile",
            "ProjectDataGroup",
            "WorkingDirectory",
            "DatasetRoles",
        ],
    )
}

/// Role names as stored on a `DatasetRoles` slot.
pub fn dataset_roles<S: AsRef<str>>(roles: &[S]) -> Value {
    Value::object(roles.iter().map(|r| r.as_ref().to_string()).collect::<Vec<String>>())
}
