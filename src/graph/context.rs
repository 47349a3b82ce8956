// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::node::Node;
use super::slot::{Slot, SlotType};
use super::Graph;
use crate::array::{ArrayData, Roi, Value};
use crate::errors::{ExecutionError, GraphError};
use crate::metadata::MetaDict;
use crate::traits::Operator;

/// An output slot, or one of its sub-slots.
#[derive(Debug, Clone)]
struct OutputPath {
    name: String,
    index: Option<usize>,
}

enum Deferred {
    Publish(OutputPath, MetaDict),
    Value(OutputPath, Value),
    Forward(OutputPath, Slot),
    Disconnect(OutputPath),
    Resize(String, usize),
}

/// Handed to [`Operator::setup_outputs`].
///
/// Reads of inputs happen immediately. Changes to the node's own outputs are
/// recorded and applied once setup has returned successfully; a failing
/// setup leaves the outputs untouched and not ready.
pub struct SetupContext<'a> {
    node: &'a Node,
    actions: Vec<Deferred>,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self {
            node,
            actions: Vec::new(),
        }
    }

    pub fn node(&self) -> &Node {
        self.node
    }

    pub fn graph(&self) -> Result<Graph, GraphError> {
        self.node.graph().ok_or_else(|| GraphError::TornDown {
            operator: self.node.name().to_string(),
        })
    }

    pub fn input(&self, name: &str) -> Result<Slot, GraphError> {
        self.node.input(name)
    }

    pub fn output(&self, name: &str) -> Result<Slot, GraphError> {
        self.node.output(name)
    }

    /// Metadata of a ready input.
    pub fn input_meta(&self, name: &str) -> Result<Arc<MetaDict>, GraphError> {
        let slot = self.input(name)?;
        if !slot.is_ready() {
            return Err(GraphError::NotReady {
                slot: slot.qualified_name(),
            });
        }
        Ok(slot.meta())
    }

    pub fn input_value(&self, name: &str) -> Result<Value, GraphError> {
        self.input(name)?.value()
    }

    pub fn input_object<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, GraphError> {
        let value = self.input_value(name)?;
        value.downcast::<T>().ok_or_else(|| GraphError::TypeMismatch {
            slot: format!("{}.{}", self.node.name(), name),
            expected: std::any::type_name::<T>().to_string(),
            found: value.stype().to_string(),
        })
    }

    pub fn input_string(&self, name: &str) -> Result<String, GraphError> {
        let value = self.input_value(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GraphError::TypeMismatch {
                slot: format!("{}.{}", self.node.name(), name),
                expected: SlotType::String.to_string(),
                found: value.stype().to_string(),
            })
    }

    pub fn input_bool(&self, name: &str) -> Result<bool, GraphError> {
        let value = self.input_value(name)?;
        value.as_bool().ok_or_else(|| GraphError::TypeMismatch {
            slot: format!("{}.{}", self.node.name(), name),
            expected: SlotType::Bool.to_string(),
            found: value.stype().to_string(),
        })
    }

    /// Publish metadata on an array output. Data is produced by `execute`.
    pub fn publish_meta(&mut self, output: &str, meta: MetaDict) -> Result<(), GraphError> {
        self.publish_meta_path(output, None, meta)
    }

    /// Publish metadata on sub-slot `index` of a leveled output.
    pub fn publish_meta_at(
        &mut self,
        output: &str,
        index: usize,
        meta: MetaDict,
    ) -> Result<(), GraphError> {
        self.publish_meta_path(output, Some(index), meta)
    }

    fn publish_meta_path(
        &mut self,
        output: &str,
        index: Option<usize>,
        meta: MetaDict,
    ) -> Result<(), GraphError> {
        let slot = self.output(output)?;
        if slot.stype() == SlotType::Array {
            meta.validate()?;
        }
        self.actions.push(Deferred::Publish(
            OutputPath {
                name: slot.name().to_string(),
                index,
            },
            meta,
        ));
        Ok(())
    }

    /// Store a plain value on an output (strings, flags, objects).
    pub fn publish_value(&mut self, output: &str, value: impl Into<Value>) -> Result<(), GraphError> {
        let slot = self.output(output)?;
        self.actions.push(Deferred::Value(
            OutputPath {
                name: slot.name().to_string(),
                index: None,
            },
            value.into(),
        ));
        Ok(())
    }

    /// Make an output follow `source`, typically a child operator's output.
    pub fn forward(&mut self, output: &str, source: &Slot) -> Result<(), GraphError> {
        self.forward_path(output, None, source)
    }

    pub fn forward_at(&mut self, output: &str, index: usize, source: &Slot) -> Result<(), GraphError> {
        self.forward_path(output, Some(index), source)
    }

    fn forward_path(
        &mut self,
        output: &str,
        index: Option<usize>,
        source: &Slot,
    ) -> Result<(), GraphError> {
        let slot = self.output(output)?;
        let level = slot.level() - usize::from(index.is_some() && slot.level() > 0);
        if source.level() != level {
            return Err(GraphError::LevelMismatch {
                slot: slot.qualified_name(),
                expected: level,
                found: source.level(),
            });
        }
        if !slot.stype().accepts(source.stype()) {
            return Err(GraphError::TypeMismatch {
                slot: slot.qualified_name(),
                expected: slot.stype().to_string(),
                found: source.stype().to_string(),
            });
        }
        self.actions.push(Deferred::Forward(
            OutputPath {
                name: slot.name().to_string(),
                index,
            },
            source.clone(),
        ));
        Ok(())
    }

    pub fn resize_output(&mut self, output: &str, len: usize) -> Result<(), GraphError> {
        let slot = self.output(output)?;
        if slot.level() == 0 {
            return Err(GraphError::LevelMismatch {
                slot: slot.qualified_name(),
                expected: 1,
                found: 0,
            });
        }
        self.actions
            .push(Deferred::Resize(slot.name().to_string(), len));
        Ok(())
    }

    /// Leave an output empty for this configuration.
    pub fn disconnect_output(&mut self, output: &str) -> Result<(), GraphError> {
        let slot = self.output(output)?;
        self.actions.push(Deferred::Disconnect(OutputPath {
            name: slot.name().to_string(),
            index: None,
        }));
        Ok(())
    }

    /// Create a child operator owned by this node.
    ///
    /// Children created during a setup that fails are torn down again.
    pub fn create_child(&self, op: impl Operator + 'static) -> Result<Node, GraphError> {
        Node::new_child(self.node, op)
    }

    pub fn create_child_boxed(&self, op: Box<dyn Operator>) -> Result<Node, GraphError> {
        Node::new_child_boxed(self.node, op)
    }

    fn resolve(&self, path: &OutputPath) -> Result<Slot, GraphError> {
        let slot = self.output(&path.name)?;
        match path.index {
            Some(index) => slot.at(index),
            None => Ok(slot),
        }
    }

    /// Apply the recorded output changes in order. Returns the names of the
    /// outputs that were touched.
    pub(crate) fn apply(self) -> Result<HashSet<String>, GraphError> {
        let mut touched = HashSet::new();
        for action in &self.actions {
            match action {
                Deferred::Resize(name, len) => {
                    self.output(name)?.resize(*len)?;
                    touched.insert(name.clone());
                }
                Deferred::Publish(path, meta) => {
                    self.resolve(path)?.publish(meta.clone())?;
                    touched.insert(path.name.clone());
                }
                Deferred::Value(path, value) => {
                    self.resolve(path)?.set_value(value.clone())?;
                    touched.insert(path.name.clone());
                }
                Deferred::Forward(path, source) => {
                    self.resolve(path)?.connect(source)?;
                    touched.insert(path.name.clone());
                }
                Deferred::Disconnect(path) => {
                    self.resolve(path)?.disconnect()?;
                    touched.insert(path.name.clone());
                }
            }
        }
        Ok(touched)
    }
}

/// Handed to [`Operator::execute`].
pub struct ExecuteContext {
    node: Node,
    token: CancellationToken,
}

impl ExecuteContext {
    pub(crate) fn new(node: Node, token: CancellationToken) -> Self {
        Self { node, token }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn input(&self, name: &str) -> Result<Slot, ExecutionError> {
        self.node
            .input(name)
            .map_err(|e| ExecutionError::Internal(e.to_string()))
    }

    /// Read `roi` from `slot` on behalf of this request. Cancelling the
    /// request cancels the upstream read as well.
    pub fn request(&self, slot: &Slot, roi: &Roi) -> Result<Arc<ArrayData>, ExecutionError> {
        self.check_cancelled()?;
        slot.get_with_token(roi, self.token.child_token()).wait()
    }

    pub fn request_input(&self, name: &str, roi: &Roi) -> Result<Arc<ArrayData>, ExecutionError> {
        let slot = self.input(name)?;
        self.request(&slot, roi)
    }

    pub fn input_value(&self, name: &str) -> Result<Value, ExecutionError> {
        self.input(name)?
            .value()
            .map_err(|e| match e {
                GraphError::Execution(inner) => inner,
                GraphError::NotReady { slot } => ExecutionError::NotReady { slot },
                other => ExecutionError::Internal(other.to_string()),
            })
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.token.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}
