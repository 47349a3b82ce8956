// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lane replication of a single-image operator.
//!
//! An [`OperatorWrapper`] instantiates one copy ("lane") of a template
//! operator per entry of its promoted inputs. Every input that is not named
//! as broadcasting is promoted one level: lane `i` reads sub-slot `i` of the
//! wrapper's input. Broadcasting inputs keep their level and every lane
//! follows the same wrapper slot. Outputs are promoted the same way, so
//! `len(output) == len(lanes)` at all times.
//!
//! Resizing any promoted input adds or removes lanes; adding a lane
//! connects it to the broadcasting slots without further calls.
//!
//! ```ignore
//! let wrapper = OperatorWrapper::new(&graph, OpScale::default, &["Factor"])?;
//! wrapper.input("Factor")?.set_value(Value::object(2.0f64))?;
//! wrapper.input("Input")?.resize(3)?;
//! assert_eq!(wrapper.len(), 3);
//! ```

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

use crate::array::{ArrayData, Roi, Value};
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{
    Direction, ExecuteContext, Graph, Node, NodeInner, SetupContext, Slot, SlotSpec,
};
use crate::observability::messages::graph::{LaneAdded, LaneRemoved};
use crate::observability::messages::StructuredLog;
use crate::traits::Operator;

type OperatorFactory = Arc<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

fn record(first: &mut Option<GraphError>, result: Result<(), GraphError>) {
    if let Err(e) = result {
        first.get_or_insert(e);
    }
}

/// The wrapper's own operator: declares the promoted slots and computes nothing.
struct WrapperOp {
    specs: Vec<SlotSpec>,
}

impl Operator for WrapperOp {
    fn name(&self) -> &'static str {
        "OperatorWrapper"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        self.specs.clone()
    }

    fn setup_outputs(&mut self, _ctx: &mut SetupContext) -> Result<(), GraphError> {
        // Outputs follow the lanes' outputs directly.
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecuteContext,
        slot: &Slot,
        _roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        Err(ExecutionError::Internal(format!(
            "wrapper output '{}' is not connected to a lane",
            slot.qualified_name()
        )))
    }

    fn propagate_dirty(&self, _node: &Node, _slot: &Slot, _roi: &Roi) -> Result<(), GraphError> {
        Ok(())
    }
}

struct WrapperShared {
    factory: OperatorFactory,
    broadcast: Vec<String>,
    /// Promoted inputs with the template's default value, if any.
    promoted: Vec<(String, Option<Value>)>,
    outputs: Vec<String>,
    node: Weak<NodeInner>,
    lanes: Mutex<Vec<Node>>,
}

/// Handle to a lane-replicating wrapper node.
#[derive(Clone)]
pub struct OperatorWrapper {
    node: Node,
    shared: Arc<WrapperShared>,
}

impl std::fmt::Debug for OperatorWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorWrapper")
            .field("node", &self.node.id())
            .field("lanes", &self.len())
            .finish()
    }
}

impl OperatorWrapper {
    /// Wrap operators built by `factory` in a new top-level node of `graph`.
    pub fn new<O, F>(graph: &Graph, factory: F, broadcast: &[&str]) -> Result<Self, GraphError>
    where
        O: Operator + 'static,
        F: Fn() -> O + Send + Sync + 'static,
    {
        let factory: OperatorFactory = Arc::new(move || Box::new(factory()) as Box<dyn Operator>);
        Self::build(factory, broadcast, |op| Node::new(graph, op))
    }

    /// Like [`OperatorWrapper::new`], but as a child of `parent`.
    pub fn new_child<O, F>(parent: &Node, factory: F, broadcast: &[&str]) -> Result<Self, GraphError>
    where
        O: Operator + 'static,
        F: Fn() -> O + Send + Sync + 'static,
    {
        let factory: OperatorFactory = Arc::new(move || Box::new(factory()) as Box<dyn Operator>);
        Self::build(factory, broadcast, |op| Node::new_child(parent, op))
    }

    fn build(
        factory: OperatorFactory,
        broadcast: &[&str],
        instantiate: impl FnOnce(WrapperOp) -> Result<Node, GraphError>,
    ) -> Result<Self, GraphError> {
        let template = factory();
        let template_specs = template.slots();

        for name in broadcast {
            let declared = template_specs
                .iter()
                .any(|s| s.direction == Direction::Input && s.name == *name);
            if !declared {
                return Err(GraphError::UnknownSlot {
                    operator: template.name().to_string(),
                    slot: name.to_string(),
                });
            }
        }

        let mut specs = Vec::new();
        let mut promoted = Vec::new();
        let mut outputs = Vec::new();
        for spec in template_specs {
            let is_broadcast = broadcast.contains(&spec.name.as_str());
            let mut wrapped = spec.clone();
            match spec.direction {
                Direction::Input if is_broadcast => {
                    wrapped.optional = true;
                }
                Direction::Input => {
                    wrapped.level += 1;
                    wrapped.optional = true;
                    wrapped.default = None;
                    promoted.push((spec.name.clone(), spec.default.clone()));
                }
                Direction::Output => {
                    wrapped.level += 1;
                    outputs.push(spec.name.clone());
                }
            }
            specs.push(wrapped);
        }
        drop(template);

        let node = instantiate(WrapperOp { specs })?;
        let shared = Arc::new(WrapperShared {
            factory,
            broadcast: broadcast.iter().map(|s| s.to_string()).collect(),
            promoted,
            outputs,
            node: Arc::downgrade(&node.0),
            lanes: Mutex::new(Vec::new()),
        });

        for (name, _) in &shared.promoted {
            let slot = node.input(name)?;
            let on_insert = shared.clone();
            slot.notify_inserted(move |_, index, new_len| {
                if on_insert.lanes.lock().len() < new_len {
                    on_insert.add_lane(index)
                } else {
                    Ok(())
                }
            });
            let on_remove = shared.clone();
            slot.notify_removed(move |_, index, new_len| {
                if on_remove.lanes.lock().len() > new_len {
                    on_remove.remove_lane(index)
                } else {
                    Ok(())
                }
            });
        }

        Ok(Self { node, shared })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn input(&self, name: &str) -> Result<Slot, GraphError> {
        self.node.input(name)
    }

    pub fn output(&self, name: &str) -> Result<Slot, GraphError> {
        self.node.output(name)
    }

    /// Number of lanes.
    pub fn len(&self) -> usize {
        self.shared.lanes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lanes(&self) -> Vec<Node> {
        self.shared.lanes.lock().clone()
    }

    pub fn lane(&self, index: usize) -> Option<Node> {
        self.shared.lanes.lock().get(index).cloned()
    }

    /// Insert a lane at `index`, shifting later lanes up.
    pub fn add_lane(&self, index: usize) -> Result<(), GraphError> {
        self.shared.add_lane(index)
    }

    /// Remove lane `index` and tear its operator down.
    pub fn remove_lane(&self, index: usize) -> Result<(), GraphError> {
        self.shared.remove_lane(index)
    }

    /// Grow or shrink to `n` lanes, adding and removing at the end.
    pub fn resize(&self, n: usize) -> Result<(), GraphError> {
        while self.len() < n {
            self.add_lane(self.len())?;
        }
        while self.len() > n {
            self.remove_lane(self.len() - 1)?;
        }
        Ok(())
    }

    /// Tear down the wrapper and every lane.
    pub fn clean_up(&self) {
        self.node.clean_up();
        self.shared.lanes.lock().clear();
    }
}

impl WrapperShared {
    fn node(&self) -> Result<Node, GraphError> {
        self.node.upgrade().map(Node).ok_or_else(|| GraphError::TornDown {
            operator: "OperatorWrapper".to_string(),
        })
    }

    fn add_lane(&self, index: usize) -> Result<(), GraphError> {
        let node = self.node()?;
        let current = self.lanes.lock().len();
        if index > current {
            return Err(GraphError::IndexOutOfRange {
                slot: format!("{}.lanes", node.name()),
                index,
                len: current,
            });
        }

        let lane = Node::new_child_boxed(&node, (self.factory)())?;
        let lanes = {
            let mut lanes = self.lanes.lock();
            lanes.insert(index, lane.clone());
            lanes.len()
        };

        // Structure first so the lane counts stay in step even when the
        // lane's setup rejects its inputs. Such a lane keeps its connections
        // and stays in the error phase.
        let mut first = None;
        for name in &self.outputs {
            let outer = node.output(name)?;
            if outer.len() < lanes {
                outer.insert_slot(index)?;
            }
            record(&mut first, outer.at(index)?.connect(&lane.output(name)?));
        }
        for (name, default) in &self.promoted {
            let outer = node.input(name)?;
            if outer.len() < lanes {
                record(&mut first, outer.insert_slot(index));
            }
            let sub = outer.at(index)?;
            if let Some(default) = default {
                if !sub.has_value() && !sub.is_connected() {
                    record(&mut first, sub.set_value(default.clone()));
                }
            }
            record(&mut first, lane.input(name)?.connect_kept(&sub));
        }
        for name in &self.broadcast {
            record(&mut first, lane.input(name)?.connect_kept(&node.input(name)?));
        }

        LaneAdded {
            wrapper: node.name(),
            index,
            lanes,
        }
        .log();
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn remove_lane(&self, index: usize) -> Result<(), GraphError> {
        let node = self.node()?;
        let (lane, lanes) = {
            let mut lanes = self.lanes.lock();
            if index >= lanes.len() {
                return Err(GraphError::IndexOutOfRange {
                    slot: format!("{}.lanes", node.name()),
                    index,
                    len: lanes.len(),
                });
            }
            let lane = lanes.remove(index);
            (lane, lanes.len())
        };
        lane.clean_up();

        if !node.is_torn_down() {
            for (name, _) in &self.promoted {
                let outer = node.input(name)?;
                if outer.len() > lanes {
                    outer.remove_slot(index)?;
                }
            }
            for name in &self.outputs {
                let outer = node.output(name)?;
                if outer.len() > lanes {
                    outer.remove_slot(index)?;
                }
            }
        }

        LaneRemoved {
            wrapper: node.name(),
            index,
            lanes,
        }
        .log();
        Ok(())
    }
}
