// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operator instances placed in a graph.
//!
//! A [`Node`] owns an [`Operator`] implementation, the slots it declared and
//! the child operators it created. The node drives the operator's lifecycle:
//!
//! ```text
//! Unconfigured --(all required inputs ready, setup ok)--> Ready
//! Ready --(required input lost)--> Unconfigured
//! Unconfigured/Ready --(setup failed)--> Error --(inputs change)--> ...
//! ```
//!
//! Setup runs with exclusive access to the operator. Everything setup asks
//! for on the node's own outputs is recorded by the [`SetupContext`] and
//! applied after the operator is released, so downstream operators may read
//! this node's outputs while they reconfigure.

use parking_lot::{Mutex, RwLock};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use super::context::{ExecuteContext, SetupContext};
use super::slot::{Direction, Slot};
use super::{Graph, GraphInner};
use crate::array::{ArrayData, Roi};
use crate::errors::{ExecutionError, GraphError};
use crate::metadata::MetaDict;
use crate::observability::messages::graph::{
    OperatorCleanedUp, OperatorConfigured, OperatorUnconfigured, SetupFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Operator;

/// Configuration state of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Unconfigured,
    Ready,
    Error(GraphError),
}

struct NodeState {
    phase: Phase,
    configuring: bool,
    pending: bool,
    torn_down: bool,
    cleanup_deferred: bool,
}

pub(crate) struct NodeInner {
    id: u64,
    name: String,
    graph: Weak<GraphInner>,
    parent: Weak<NodeInner>,
    inputs: Vec<Slot>,
    outputs: Vec<Slot>,
    imp: RwLock<Box<dyn Operator>>,
    state: Mutex<NodeState>,
    children: Mutex<Vec<Node>>,
}

impl NodeInner {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

/// Shared handle to an operator instance.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Node {
    /// Instantiate `op` as a top-level operator of `graph`.
    pub fn new(graph: &Graph, op: impl Operator + 'static) -> Result<Node, GraphError> {
        Self::new_boxed(graph, Box::new(op))
    }

    pub fn new_boxed(graph: &Graph, op: Box<dyn Operator>) -> Result<Node, GraphError> {
        Self::instantiate(graph, Weak::new(), op)
    }

    /// Instantiate `op` as a child of `parent`. Children are torn down with
    /// their parent, in reverse creation order.
    pub fn new_child(parent: &Node, op: impl Operator + 'static) -> Result<Node, GraphError> {
        Self::new_child_boxed(parent, Box::new(op))
    }

    pub fn new_child_boxed(parent: &Node, op: Box<dyn Operator>) -> Result<Node, GraphError> {
        if parent.is_torn_down() {
            return Err(GraphError::TornDown {
                operator: parent.name().to_string(),
            });
        }
        let graph = parent.graph().ok_or_else(|| GraphError::TornDown {
            operator: parent.name().to_string(),
        })?;
        Self::instantiate(&graph, Arc::downgrade(&parent.0), op)
    }

    fn instantiate(
        graph: &Graph,
        parent: Weak<NodeInner>,
        op: Box<dyn Operator>,
    ) -> Result<Node, GraphError> {
        let id = graph.next_node_id();
        let name = op.name().to_string();
        let specs = op.slots();

        let inner = Arc::new_cyclic(|me: &Weak<NodeInner>| {
            let mut inputs = Vec::new();
            let mut outputs = Vec::new();
            for spec in &specs {
                let slot = Slot::new(spec, me.clone());
                match spec.direction {
                    Direction::Input => inputs.push(slot),
                    Direction::Output => outputs.push(slot),
                }
            }
            NodeInner {
                id,
                name,
                graph: Arc::downgrade(&graph.0),
                parent: parent.clone(),
                inputs,
                outputs,
                imp: RwLock::new(op),
                state: Mutex::new(NodeState {
                    phase: Phase::Unconfigured,
                    configuring: false,
                    pending: false,
                    torn_down: false,
                    cleanup_deferred: false,
                }),
                children: Mutex::new(Vec::new()),
            }
        });
        let node = Node(inner);

        graph.register(&node);
        if let Some(parent) = parent.upgrade() {
            parent.children.lock().push(node.clone());
        }

        if let Err(e) = node.initialize(&specs) {
            node.clean_up();
            return Err(e);
        }
        Ok(node)
    }

    fn initialize(&self, specs: &[super::slot::SlotSpec]) -> Result<(), GraphError> {
        for spec in specs {
            if let (Direction::Input, Some(default)) = (spec.direction, &spec.default) {
                self.input(&spec.name)?.init_value(default.clone())?;
            }
        }
        self.0.imp.write().attach(self)?;
        self.reconfigure()
    }

    // ----- attributes ---------------------------------------------------

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn graph(&self) -> Option<Graph> {
        self.0.graph.upgrade().map(Graph)
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.upgrade().map(Node)
    }

    pub fn input(&self, name: &str) -> Result<Slot, GraphError> {
        self.0
            .inputs
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| self.unknown_slot(name))
    }

    pub fn output(&self, name: &str) -> Result<Slot, GraphError> {
        self.0
            .outputs
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| self.unknown_slot(name))
    }

    pub fn inputs(&self) -> &[Slot] {
        &self.0.inputs
    }

    pub fn outputs(&self) -> &[Slot] {
        &self.0.outputs
    }

    /// Child operators in creation order.
    pub fn children(&self) -> Vec<Node> {
        self.0.children.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.0.state.lock().phase.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// The error of the most recent failed setup, if the node is in the error phase.
    pub fn last_error(&self) -> Option<GraphError> {
        match self.phase() {
            Phase::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.state.lock().torn_down
    }

    /// Run `f` with shared access to the operator implementation.
    pub fn with_operator<R>(&self, f: impl FnOnce(&dyn Operator) -> R) -> R {
        let imp = self.0.imp.read_recursive();
        f(imp.as_ref())
    }

    fn unknown_slot(&self, name: &str) -> GraphError {
        GraphError::UnknownSlot {
            operator: self.0.name.clone(),
            slot: name.to_string(),
        }
    }

    // ----- configuration --------------------------------------------------

    /// Re-run setup against the current inputs.
    ///
    /// Re-entrant calls made while setup is running (for example because
    /// setup connected a child to one of this node's inputs) are coalesced
    /// into one more pass after the current one.
    pub(crate) fn reconfigure(&self) -> Result<(), GraphError> {
        {
            let mut st = self.0.state.lock();
            if st.torn_down {
                return Ok(());
            }
            if st.configuring {
                st.pending = true;
                return Ok(());
            }
            st.configuring = true;
        }

        let mut result;
        loop {
            result = self.configure_once();
            let mut st = self.0.state.lock();
            if st.pending && !st.torn_down && !st.cleanup_deferred {
                st.pending = false;
                continue;
            }
            st.pending = false;
            st.configuring = false;
            let deferred = std::mem::take(&mut st.cleanup_deferred);
            drop(st);
            if deferred {
                self.finish_clean_up();
            }
            break;
        }
        result
    }

    fn missing_inputs(&self) -> Vec<String> {
        self.0
            .inputs
            .iter()
            .filter(|s| !s.is_optional() && !s.is_ready())
            .map(|s| s.name().to_string())
            .collect()
    }

    fn configure_once(&self) -> Result<(), GraphError> {
        let missing = self.missing_inputs();
        if !missing.is_empty() {
            let was_configured = self.phase() != Phase::Unconfigured;
            if was_configured {
                self.0.imp.write().teardown(self);
                self.release_outputs();
            }
            self.set_phase(Phase::Unconfigured);
            OperatorUnconfigured {
                operator: self.name(),
                node_id: self.id(),
                missing: &missing,
            }
            .log();
            return Ok(());
        }

        let mark = self.graph().map(|g| g.peek_node_id()).unwrap_or(0);
        let mut ctx = SetupContext::new(self);
        let setup = {
            let mut imp = self.0.imp.write();
            imp.setup_outputs(&mut ctx)
        };
        if let Err(e) = setup {
            self.fail(mark, &e);
            return Err(e);
        }

        let touched = match ctx.apply() {
            Ok(touched) => touched,
            Err(e) => {
                self.fail(mark, &e);
                return Err(e);
            }
        };
        for output in &self.0.outputs {
            if !touched.contains(output.name()) {
                output.unpublish()?;
            }
        }

        self.set_phase(Phase::Ready);
        OperatorConfigured {
            operator: self.name(),
            node_id: self.id(),
            outputs: self.0.outputs.iter().filter(|s| s.is_ready()).count(),
        }
        .log();
        Ok(())
    }

    /// Undo a failed setup: release everything it created and leave the
    /// outputs not ready.
    fn fail(&self, mark: u64, error: &GraphError) {
        self.0.imp.write().teardown(self);
        let created: Vec<Node> = self
            .children()
            .into_iter()
            .filter(|c| c.id() >= mark)
            .collect();
        for child in created.iter().rev() {
            child.clean_up();
        }
        self.release_outputs();
        self.set_phase(Phase::Error(error.clone()));
        SetupFailed {
            operator: self.name(),
            node_id: self.id(),
            error,
        }
        .log();
    }

    fn release_outputs(&self) {
        for output in &self.0.outputs {
            if let Err(e) = output.disconnect() {
                tracing::warn!(slot = %output.qualified_name(), error = %e, "releasing output failed");
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.0.state.lock().phase = phase;
    }

    // ----- execution --------------------------------------------------------

    pub(crate) fn execute_output(
        &self,
        slot: &Slot,
        roi: &Roi,
        meta: &MetaDict,
        token: &CancellationToken,
    ) -> Result<Arc<ArrayData>, ExecutionError> {
        if token.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let ctx = ExecuteContext::new(self.clone(), token.clone());
        let data = {
            let imp = self.0.imp.read_recursive();
            imp.execute(&ctx, slot, roi)?
        };

        let expected = roi.shape();
        if data.shape() != expected {
            return Err(ExecutionError::ContractViolation {
                operator: self.0.name.clone(),
                message: format!(
                    "slot '{}' produced shape {:?} for a request of shape {:?}",
                    slot.name(),
                    data.shape(),
                    expected
                ),
            });
        }
        if let Some(dtype) = meta.dtype {
            if data.dtype() != dtype {
                return Err(ExecutionError::ContractViolation {
                    operator: self.0.name.clone(),
                    message: format!(
                        "slot '{}' produced {} data but publishes {}",
                        slot.name(),
                        data.dtype(),
                        dtype
                    ),
                });
            }
        }
        Ok(Arc::new(data))
    }

    pub(crate) fn propagate_dirty(&self, slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        if !self.is_ready() {
            return Ok(());
        }
        let imp = self.0.imp.read_recursive();
        imp.propagate_dirty(self, slot, roi)
    }

    // ----- teardown ---------------------------------------------------------

    /// Tear the operator down. Calling it again has no effect.
    ///
    /// Followers of the outputs are disconnected first, then the operator's
    /// `teardown` hook runs, children are cleaned up newest first, and finally
    /// the inputs are disconnected.
    pub fn clean_up(&self) {
        {
            let mut st = self.0.state.lock();
            if st.torn_down {
                return;
            }
            if st.configuring {
                st.cleanup_deferred = true;
                return;
            }
        }
        self.finish_clean_up();
    }

    fn finish_clean_up(&self) {
        {
            let mut st = self.0.state.lock();
            if st.torn_down {
                return;
            }
            st.torn_down = true;
        }

        for output in &self.0.outputs {
            let mut followers = output.downstream();
            for sub in output.subslots() {
                followers.extend(sub.downstream());
            }
            for follower in followers {
                if let Err(e) = follower.disconnect() {
                    tracing::warn!(slot = %follower.qualified_name(), error = %e, "disconnecting follower failed");
                }
            }
            if let Err(e) = output.disconnect() {
                tracing::warn!(slot = %output.qualified_name(), error = %e, "disconnecting output failed");
            }
        }

        self.0.imp.write().teardown(self);

        let children = self.children();
        for child in children.iter().rev() {
            child.clean_up();
        }

        for input in &self.0.inputs {
            if let Err(e) = input.disconnect() {
                tracing::warn!(slot = %input.qualified_name(), error = %e, "disconnecting input failed");
            }
        }
        for slot in self.0.inputs.iter().chain(self.0.outputs.iter()) {
            slot.detach();
        }

        if let Some(parent) = self.parent() {
            parent.0.children.lock().retain(|c| c != self);
        }
        if let Some(graph) = self.graph() {
            graph.unregister(self);
        }
        self.set_phase(Phase::Unconfigured);

        OperatorCleanedUp {
            operator: self.name(),
            node_id: self.id(),
            children: children.len(),
        }
        .log();
    }
}
