// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The operator graph: nodes, slots and the worker pool that evaluates them.
//!
//! A [`Graph`] is the connection manager. It owns the engine configuration,
//! the worker pool that runs `execute` calls, and every node instantiated in
//! it. Structural changes (connecting, setting values, resizing) are made by
//! the caller and propagate synchronously; data requests run on the pool.
//!
//! # Example
//!
//! ```ignore
//! let graph = Graph::with_defaults()?;
//! let piper = Node::new(&graph, OpArrayPiper::new())?;
//! piper.input("Input")?.set_value(TaggedArray::new(data))?;
//! let region = piper.output("Output")?.get(&Roi::new(vec![0, 0], vec![2, 2])).wait()?;
//! ```

mod context;
mod node;
mod signal;
mod slot;

#[cfg(test)]
mod integration_tests;

pub use context::{ExecuteContext, SetupContext};
pub use node::{Node, Phase};
pub(crate) use node::NodeInner;
pub use signal::{ListenerId, Signal};
pub use slot::{Direction, Slot, SlotSpec, SlotType};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};

use crate::config::EngineConfig;
use crate::errors::GraphError;

pub(crate) struct GraphInner {
    config: EngineConfig,
    runtime: Option<Runtime>,
    nodes: Mutex<Vec<Node>>,
    next_node_id: AtomicU64,
}

impl Drop for GraphInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Shared handle to an operator graph.
#[derive(Clone)]
pub struct Graph(pub(crate) Arc<GraphInner>);

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.0.nodes.lock().len())
            .field("worker_threads", &self.0.config.get_worker_threads())
            .finish()
    }
}

impl Graph {
    /// Create a graph and start its worker pool.
    pub fn new(config: EngineConfig) -> Result<Graph, GraphError> {
        let workers = config.get_worker_threads();
        if workers == 0 {
            return Err(GraphError::WorkerPool(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name(config.get_thread_name())
            .enable_all()
            .build()
            .map_err(|e| GraphError::WorkerPool(e.to_string()))?;

        tracing::debug!(workers, "graph worker pool started");
        Ok(Graph(Arc::new(GraphInner {
            config,
            runtime: Some(runtime),
            nodes: Mutex::new(Vec::new()),
            next_node_id: AtomicU64::new(1),
        })))
    }

    pub fn with_defaults() -> Result<Graph, GraphError> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.0.config
    }

    pub(crate) fn handle(&self) -> Option<Handle> {
        self.0.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    /// Every live node, in instantiation order.
    pub fn nodes(&self) -> Vec<Node> {
        self.0.nodes.lock().clone()
    }

    /// Tear down every top-level node, newest first.
    pub fn clean_up(&self) {
        let top_level: Vec<Node> = self
            .nodes()
            .into_iter()
            .filter(|n| n.parent().is_none())
            .collect();
        for node in top_level.iter().rev() {
            node.clean_up();
        }
    }

    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn next_node_id(&self) -> u64 {
        self.0.next_node_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next instantiated node will receive.
    pub(crate) fn peek_node_id(&self) -> u64 {
        self.0.next_node_id.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, node: &Node) {
        self.0.nodes.lock().push(node.clone());
    }

    pub(crate) fn unregister(&self, node: &Node) {
        self.0.nodes.lock().retain(|n| n != node);
    }
}
