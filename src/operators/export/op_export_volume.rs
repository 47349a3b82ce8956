// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use url::Url;

use crate::array::{ArrayData, Roi};
use crate::engine::Request;
use crate::errors::{ExecutionError, GraphError};
use crate::graph::{ExecuteContext, Graph, ListenerId, Node, SetupContext, Signal, Slot, SlotSpec, SlotType};
use crate::observability::messages::export::{
    ExportCompleted, ExportFailed, ExportProgress, ExportStarted,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Operator, VolumeSink, VolumeTarget};

type ProgressListener = dyn Fn(u8) + Send + Sync;

/// Parse `http://<host>[:<port>]/api/node/<uuid>/<dataname>`.
pub fn parse_node_data_url(node_data_url: &str) -> Result<VolumeTarget, ExecutionError> {
    let invalid = |reason: &str| ExecutionError::OperatorFailed {
        operator: "OpExportVolume".to_string(),
        message: format!("invalid node data url '{}': {}", node_data_url, reason),
    };
    let url = Url::parse(node_data_url).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let hostname = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        ["api", "node", uuid, dataname] => Ok(VolumeTarget {
            hostname,
            uuid: uuid.to_string(),
            dataname: dataname.to_string(),
        }),
        _ => Err(invalid("expected /api/node/<uuid>/<dataname>")),
    }
}

struct ExportOp {
    transpose_axes: bool,
}

impl Operator for ExportOp {
    fn name(&self) -> &'static str {
        "OpExportVolume"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("Input"),
            SlotSpec::input("NodeDataUrl").of_type(SlotType::String),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        let meta = ctx.input_meta("Input")?;
        let tags = meta
            .axistags
            .as_ref()
            .ok_or_else(|| GraphError::configuration(self.name(), "input has no axistags"))?;
        let expected = if self.transpose_axes { tags.len().saturating_sub(1) } else { 0 };
        if tags.channel_index() != Some(expected) {
            return Err(GraphError::configuration(
                self.name(),
                format!(
                    "channel axis must be at index {} of '{}'",
                    expected,
                    tags.keys()
                ),
            ));
        }
        let url = ctx.input_string("NodeDataUrl")?;
        parse_node_data_url(&url).map_err(|e| GraphError::configuration(self.name(), e.to_string()))?;
        Ok(())
    }

    fn execute(&self, _ctx: &ExecuteContext, slot: &Slot, _roi: &Roi) -> Result<ArrayData, ExecutionError> {
        Err(ExecutionError::Internal(format!(
            "'{}' has no outputs to compute",
            slot.qualified_name()
        )))
    }

    fn propagate_dirty(&self, _node: &Node, _slot: &Slot, _roi: &Roi) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Exports its whole `Input` to a [`VolumeSink`].
///
/// The target is named by `NodeDataUrl`. With `transpose_axes` the axes are
/// reversed before writing, so an input with a trailing channel axis is
/// stored channel-first. Progress is reported at 0, 5 and 100 percent.
#[derive(Clone)]
pub struct OpExportVolume {
    node: Node,
    sink: Arc<dyn VolumeSink>,
    transpose_axes: bool,
    progress: Arc<Signal<ProgressListener>>,
}

impl std::fmt::Debug for OpExportVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpExportVolume")
            .field("node", &self.node.id())
            .field("transpose_axes", &self.transpose_axes)
            .finish()
    }
}

impl OpExportVolume {
    pub fn new(graph: &Graph, sink: Arc<dyn VolumeSink>, transpose_axes: bool) -> Result<Self, GraphError> {
        let node = Node::new(graph, ExportOp { transpose_axes })?;
        Ok(Self {
            node,
            sink,
            transpose_axes,
            progress: Arc::new(Signal::new()),
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn input(&self, name: &str) -> Result<Slot, GraphError> {
        self.node.input(name)
    }

    /// Call `f` with the progress percentage as the export advances.
    pub fn notify_progress(&self, f: impl Fn(u8) + Send + Sync + 'static) -> ListenerId {
        self.progress.connect(Arc::new(f))
    }

    /// Start the export on the graph's worker pool.
    pub fn run_export(&self) -> Request<()> {
        let graph = self.node.graph();
        let export = self.clone();
        let request = Request::new(graph.as_ref(), move |token| export.export(token));
        request.submit();
        request
    }

    fn report(&self, percent: u8) {
        ExportProgress { percent }.log();
        for listener in self.progress.snapshot() {
            listener(percent);
        }
    }

    fn export(&self, token: &tokio_util::sync::CancellationToken) -> Result<(), ExecutionError> {
        self.report(0);
        let url = self
            .node
            .input("NodeDataUrl")
            .and_then(|s| s.value())
            .map_err(|e| ExecutionError::Internal(e.to_string()))?;
        let url = url.as_str().unwrap_or_default().to_string();
        let target = parse_node_data_url(&url)?;

        let result = self.write(&target, token);
        if let Err(e) = &result {
            ExportFailed {
                dataname: &target.dataname,
                error: e,
            }
            .log();
        }
        result
    }

    fn write(
        &self,
        target: &VolumeTarget,
        token: &tokio_util::sync::CancellationToken,
    ) -> Result<(), ExecutionError> {
        ExportStarted {
            hostname: &target.hostname,
            uuid: &target.uuid,
            dataname: &target.dataname,
        }
        .log();

        let input = self
            .node
            .input("Input")
            .map_err(|e| ExecutionError::Internal(e.to_string()))?;
        let meta = input.meta();
        let (Some(shape), Some(tags)) = (meta.shape.clone(), meta.axistags.clone()) else {
            return Err(ExecutionError::NotReady {
                slot: input.qualified_name(),
            });
        };
        let data = input.get(&Roi::full(&shape)).wait()?;
        let (data, tags) = if self.transpose_axes {
            (data.transposed(), tags.reversed())
        } else {
            ((*data).clone(), tags)
        };
        if token.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        self.report(5);
        let handle = self
            .node
            .graph()
            .and_then(|g| g.handle())
            .ok_or_else(|| ExecutionError::Internal("graph worker pool is gone".to_string()))?;
        let shape = data.shape();
        handle.block_on(self.sink.create_volume(target, &shape, data.dtype(), &tags))?;
        handle.block_on(self.sink.write_subvolume(target, &Roi::full(&shape), &data))?;

        self.report(100);
        ExportCompleted {
            dataname: &target.dataname,
            shape: &shape,
        }
        .log();
        Ok(())
    }
}
