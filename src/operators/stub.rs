// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operators, providers and fixtures shared by the tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::array::{ArrayData, Roi, TaggedArray, Value};
use crate::config::ProviderRegistry;
use crate::errors::{ExecutionError, GraphError, ResolutionError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec, SlotType};
use crate::metadata::AxisTags;
use crate::operators::OpArrayPiper;
use crate::traits::{Operator, ProjectStore, ProviderFactory, ProviderRequest};

/// `u8` ramp of `shape` tagged with `keys`.
pub fn tagged_ramp(shape: &[usize], keys: &str) -> TaggedArray {
    let n: usize = shape.iter().product();
    let data = ArrayData::from_shape_vec(shape, (0..n).map(|i| (i % 251) as u8).collect()).unwrap();
    TaggedArray::tagged(data, AxisTags::from_keys(keys).unwrap())
}

/// Create an empty file `name` in `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"").unwrap();
    path
}

/// Multiplies an `f64` input by the `Factor` object.
#[derive(Debug, Default)]
pub struct OpScale;

impl Operator for OpScale {
    fn name(&self) -> &'static str {
        "OpScale"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("Input"),
            SlotSpec::input("Factor").of_type(SlotType::Object),
            SlotSpec::output("Output"),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        ctx.input_object::<f64>("Factor")?;
        let meta = ctx.input_meta("Input")?;
        ctx.publish_meta("Output", (*meta).clone())
    }

    fn execute(&self, ctx: &ExecuteContext, _slot: &Slot, roi: &Roi) -> Result<ArrayData, ExecutionError> {
        let factor = ctx
            .input_value("Factor")?
            .downcast::<f64>()
            .ok_or_else(|| ExecutionError::Internal("factor is not a number".to_string()))?;
        let data = ctx.request_input("Input", roi)?;
        let values = data
            .as_array::<f64>()
            .ok_or_else(|| ExecutionError::Internal("OpScale needs float64 input".to_string()))?;
        Ok(ArrayData::from(values * *factor))
    }

    fn propagate_dirty(&self, node: &Node, slot: &Slot, roi: &Roi) -> Result<(), GraphError> {
        let output = node.output("Output")?;
        if slot.name() == "Input" {
            output.set_dirty(roi)
        } else {
            output.set_dirty_all()
        }
    }
}

/// Serves a fixed array for every file it is asked to open and records the
/// requests.
pub struct FixedArrayFactory {
    array: TaggedArray,
    internal_paths: Vec<String>,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl FixedArrayFactory {
    pub fn new(array: TaggedArray) -> Self {
        Self {
            array,
            internal_paths: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_internal_paths(mut self, paths: &[&str]) -> Self {
        self.internal_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl ProviderFactory for FixedArrayFactory {
    fn open(&self, parent: &Node, request: &ProviderRequest) -> Result<Node, GraphError> {
        self.requests.lock().push(request.clone());
        let piper = Node::new_child(parent, OpArrayPiper::new())?;
        piper.input("Input")?.set_value(self.array.clone())?;
        Ok(piper)
    }

    fn list_internal_paths(&self, path: &Path) -> Result<Vec<String>, ResolutionError> {
        if !path.exists() {
            return Err(ResolutionError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        Ok(self.internal_paths.clone())
    }
}

/// Registry with `factory` registered for `extensions`.
pub fn registry_with(extensions: &[&str], factory: Arc<dyn ProviderFactory>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(extensions, factory);
    Arc::new(registry)
}

/// In-memory project with named datasets.
#[derive(Default)]
pub struct MemoryProject {
    datasets: HashMap<String, TaggedArray>,
}

impl MemoryProject {
    pub fn with_dataset(mut self, internal_path: &str, array: TaggedArray) -> Self {
        self.datasets.insert(internal_path.to_string(), array);
        self
    }
}

impl ProjectStore for MemoryProject {
    fn open_dataset(&self, parent: &Node, internal_path: &str) -> Result<Node, GraphError> {
        let array = self.datasets.get(internal_path).cloned().ok_or_else(|| {
            GraphError::from(ResolutionError::InternalPathNotFound {
                file: "project".to_string(),
                internal_path: internal_path.to_string(),
            })
        })?;
        let piper = Node::new_child(parent, OpArrayPiper::new())?;
        piper.input("Input")?.set_value(Value::from(array))?;
        Ok(piper)
    }
}
