// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::array::Roi;
use crate::errors::{GraphError, ResolutionError};
use crate::graph::Node;

/// What a provider is asked to open.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// External file paths. More than one path means a stack.
    pub paths: Vec<PathBuf>,
    /// Dataset path inside container formats, shared by every file of a stack.
    pub internal_path: Option<String>,
    /// Axis the files of a stack are concatenated along.
    pub sequence_axis: Option<char>,
    pub subvolume_roi: Option<Roi>,
}

/// Creates data provider operators for one family of file formats.
///
/// The returned node must be a child of `parent` and expose its data on an
/// output slot named `Output`.
pub trait ProviderFactory: Send + Sync {
    fn open(&self, parent: &Node, request: &ProviderRequest) -> Result<Node, GraphError>;

    /// Dataset paths inside the container at `path`, used to expand internal
    /// path globs. Formats without internal paths return an empty list.
    fn list_internal_paths(&self, _path: &Path) -> Result<Vec<String>, ResolutionError> {
        Ok(Vec::new())
    }
}

/// Storage of datasets copied into a project.
pub trait ProjectStore: Send + Sync {
    /// Open the dataset stored at `internal_path` as a child of `parent`,
    /// exposing it on an `Output` slot.
    fn open_dataset(&self, parent: &Node, internal_path: &str) -> Result<Node, GraphError>;
}

/// Shareable handle to an open project, stored on `ProjectFile` slots.
#[derive(Clone)]
pub struct ProjectFile(pub Arc<dyn ProjectStore>);

impl ProjectFile {
    pub fn new(store: impl ProjectStore + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl Debug for ProjectFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProjectFile")
    }
}
