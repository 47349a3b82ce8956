// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::Path;
use uuid::Uuid;

use super::paths::{self, PathComponents};
use crate::array::{Roi, TaggedArray};
use crate::config::ProviderRegistry;
use crate::errors::ResolutionError;
use crate::metadata::{AxisTags, Dtype};

/// Where the data of a dataset lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetLocation {
    FileSystem,
    ProjectInternal,
    PreloadedArray,
}

impl DatasetLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetLocation::FileSystem => "FileSystem",
            DatasetLocation::ProjectInternal => "ProjectInternal",
            DatasetLocation::PreloadedArray => "PreloadedArray",
        }
    }
}

impl Display for DatasetLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one dataset handed to data selection on its `Dataset` slot.
///
/// Build one with [`DatasetInfo::from_path`], [`DatasetInfo::project_internal`]
/// or [`DatasetInfo::preloaded`] and adjust it with the `with_*` builders.
/// Every change of the file path gives the dataset a new id.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    pub location: DatasetLocation,
    file_path: String,
    dataset_id: String,
    pub nickname: String,
    pub allow_labels: bool,
    pub drange: Option<(f64, f64)>,
    pub normalize_display: bool,
    pub sequence_axis: Option<char>,
    /// Overrides the provider's axis interpretation.
    pub axistags: Option<AxisTags>,
    pub original_axistags: Option<AxisTags>,
    /// Shape and dtype of the lane, used when the real data is withheld.
    pub lane_shape: Option<Vec<usize>>,
    pub lane_dtype: Option<Dtype>,
    /// False when zeros should stand in for the file contents.
    pub real_data_source: bool,
    pub subvolume_roi: Option<Roi>,
    /// One of `default`, `grayscale`, `rgba`, `random-colortable`, `binary-mask`.
    pub display_mode: String,
    pub from_stack: bool,
    pub expanded_paths: Vec<String>,
    pub original_paths: Vec<String>,
    pub preloaded: Option<TaggedArray>,
}

impl DatasetInfo {
    fn blank(location: DatasetLocation, file_path: &str) -> Self {
        Self {
            location,
            file_path: file_path.to_string(),
            dataset_id: Uuid::new_v4().to_string(),
            nickname: String::new(),
            allow_labels: true,
            drange: None,
            normalize_display: false,
            sequence_axis: None,
            axistags: None,
            original_axistags: None,
            lane_shape: None,
            lane_dtype: None,
            real_data_source: true,
            subvolume_roi: None,
            display_mode: "default".to_string(),
            from_stack: false,
            expanded_paths: Vec::new(),
            original_paths: paths::split_path(file_path),
            preloaded: None,
        }
    }

    /// A dataset on the filesystem. Globs are expanded immediately.
    ///
    /// URLs are kept as given. A path that expands to several files is a
    /// stack and needs a `sequence_axis`.
    pub fn from_path(
        file_path: &str,
        cwd: &Path,
        registry: &ProviderRegistry,
        sequence_axis: Option<char>,
    ) -> Result<Self, ResolutionError> {
        let mut info = Self::blank(DatasetLocation::FileSystem, file_path);
        info.sequence_axis = sequence_axis;
        if paths::is_url(file_path) {
            return Ok(info);
        }

        let expanded = paths::expand_path(file_path, cwd, registry)?;
        info.nickname = paths::create_nickname(&expanded)?;
        info.from_stack = expanded.len() > 1;
        if info.from_stack && sequence_axis.is_none() {
            return Err(ResolutionError::MissingSequenceAxis {
                count: expanded.len(),
            });
        }
        info.set_file_path(&paths::join_paths(&expanded));
        info.expanded_paths = expanded;
        Ok(info)
    }

    /// A dataset stored inside the project at `internal_path`.
    pub fn project_internal(internal_path: &str, nickname: &str) -> Self {
        let mut info = Self::blank(DatasetLocation::ProjectInternal, internal_path);
        info.nickname = nickname.to_string();
        info
    }

    /// An array held in memory.
    pub fn preloaded(array: TaggedArray) -> Self {
        let mut info = Self::blank(DatasetLocation::PreloadedArray, "");
        info.nickname = format!("preloaded-{}-array", array.data.dtype());
        info.axistags = array.axistags.clone();
        info.preloaded = Some(array);
        info
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn set_file_path(&mut self, file_path: &str) {
        self.file_path = file_path.to_string();
        self.dataset_id = Uuid::new_v4().to_string();
    }

    pub fn with_file_path(mut self, file_path: &str) -> Self {
        self.set_file_path(file_path);
        self
    }

    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.nickname = nickname.to_string();
        self
    }

    /// Set the display range. Display normalization is switched on with it.
    pub fn with_drange(mut self, drange: (f64, f64)) -> Self {
        self.drange = Some(drange);
        self.normalize_display = true;
        self
    }

    pub fn with_normalize_display(mut self, normalize: bool) -> Self {
        self.normalize_display = normalize;
        self
    }

    pub fn with_axistags(mut self, axistags: AxisTags) -> Self {
        self.axistags = Some(axistags);
        self
    }

    pub fn with_original_axistags(mut self, axistags: AxisTags) -> Self {
        self.original_axistags = Some(axistags);
        self
    }

    pub fn with_allow_labels(mut self, allow: bool) -> Self {
        self.allow_labels = allow;
        self
    }

    pub fn with_display_mode(mut self, mode: &str) -> Self {
        self.display_mode = mode.to_string();
        self
    }

    pub fn with_subvolume_roi(mut self, roi: Roi) -> Self {
        self.subvolume_roi = Some(roi);
        self
    }

    /// Serve zeros of the given lane shape instead of reading the file.
    pub fn with_placeholder(mut self, shape: Vec<usize>, dtype: Dtype) -> Self {
        self.lane_shape = Some(shape);
        self.lane_dtype = Some(dtype);
        self.real_data_source = false;
        self
    }

    /// Components of every file in the (possibly stacked) file path.
    pub fn components(&self) -> Vec<PathComponents> {
        paths::split_path(&self.file_path)
            .iter()
            .map(|p| PathComponents::parse(p))
            .collect()
    }

    pub fn external_path(&self) -> String {
        PathComponents::parse(&self.file_path).external_path
    }

    pub fn internal_path(&self) -> Option<String> {
        PathComponents::parse(&self.file_path).internal_path
    }

    pub fn axis_keys(&self) -> Option<String> {
        self.axistags.as_ref().map(AxisTags::keys)
    }

    /// True unless any of the paths as given is absolute or a URL.
    pub fn is_path_relative(&self) -> bool {
        !self
            .original_paths
            .iter()
            .any(|p| paths::is_url(p) || Path::new(p).is_absolute())
    }

    /// The locations to record for this dataset: nothing for in-memory
    /// arrays, the internal path for project data, and the files as given
    /// (relative) or as resolved (absolute) otherwise.
    pub fn effective_uris(&self) -> Vec<String> {
        match self.location {
            DatasetLocation::PreloadedArray => Vec::new(),
            DatasetLocation::ProjectInternal => vec![self.file_path.clone()],
            DatasetLocation::FileSystem if self.is_path_relative() => self.original_paths.clone(),
            DatasetLocation::FileSystem if self.expanded_paths.is_empty() => {
                self.original_paths.clone()
            }
            DatasetLocation::FileSystem => self.expanded_paths.clone(),
        }
    }
}

impl Display for DatasetInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dataset '{}' at {}",
            self.location, self.nickname, self.file_path
        )?;
        if let Some(tags) = &self.axistags {
            write!(f, " ({})", tags)?;
        }
        if self.from_stack {
            write!(f, " [stack of {}]", self.expanded_paths.len())?;
        }
        Ok(())
    }
}
