// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::dataset_info::{DatasetInfo, DatasetLocation};
use super::paths;
use crate::array::{ArrayData, Roi, Value};
use crate::config::ProviderRegistry;
use crate::errors::{ExecutionError, GraphError, ResolutionError};
use crate::graph::{ExecuteContext, Node, SetupContext, Slot, SlotSpec, SlotType};
use crate::metadata::{AxisTags, MetaDict};
use crate::observability::messages::selection::{AxisOrderChosen, ProviderSelected};
use crate::observability::messages::StructuredLog;
use crate::operators::{OpArrayPiper, OpMetadataInjector, OpReorderAxes, OpZeroDefault};
use crate::traits::{Operator, ProjectFile, ProviderRequest};

/// Axis keys used for axes that are reinterpreted away.
const DUMMY_AXES: &str = "tzyxc";

/// Brings one dataset into the graph.
///
/// Setup builds a three-stage child pipeline:
///
/// 1. a provider chosen by the dataset's location
/// 2. an [`OpMetadataInjector`] adding display metadata and axis overrides
/// 3. an [`OpReorderAxes`] presenting the data in one of the allowed orders
///
/// `NonTransposedImage` exposes stage 2, `Image` stage 3.
pub struct OpDataSelection {
    registry: Arc<ProviderRegistry>,
    /// Allowed output orders. `None` uses the graph configuration.
    force_axis_order: Option<Vec<String>>,
    readers: Vec<Node>,
    configured_ndim: Option<usize>,
}

impl OpDataSelection {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            force_axis_order: None,
            readers: Vec::new(),
            configured_ndim: None,
        }
    }

    /// Restrict the output to one of `orders`. An empty list keeps the
    /// provider's own order.
    pub fn with_force_axis_order(mut self, orders: Option<Vec<String>>) -> Self {
        self.force_axis_order = orders;
        self
    }

    fn clean_up_readers(&mut self) {
        for reader in self.readers.drain(..).rev() {
            reader.clean_up();
        }
    }

    fn open_provider(
        &mut self,
        ctx: &SetupContext,
        info: &DatasetInfo,
    ) -> Result<Node, GraphError> {
        let provider = match info.location {
            DatasetLocation::ProjectInternal => {
                let project = ctx.input_object::<ProjectFile>("ProjectFile")?;
                project.0.open_dataset(ctx.node(), info.file_path())?
            }
            DatasetLocation::PreloadedArray => {
                let array = info.preloaded.clone().ok_or_else(|| {
                    GraphError::configuration(self.name(), "preloaded dataset has no array")
                })?;
                let piper = ctx.create_child(OpArrayPiper::new())?;
                self.readers.push(piper.clone());
                piper.input("Input")?.set_value(array)?;
                piper
            }
            DatasetLocation::FileSystem if info.real_data_source => {
                let cwd = ctx.input_string("WorkingDirectory")?;
                let request = provider_request(info, Path::new(&cwd))?;
                let extension = info
                    .components()
                    .first()
                    .map(|c| c.extension.clone())
                    .unwrap_or_default();
                let factory = self.registry.get(&extension).ok_or_else(|| {
                    ResolutionError::UnsupportedExtension {
                        extension: extension.clone(),
                    }
                })?;
                factory.open(ctx.node(), &request)?
            }
            DatasetLocation::FileSystem => {
                let axistags = match (&info.axistags, &info.lane_shape) {
                    (Some(tags), _) => Some(tags.clone()),
                    (None, Some(shape)) => Some(
                        ctx.graph()?
                            .config()
                            .default_axis_orders
                            .tags_for_rank(shape.len())?,
                    ),
                    (None, None) => None,
                };
                let placeholder = MetaDict {
                    shape: info.lane_shape.clone(),
                    dtype: info.lane_dtype,
                    axistags,
                    drange: info.drange,
                    ..MetaDict::default()
                };
                let zeros = ctx.create_child(OpZeroDefault::new())?;
                self.readers.push(zeros.clone());
                zeros
                    .input("MetaInput")?
                    .set_value(Value::object(placeholder))?;
                zeros
            }
        };
        if !self.readers.iter().any(|r| r == &provider) {
            self.readers.push(provider.clone());
        }
        Ok(provider)
    }
}

impl Operator for OpDataSelection {
    fn name(&self) -> &'static str {
        "OpDataSelection"
    }

    fn slots(&self) -> Vec<SlotSpec> {
        vec![
            SlotSpec::input("RoleName")
                .of_type(SlotType::String)
                .default_value(""),
            SlotSpec::input("ProjectFile")
                .of_type(SlotType::Object)
                .optional(),
            SlotSpec::input("ProjectDataGroup")
                .of_type(SlotType::String)
                .optional(),
            SlotSpec::input("WorkingDirectory").of_type(SlotType::String),
            SlotSpec::input("Dataset").of_type(SlotType::Object),
            SlotSpec::output("Image"),
            SlotSpec::output("NonTransposedImage"),
            SlotSpec::output("AllowLabels").of_type(SlotType::Bool),
            SlotSpec::output("ImageName").of_type(SlotType::String),
        ]
    }

    fn setup_outputs(&mut self, ctx: &mut SetupContext) -> Result<(), GraphError> {
        self.clean_up_readers();
        let info = ctx.input_object::<DatasetInfo>("Dataset")?;
        let role = ctx.input_string("RoleName")?;

        let provider = self.open_provider(ctx, &info)?;
        let provider_slot = provider.output("Output")?;
        if !provider_slot.is_ready() {
            return Err(GraphError::configuration(
                self.name(),
                format!("provider for '{}' produced no data", info.file_path()),
            ));
        }
        let provider_meta = provider_slot.meta();
        ProviderSelected {
            role: &role,
            location: info.location.as_str(),
            nickname: &info.nickname,
        }
        .log();

        let ndim = provider_meta.ndim().unwrap_or(0);
        if let Some(expected) = self.configured_ndim {
            if expected != ndim {
                return Err(GraphError::DimensionalityMismatch {
                    operator: self.name().to_string(),
                    expected,
                    found: ndim,
                });
            }
        }

        let overlay = injected_metadata(&info, &role, &provider_meta)
            .map_err(|message| GraphError::configuration(self.name(), message))?;
        let injector = ctx.create_child(OpMetadataInjector::new())?;
        self.readers.push(injector.clone());
        injector.input("Metadata")?.set_value(Value::object(overlay))?;
        injector.input("Input")?.connect(&provider_slot)?;
        let injected = injector.output("Output")?;
        ctx.forward("NonTransposedImage", &injected)?;

        let meta = injected.meta();
        let has_xy = meta
            .axistags
            .as_ref()
            .is_some_and(|t| t.contains('x') && t.contains('y'));
        if !has_xy {
            return Err(GraphError::constraint(
                "DataSelection",
                "Data must always have at least the axes x and y",
            ));
        }

        let candidates = match &self.force_axis_order {
            Some(orders) => orders.clone(),
            None => ctx.graph()?.config().data_selection.get_force_axis_order(),
        };
        let order = choose_axis_order(&meta, &candidates)
            .map_err(|message| GraphError::constraint("DataSelection", message))?;
        AxisOrderChosen {
            role: &role,
            source_axes: &meta.axis_keys().unwrap_or_default(),
            output_order: &order,
            candidates: candidates.len(),
        }
        .log();

        let reorder = ctx.create_child(OpReorderAxes::new())?;
        self.readers.push(reorder.clone());
        reorder.input("AxisOrder")?.set_value(order.as_str())?;
        reorder.input("Input")?.connect(&injected)?;
        let image = reorder.output("Output")?;
        ctx.forward("Image", &image)?;

        ctx.publish_value("AllowLabels", info.allow_labels)?;
        let image_name = image
            .meta()
            .nickname
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(info.nickname.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| info.file_path().to_string());
        ctx.publish_value("ImageName", image_name)?;

        self.configured_ndim = Some(ndim);
        Ok(())
    }

    fn execute(
        &self,
        _ctx: &ExecuteContext,
        slot: &Slot,
        _roi: &Roi,
    ) -> Result<ArrayData, ExecutionError> {
        Err(ExecutionError::Internal(format!(
            "'{}' is served by the selection's child operators",
            slot.qualified_name()
        )))
    }

    fn propagate_dirty(&self, node: &Node, _slot: &Slot, _roi: &Roi) -> Result<(), GraphError> {
        // Every input selects or describes the dataset, so any change
        // invalidates both images in full.
        node.output("NonTransposedImage")?.set_dirty_all()?;
        node.output("Image")?.set_dirty_all()
    }

    fn teardown(&mut self, _node: &Node) {
        self.clean_up_readers();
        self.configured_ndim = None;
    }
}

fn provider_request(info: &DatasetInfo, cwd: &Path) -> Result<ProviderRequest, GraphError> {
    let components = info.components();
    let Some(first) = components.first() else {
        return Err(GraphError::configuration(
            "OpDataSelection",
            "dataset has no file path",
        ));
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for component in &components {
        let external = PathBuf::from(paths::expand_user(&component.external_path));
        let external = if external.is_absolute() || paths::is_url(&component.external_path) {
            external
        } else {
            cwd.join(external)
        };
        if !files.contains(&external) {
            files.push(external);
        }
    }

    Ok(ProviderRequest {
        paths: files,
        internal_path: first.internal_path.clone(),
        sequence_axis: info.sequence_axis,
        subvolume_roi: info.subvolume_roi.clone(),
    })
}

/// The metadata overlay applied on top of the provider's output.
fn injected_metadata(
    info: &DatasetInfo,
    role: &str,
    provider: &MetaDict,
) -> Result<MetaDict, String> {
    let mut meta = MetaDict::new();
    meta.display_mode = Some(info.display_mode.clone());

    let channels = provider.extent_of('c').unwrap_or(0);
    meta.channel_names = Some(if channels > 1 {
        (0..channels).map(|i| format!("{}-{}", role, i)).collect()
    } else {
        vec![role.to_string()]
    });

    meta.drange = info
        .drange
        .or_else(|| provider.dtype.and_then(|d| d.implied_drange()));
    meta.normalize_display = Some(info.normalize_display);
    if let Some(tags) = &info.axistags {
        meta.axistags = Some(reinterpret_axes(tags, provider)?);
    }
    meta.original_axistags = info.original_axistags.clone();
    meta.subvolume_roi = info.subvolume_roi.clone();
    Ok(meta)
}

/// Apply user-declared axis keys to the provider's data.
///
/// Accepted when the keys cover every axis, every axis but a trailing
/// channel axis (which is kept), or exactly the non-singleton axes (singletons are given
/// unused keys).
fn reinterpret_axes(declared: &AxisTags, provider: &MetaDict) -> Result<AxisTags, String> {
    let declared_keys: Vec<char> = declared.iter().map(|t| t.key).collect();
    let tagged = provider.tagged_shape().unwrap_or_default();

    if declared_keys.len() == tagged.len() {
        return Ok(declared.clone());
    }

    let channel_last = tagged.last().is_some_and(|(k, _)| *k == 'c');
    if declared_keys.len() + 1 == tagged.len() && channel_last && !declared_keys.contains(&'c') {
        let mut keys: String = declared_keys.iter().collect();
        keys.push('c');
        return AxisTags::from_keys(&keys).map_err(|e| e.to_string());
    }

    let squeezed = tagged.iter().filter(|(_, n)| *n != 1).count();
    if declared_keys.len() == squeezed {
        let mut dummies = DUMMY_AXES.chars().filter(|k| !declared_keys.contains(k));
        let mut declared_iter = declared_keys.iter().copied();
        let mut keys = String::new();
        for (_, extent) in &tagged {
            let key = if *extent != 1 {
                declared_iter.next()
            } else {
                dummies.next()
            };
            match key {
                Some(k) => keys.push(k),
                None => break,
            }
        }
        if keys.chars().count() == tagged.len() {
            return AxisTags::from_keys(&keys).map_err(|e| e.to_string());
        }
    }

    let shape: Vec<String> = tagged.iter().map(|(k, n)| format!("{}: {}", k, n)).collect();
    Err(format!(
        "Cannot reinterpret input with shape {{{}}} using given axis order of {}",
        shape.join(", "),
        declared.keys()
    ))
}

/// Pick the output axis order for data described by `meta`.
///
/// Among `candidates`, the shortest order containing every axis with extent
/// greater than one wins; ties go to the earlier candidate. Without
/// candidates the data keeps its own order. A channel axis is appended when
/// the chosen order has none.
pub(crate) fn choose_axis_order(meta: &MetaDict, candidates: &[String]) -> Result<String, String> {
    let tagged = meta.tagged_shape().unwrap_or_default();
    let mut order = if candidates.is_empty() {
        meta.axis_keys().unwrap_or_default()
    } else {
        let minimal: Vec<char> = tagged
            .iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| *k)
            .collect();
        candidates
            .iter()
            .enumerate()
            .filter(|(_, order)| minimal.iter().all(|k| order.contains(*k)))
            .min_by_key(|(i, order)| (order.chars().count(), *i))
            .map(|(_, order)| order.clone())
            .ok_or_else(|| {
                format!(
                    "The axes of your dataset ({}) are not compatible with any of the allowed axis configurations used by this workflow ({:?}).",
                    meta.axis_keys().unwrap_or_default(),
                    candidates
                )
            })?
    };
    if !order.contains('c') {
        order.push('c');
    }
    Ok(order)
}
