// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AxisTags, Dtype};
use crate::array::Roi;
use crate::errors::MetaError;

/// Metadata describing the array behind a slot.
///
/// A `MetaDict` is mergeable: [`MetaDict::merge`] overrides key-wise, and keys
/// left unset in the overlay pass through unchanged. Once published on an
/// output slot it is shared as an `Arc<MetaDict>` snapshot and never mutated.
///
/// # Examples
///
/// ```ignore
/// let base = MetaDict::for_array(vec![10, 20], Dtype::U8, AxisTags::from_keys("yx")?);
/// let overlay = MetaDict { drange: Some((0.0, 100.0)), ..MetaDict::default() };
/// let merged = base.merged(&overlay);
/// assert_eq!(merged.shape, Some(vec![10, 20]));
/// assert_eq!(merged.drange, Some((0.0, 100.0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaDict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<Dtype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axistags: Option<AxisTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drange: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize_display: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_axistags: Option<AxisTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subvolume_roi: Option<Roi>,
    /// Free-form extension keys.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MetaDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three keys every array slot needs.
    pub fn for_array(shape: Vec<usize>, dtype: Dtype, axistags: AxisTags) -> Self {
        Self {
            shape: Some(shape),
            dtype: Some(dtype),
            axistags: Some(axistags),
            ..Self::default()
        }
    }

    /// True once shape, dtype and axistags are all present.
    pub fn is_ready(&self) -> bool {
        self.shape.is_some() && self.dtype.is_some() && self.axistags.is_some()
    }

    pub fn ndim(&self) -> Option<usize> {
        self.shape.as_ref().map(Vec::len)
    }

    pub fn axis_keys(&self) -> Option<String> {
        self.axistags.as_ref().map(AxisTags::keys)
    }

    /// Shape paired with axis keys, in axis order.
    pub fn tagged_shape(&self) -> Option<Vec<(char, usize)>> {
        let shape = self.shape.as_ref()?;
        let tags = self.axistags.as_ref()?;
        if shape.len() != tags.len() {
            return None;
        }
        Some(tags.iter().map(|t| t.key).zip(shape.iter().copied()).collect())
    }

    /// Extent of the axis labelled `key`, if present.
    pub fn extent_of(&self, key: char) -> Option<usize> {
        let index = self.axistags.as_ref()?.index_of(key)?;
        self.shape.as_ref()?.get(index).copied()
    }

    /// Check `len(axistags) == len(shape)` and readiness.
    pub fn validate(&self) -> Result<(), MetaError> {
        let shape = self.shape.as_ref().ok_or(MetaError::Incomplete("shape"))?;
        if self.dtype.is_none() {
            return Err(MetaError::Incomplete("dtype"));
        }
        let tags = self
            .axistags
            .as_ref()
            .ok_or(MetaError::Incomplete("axistags"))?;
        if tags.len() != shape.len() {
            return Err(MetaError::AxisCountMismatch {
                shape_len: shape.len(),
                axes_len: tags.len(),
            });
        }
        Ok(())
    }

    /// Override every key that is set in `overlay`.
    pub fn merge(&mut self, overlay: &MetaDict) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if let Some(v) = src {
                *dst = Some(v.clone());
            }
        }
        take(&mut self.shape, &overlay.shape);
        take(&mut self.dtype, &overlay.dtype);
        take(&mut self.axistags, &overlay.axistags);
        take(&mut self.drange, &overlay.drange);
        take(&mut self.channel_names, &overlay.channel_names);
        take(&mut self.display_mode, &overlay.display_mode);
        take(&mut self.normalize_display, &overlay.normalize_display);
        take(&mut self.nickname, &overlay.nickname);
        take(&mut self.original_axistags, &overlay.original_axistags);
        take(&mut self.subvolume_roi, &overlay.subvolume_roi);
        for (k, v) in &overlay.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }

    pub fn merged(&self, overlay: &MetaDict) -> MetaDict {
        let mut out = self.clone();
        out.merge(overlay);
        out
    }

    pub fn get_extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extra.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MetaDict {
        MetaDict::for_array(
            vec![1, 50, 50],
            Dtype::U8,
            AxisTags::from_keys("zyx").unwrap(),
        )
    }

    #[test]
    fn ready_requires_shape_dtype_and_axistags() {
        assert!(base().is_ready());
        let mut partial = base();
        partial.dtype = None;
        assert!(!partial.is_ready());
        assert_eq!(partial.validate(), Err(MetaError::Incomplete("dtype")));
    }

    #[test]
    fn validate_checks_axis_count() {
        let mut meta = base();
        meta.axistags = Some(AxisTags::from_keys("yx").unwrap());
        assert_eq!(
            meta.validate(),
            Err(MetaError::AxisCountMismatch {
                shape_len: 3,
                axes_len: 2
            })
        );
        assert!(meta.tagged_shape().is_none());
    }

    #[test]
    fn merge_overrides_only_set_keys() {
        let mut overlay = MetaDict::new();
        overlay.drange = Some((0.0, 10.0));
        overlay.set_extra("resolution", serde_json::json!([4, 4, 40]));

        let merged = base().merged(&overlay);
        assert_eq!(merged.shape, Some(vec![1, 50, 50]));
        assert_eq!(merged.dtype, Some(Dtype::U8));
        assert_eq!(merged.drange, Some((0.0, 10.0)));
        assert_eq!(
            merged.get_extra("resolution"),
            Some(&serde_json::json!([4, 4, 40]))
        );
    }

    #[test]
    fn tagged_shape_pairs_keys_and_extents() {
        assert_eq!(
            base().tagged_shape().unwrap(),
            vec![('z', 1), ('y', 50), ('x', 50)]
        );
        assert_eq!(base().extent_of('y'), Some(50));
        assert_eq!(base().extent_of('c'), None);
    }

    #[test]
    fn extension_keys_flatten_into_json() {
        let mut meta = base();
        meta.set_extra("units", serde_json::json!("nm"));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["units"], "nm");
        assert_eq!(json["axistags"], "zyx");
        let back: MetaDict = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
