// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::array::{ArrayData, Roi};
use crate::errors::ExecutionError;
use crate::metadata::{AxisTags, Dtype};
use crate::traits::{VolumeSink, VolumeTarget};

/// A volume held by a [`MemoryVolumeSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVolume {
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub axistags: AxisTags,
    pub data: ArrayData,
}

/// Keeps exported volumes in memory, keyed by target.
#[derive(Debug, Default)]
pub struct MemoryVolumeSink {
    volumes: Mutex<HashMap<String, StoredVolume>>,
}

impl MemoryVolumeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume(&self, target: &VolumeTarget) -> Option<StoredVolume> {
        self.volumes.lock().get(&target.to_string()).cloned()
    }

    pub fn len(&self) -> usize {
        self.volumes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.lock().is_empty()
    }
}

#[async_trait]
impl VolumeSink for MemoryVolumeSink {
    async fn create_volume(
        &self,
        target: &VolumeTarget,
        shape: &[usize],
        dtype: Dtype,
        axistags: &AxisTags,
    ) -> Result<(), ExecutionError> {
        let mut volumes = self.volumes.lock();
        let key = target.to_string();
        if volumes.contains_key(&key) {
            return Err(ExecutionError::Io(format!("volume {} already exists", key)));
        }
        volumes.insert(
            key,
            StoredVolume {
                shape: shape.to_vec(),
                dtype,
                axistags: axistags.clone(),
                data: ArrayData::zeros(dtype, shape),
            },
        );
        Ok(())
    }

    async fn write_subvolume(
        &self,
        target: &VolumeTarget,
        roi: &Roi,
        data: &ArrayData,
    ) -> Result<(), ExecutionError> {
        let mut volumes = self.volumes.lock();
        let key = target.to_string();
        let volume = volumes
            .get_mut(&key)
            .ok_or_else(|| ExecutionError::Io(format!("volume {} does not exist", key)))?;
        if data.dtype() != volume.dtype {
            return Err(ExecutionError::Io(format!(
                "volume {} stores {}, got {}",
                key,
                volume.dtype,
                data.dtype()
            )));
        }
        volume.data.assign_region(roi, data)
    }
}
