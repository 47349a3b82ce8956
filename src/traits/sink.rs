// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::fmt::{Display, Formatter};

use crate::array::{ArrayData, Roi};
use crate::errors::ExecutionError;
use crate::metadata::{AxisTags, Dtype};

/// Address of a remote volume: `http://<hostname>/api/node/<uuid>/<dataname>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeTarget {
    pub hostname: String,
    pub uuid: String,
    pub dataname: String,
}

impl Display for VolumeTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.uuid, self.dataname)
    }
}

/// Destination of a volume export.
#[async_trait]
pub trait VolumeSink: Send + Sync {
    /// Create an empty volume. Fails if the volume already exists.
    async fn create_volume(
        &self,
        target: &VolumeTarget,
        shape: &[usize],
        dtype: Dtype,
        axistags: &AxisTags,
    ) -> Result<(), ExecutionError>;

    /// Overwrite `roi` of an existing volume with `data`.
    async fn write_subvolume(
        &self,
        target: &VolumeTarget,
        roi: &Roi,
        data: &ArrayData,
    ) -> Result<(), ExecutionError>;
}
