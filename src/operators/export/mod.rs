// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Writing graph data to remote volumes.

mod memory_sink;
mod op_export_volume;

pub use memory_sink::{MemoryVolumeSink, StoredVolume};
pub use op_export_volume::{parse_node_data_url, OpExportVolume};
