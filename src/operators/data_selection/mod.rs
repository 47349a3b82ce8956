// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bringing datasets into the graph.
//!
//! A [`DatasetInfo`] describes where a dataset lives and how it should be
//! presented. [`OpDataSelection`] turns one of them into an `Image` output
//! in a normalized axis order, [`OpDataSelectionGroup`] does so for every
//! role of a lane, and [`multi_lane_data_selection`] replicates the group
//! across lanes.

mod dataset_info;
mod group;
mod op_data_selection;
pub mod paths;

#[cfg(test)]
mod integration_tests;

pub use dataset_info::{DatasetInfo, DatasetLocation};
pub use group::{dataset_roles, multi_lane_data_selection, OpDataSelectionGroup};
pub use op_data_selection::OpDataSelection;
