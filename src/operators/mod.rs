// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operators shipped with the engine.
//!
//! * [`OpArrayPiper`] - passes its input through unchanged
//! * [`OpMetadataInjector`] - overlays metadata on its input
//! * [`OpZeroDefault`] - zeros shaped like a metadata template, unless an input is given
//! * [`OpReorderAxes`] - presents data in a requested axis order
//! * [`data_selection`] - dataset selection per role and per lane
//! * [`export`] - volume export to a [`VolumeSink`](crate::traits::VolumeSink)

mod array_piper;
mod metadata_injector;
mod reorder_axes;
mod zero_default;

pub mod data_selection;
pub mod export;

#[cfg(test)]
pub mod stub;

pub use array_piper::OpArrayPiper;
pub use metadata_injector::OpMetadataInjector;
pub use reorder_axes::OpReorderAxes;
pub use zero_default::OpZeroDefault;
