// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Array payloads, regions of interest and slot values.

mod data;
mod roi;
mod value;

pub use data::{ArrayData, Element};
pub use roi::Roi;
pub use value::{TaggedArray, Value};
