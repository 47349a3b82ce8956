// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Array metadata: element types, axis labels and the mergeable [`MetaDict`].

mod axis_tags;
mod dtype;
mod meta_dict;

pub use axis_tags::{AxisKind, AxisTag, AxisTags, DefaultAxisOrders, KNOWN_AXES};
pub use dtype::Dtype;
pub use meta_dict::MetaDict;
