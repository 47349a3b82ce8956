// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod operator;
pub mod provider;
pub mod sink;

pub use operator::Operator;
pub use provider::{ProjectFile, ProjectStore, ProviderFactory, ProviderRequest};
pub use sink::{VolumeSink, VolumeTarget};
