// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod request;
pub mod wrapper;

pub use request::{Request, RequestStatus};
pub use wrapper::OperatorWrapper;
