// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for the graph engine.
//!
//! * [`GraphError`] - structural and configuration failures raised while wiring
//!   slots or running `setup_outputs`. These abort the triggering call.
//! * [`ResolutionError`] - a file or internal dataset path could not be found or
//!   expanded. Raised eagerly at path-expansion time.
//! * [`ExecutionError`] - an `execute` call failed. Local to the failing request.
//! * [`MetaError`] - a metadata record violates its own invariants.
//! * [`ConfigError`] - the engine configuration file could not be loaded or is invalid.
//!
//! Every type is `Clone` so one failure can be handed to any number of waiters
//! and callbacks.

mod config;
mod execution;
mod graph;
mod metadata;
mod resolution;

pub use config::ConfigError;
pub use execution::ExecutionError;
pub use graph::GraphError;
pub use metadata::MetaError;
pub use resolution::ResolutionError;
