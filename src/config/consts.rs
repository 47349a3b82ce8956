// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default size of the blocking worker pool that runs `execute` calls.
pub const DEFAULT_WORKER_THREADS: usize = 4;
/// Upper bound on configured worker threads.
pub const MAX_WORKER_THREADS: usize = 512;
/// Name prefix of worker threads.
pub const DEFAULT_THREAD_NAME: &str = "voxelflow-worker";
/// `EnvFilter` directive used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "the_voxelflow=info";
/// Axis orders data selection may choose from, in order of preference.
pub const DEFAULT_FORCE_AXIS_ORDER: &[&str] = &["tczyx"];
