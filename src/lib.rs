// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod array;      // array payloads, regions, slot values
pub mod config;     // engine config + provider registry
pub mod engine;     // requests and lane replication
pub mod errors;     // error handling
pub mod graph;      // operators, slots, connection manager
pub mod metadata;   // MetaDict, axis tags, dtypes
pub mod observability;
pub mod operators;  // data selection, export and helper operators
pub mod traits;     // unified abstractions
