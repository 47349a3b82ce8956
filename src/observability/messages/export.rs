// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for volume export events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Export to a remote volume started.
pub struct ExportStarted<'a> {
    pub hostname: &'a str,
    pub uuid: &'a str,
    pub dataname: &'a str,
}

impl Display for ExportStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exporting volume '{}' to node {} on {}",
            self.dataname, self.uuid, self.hostname
        )
    }
}

impl StructuredLog for ExportStarted<'_> {
    fn log(&self) {
        tracing::info!(
            hostname = self.hostname,
            uuid = self.uuid,
            dataname = self.dataname,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "export",
            span_name = name,
            hostname = self.hostname,
            uuid = self.uuid,
            dataname = self.dataname,
        )
    }
}

/// Export progress, 0 to 100.
pub struct ExportProgress {
    pub percent: u8,
}

impl Display for ExportProgress {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Export {}% complete", self.percent)
    }
}

impl StructuredLog for ExportProgress {
    fn log(&self) {
        tracing::debug!(percent = self.percent, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("export_progress", span_name = name, percent = self.percent)
    }
}

/// Export finished.
pub struct ExportCompleted<'a> {
    pub dataname: &'a str,
    pub shape: &'a [usize],
}

impl Display for ExportCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exported volume '{}' with shape {:?}",
            self.dataname, self.shape
        )
    }
}

impl StructuredLog for ExportCompleted<'_> {
    fn log(&self) {
        tracing::info!(dataname = self.dataname, shape = ?self.shape, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("export_completed", span_name = name, dataname = self.dataname)
    }
}

/// Export failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ExportFailed<'a> {
    pub dataname: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ExportFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Export of '{}' failed: {}", self.dataname, self.error)
    }
}

impl StructuredLog for ExportFailed<'_> {
    fn log(&self) {
        tracing::error!(dataname = self.dataname, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("export_failed", span_name = name, dataname = self.dataname)
    }
}
