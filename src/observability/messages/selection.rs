// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for data selection decisions.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A provider sub-graph was chosen for a dataset.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_voxelflow::observability::messages::selection::ProviderSelected;
///
/// let msg = ProviderSelected {
///     role: "Raw Data",
///     location: "FileSystem",
///     nickname: "cells",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ProviderSelected<'a> {
    pub role: &'a str,
    pub location: &'a str,
    pub nickname: &'a str,
}

impl Display for ProviderSelected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Role '{}' reading '{}' from {}",
            self.role, self.nickname, self.location
        )
    }
}

impl StructuredLog for ProviderSelected<'_> {
    fn log(&self) {
        tracing::info!(
            role = self.role,
            location = self.location,
            nickname = self.nickname,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "provider_selected",
            span_name = name,
            role = self.role,
            location = self.location,
        )
    }
}

/// The output axis order was decided.
pub struct AxisOrderChosen<'a> {
    pub role: &'a str,
    pub source_axes: &'a str,
    pub output_order: &'a str,
    pub candidates: usize,
}

impl Display for AxisOrderChosen<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Role '{}': reordering '{}' to '{}' ({} candidate order(s))",
            self.role, self.source_axes, self.output_order, self.candidates
        )
    }
}

impl StructuredLog for AxisOrderChosen<'_> {
    fn log(&self) {
        tracing::debug!(
            role = self.role,
            source_axes = self.source_axes,
            output_order = self.output_order,
            candidates = self.candidates,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "axis_order_chosen",
            span_name = name,
            role = self.role,
            output_order = self.output_order,
        )
    }
}

/// A path pattern was expanded against the filesystem.
pub struct PathExpanded<'a> {
    pub pattern: &'a str,
    pub matches: usize,
}

impl Display for PathExpanded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Path '{}' expanded to {} file(s)", self.pattern, self.matches)
    }
}

impl StructuredLog for PathExpanded<'_> {
    fn log(&self) {
        tracing::debug!(pattern = self.pattern, matches = self.matches, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("path_expanded", span_name = name, pattern = self.pattern)
    }
}
