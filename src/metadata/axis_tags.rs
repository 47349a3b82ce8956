// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Axis labels and axis orders.
//!
//! An axis order is written as a string of single-character keys, one per
//! array dimension, slowest varying first. `t` is time, `c` is channel and
//! `x`, `y`, `z` are spatial. Any other lowercase letter is accepted as an
//! axis of unknown kind.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::errors::MetaError;

/// The five axis keys known to the engine, in canonical order.
pub const KNOWN_AXES: &str = "tczyx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Time,
    Channel,
    Space,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisTag {
    pub key: char,
    pub kind: AxisKind,
}

impl AxisTag {
    pub fn from_key(key: char) -> Result<Self, MetaError> {
        if !key.is_ascii_lowercase() {
            return Err(MetaError::UnknownAxis(key));
        }
        let kind = match key {
            't' => AxisKind::Time,
            'c' => AxisKind::Channel,
            'x' | 'y' | 'z' => AxisKind::Space,
            _ => AxisKind::Unknown,
        };
        Ok(Self { key, kind })
    }
}

/// Ordered axis labels of an array, one per dimension.
///
/// Serialized as its key string (`"tzyxc"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisTags(Vec<AxisTag>);

impl AxisTags {
    /// Build axis tags from a key string such as `"tczyx"`.
    ///
    /// Keys must be lowercase letters and must not repeat.
    pub fn from_keys(keys: &str) -> Result<Self, MetaError> {
        let mut seen = HashSet::new();
        let mut tags = Vec::with_capacity(keys.len());
        for key in keys.chars() {
            let tag = AxisTag::from_key(key)?;
            if !seen.insert(key) {
                return Err(MetaError::DuplicateAxis(key));
            }
            tags.push(tag);
        }
        Ok(Self(tags))
    }

    pub fn keys(&self) -> String {
        self.0.iter().map(|t| t.key).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisTag> {
        self.0.iter()
    }

    pub fn index_of(&self, key: char) -> Option<usize> {
        self.0.iter().position(|t| t.key == key)
    }

    pub fn contains(&self, key: char) -> bool {
        self.index_of(key).is_some()
    }

    pub fn channel_index(&self) -> Option<usize> {
        self.0.iter().position(|t| t.kind == AxisKind::Channel)
    }

    /// Reversed order, as produced by a full transpose.
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }
}

impl TryFrom<String> for AxisTags {
    type Error = MetaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AxisTags::from_keys(&value)
    }
}

impl From<AxisTags> for String {
    fn from(tags: AxisTags) -> Self {
        tags.keys()
    }
}

impl Display for AxisTags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.keys())
    }
}

/// Axis order assumed for untagged arrays, chosen by rank.
///
/// Each entry is an axis order string; the entry whose length equals the
/// array rank is used. Replaces a process-wide lookup table so callers can
/// configure it per graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultAxisOrders(pub Vec<String>);

impl Default for DefaultAxisOrders {
    fn default() -> Self {
        Self(
            ["x", "yx", "zyx", "zyxc", "tzyxc"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl DefaultAxisOrders {
    pub fn order_for_rank(&self, rank: usize) -> Option<&str> {
        self.0
            .iter()
            .find(|order| order.chars().count() == rank)
            .map(String::as_str)
    }

    pub fn tags_for_rank(&self, rank: usize) -> Result<AxisTags, MetaError> {
        let order = self
            .order_for_rank(rank)
            .ok_or(MetaError::Incomplete("axistags"))?;
        AxisTags::from_keys(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_and_kinds() {
        let tags = AxisTags::from_keys("tzyxc").unwrap();
        assert_eq!(tags.keys(), "tzyxc");
        assert_eq!(tags.len(), 5);
        assert_eq!(tags.index_of('y'), Some(2));
        assert_eq!(tags.channel_index(), Some(4));
        assert_eq!(tags.iter().next().unwrap().kind, AxisKind::Time);
    }

    #[test]
    fn rejects_duplicates_and_bad_keys() {
        assert_eq!(
            AxisTags::from_keys("xyx"),
            Err(MetaError::DuplicateAxis('x'))
        );
        assert_eq!(AxisTags::from_keys("X"), Err(MetaError::UnknownAxis('X')));
    }

    #[test]
    fn unknown_letters_are_allowed() {
        let tags = AxisTags::from_keys("qyx").unwrap();
        assert_eq!(tags.iter().next().unwrap().kind, AxisKind::Unknown);
    }

    #[test]
    fn serializes_as_key_string() {
        let tags = AxisTags::from_keys("zyx").unwrap();
        assert_eq!(serde_json::to_string(&tags).unwrap(), "\"zyx\"");
        let back: AxisTags = serde_json::from_str("\"yxc\"").unwrap();
        assert_eq!(back.keys(), "yxc");
    }

    #[test]
    fn default_orders_by_rank() {
        let orders = DefaultAxisOrders::default();
        assert_eq!(orders.order_for_rank(2), Some("yx"));
        assert_eq!(orders.order_for_rank(4), Some("zyxc"));
        assert_eq!(orders.tags_for_rank(5).unwrap().keys(), "tzyxc");
        assert_eq!(
            orders.tags_for_rank(7),
            Err(MetaError::Incomplete("axistags"))
        );
    }
}
