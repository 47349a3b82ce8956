// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::errors::ExecutionError;

/// Half-open box `[start, stop)` in an array's index space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub start: Vec<usize>,
    pub stop: Vec<usize>,
}

impl Roi {
    pub fn new(start: Vec<usize>, stop: Vec<usize>) -> Self {
        Self { start, stop }
    }

    /// The whole index space of `shape`.
    pub fn full(shape: &[usize]) -> Self {
        Self {
            start: vec![0; shape.len()],
            stop: shape.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.start.len()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.start
            .iter()
            .zip(&self.stop)
            .map(|(a, b)| b.saturating_sub(*a))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.shape().iter().any(|&n| n == 0)
    }

    /// Fails unless the box is well formed and lies inside `shape`.
    pub fn check_within(&self, shape: &[usize]) -> Result<(), ExecutionError> {
        let fits = self.start.len() == shape.len()
            && self.stop.len() == shape.len()
            && self
                .start
                .iter()
                .zip(&self.stop)
                .zip(shape)
                .all(|((a, b), n)| a <= b && b <= n);
        if fits {
            Ok(())
        } else {
            Err(ExecutionError::RegionOutOfBounds {
                start: self.start.clone(),
                stop: self.stop.clone(),
                shape: shape.to_vec(),
            })
        }
    }

    pub fn contains(&self, other: &Roi) -> bool {
        self.ndim() == other.ndim()
            && (0..self.ndim())
                .all(|i| self.start[i] <= other.start[i] && other.stop[i] <= self.stop[i])
    }

    pub fn intersect(&self, other: &Roi) -> Option<Roi> {
        if self.ndim() != other.ndim() {
            return None;
        }
        let start: Vec<usize> = (0..self.ndim())
            .map(|i| self.start[i].max(other.start[i]))
            .collect();
        let stop: Vec<usize> = (0..self.ndim())
            .map(|i| self.stop[i].min(other.stop[i]))
            .collect();
        if start.iter().zip(&stop).any(|(a, b)| a >= b) {
            return None;
        }
        Some(Roi { start, stop })
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Roi) -> Roi {
        if self.ndim() != other.ndim() {
            return self.clone();
        }
        Roi {
            start: (0..self.ndim())
                .map(|i| self.start[i].min(other.start[i]))
                .collect(),
            stop: (0..self.ndim())
                .map(|i| self.stop[i].max(other.stop[i]))
                .collect(),
        }
    }

    /// Reorder the axes: axis `i` of the result is axis `order[i]` of `self`.
    pub fn permuted(&self, order: &[usize]) -> Roi {
        Roi {
            start: order.iter().map(|&i| self.start[i]).collect(),
            stop: order.iter().map(|&i| self.stop[i]).collect(),
        }
    }

    pub fn reversed(&self) -> Roi {
        Roi {
            start: self.start.iter().rev().copied().collect(),
            stop: self.stop.iter().rev().copied().collect(),
        }
    }
}

impl Display for Roi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .start
            .iter()
            .zip(&self.stop)
            .map(|(a, b)| format!("{}:{}", a, b))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
