// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::MetaError;

/// Element type of an array payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    U8,
    U16,
    U32,
    I32,
    I64,
    F32,
    F64,
}

impl Dtype {
    pub fn name(&self) -> &'static str {
        match self {
            Dtype::U8 => "uint8",
            Dtype::U16 => "uint16",
            Dtype::U32 => "uint32",
            Dtype::I32 => "int32",
            Dtype::I64 => "int64",
            Dtype::F32 => "float32",
            Dtype::F64 => "float64",
        }
    }

    /// Display range assumed when nothing else is known about the data.
    ///
    /// Only `uint8` has a range that can reasonably be assumed.
    pub fn implied_drange(&self) -> Option<(f64, f64)> {
        match self {
            Dtype::U8 => Some((0.0, 255.0)),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Dtype::F32 | Dtype::F64)
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dtype {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u8" | "uint8" => Ok(Dtype::U8),
            "u16" | "uint16" => Ok(Dtype::U16),
            "u32" | "uint32" => Ok(Dtype::U32),
            "i32" | "int32" => Ok(Dtype::I32),
            "i64" | "int64" => Ok(Dtype::I64),
            "f32" | "float32" => Ok(Dtype::F32),
            "f64" | "float64" => Ok(Dtype::F64),
            other => Err(MetaError::UnknownDtype(other.to_string())),
        }
    }
}
