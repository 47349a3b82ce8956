// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use super::ArrayData;
use crate::graph::SlotType;
use crate::metadata::AxisTags;

/// An array together with its (optional) axis labels.
///
/// Untagged arrays are given the graph's default axis order for their rank
/// when they are stored on a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedArray {
    pub data: Arc<ArrayData>,
    pub axistags: Option<AxisTags>,
}

impl TaggedArray {
    pub fn new(data: ArrayData) -> Self {
        Self {
            data: Arc::new(data),
            axistags: None,
        }
    }

    pub fn tagged(data: ArrayData, axistags: AxisTags) -> Self {
        Self {
            data: Arc::new(data),
            axistags: Some(axistags),
        }
    }
}

/// A value stored directly on a slot.
#[derive(Clone)]
pub enum Value {
    Array(TaggedArray),
    Str(String),
    Bool(bool),
    /// Opaque object, retrieved with [`Value::downcast`].
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn stype(&self) -> SlotType {
        match self {
            Value::Array(_) => SlotType::Array,
            Value::Str(_) => SlotType::String,
            Value::Bool(_) => SlotType::Bool,
            Value::Object(_) => SlotType::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&TaggedArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Value::Object(obj) => Arc::clone(obj).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Array(a) => f
                .debug_struct("Array")
                .field("shape", &a.data.shape())
                .field("dtype", &a.data.dtype())
                .field("axistags", &a.axistags)
                .finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ArrayData> for Value {
    fn from(data: ArrayData) -> Self {
        Value::Array(TaggedArray::new(data))
    }
}

impl From<TaggedArray> for Value {
    fn from(array: TaggedArray) -> Self {
        Value::Array(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Dtype;

    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    #[test]
    fn objects_downcast_to_their_type_only() {
        let v = Value::object(Handle(7));
        assert_eq!(v.stype(), SlotType::Object);
        assert_eq!(*v.downcast::<Handle>().unwrap(), Handle(7));
        assert!(v.downcast::<String>().is_none());
    }

    #[test]
    fn conversions_pick_the_right_variant() {
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        let v = Value::from(ArrayData::zeros(Dtype::U8, &[2]));
        assert_eq!(v.stype(), SlotType::Array);
        assert!(v.as_array().unwrap().axistags.is_none());
    }
}
