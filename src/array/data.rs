// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use ndarray::{ArrayD, Axis, IxDyn, Slice};

use super::Roi;
use crate::errors::ExecutionError;
use crate::metadata::Dtype;

/// Dense N-dimensional array of one of the supported element types.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! with_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            ArrayData::U8($a) => $body,
            ArrayData::U16($a) => $body,
            ArrayData::U32($a) => $body,
            ArrayData::I32($a) => $body,
            ArrayData::I64($a) => $body,
            ArrayData::F32($a) => $body,
            ArrayData::F64($a) => $body,
        }
    };
}

macro_rules! map_array {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            ArrayData::U8($a) => ArrayData::U8($body),
            ArrayData::U16($a) => ArrayData::U16($body),
            ArrayData::U32($a) => ArrayData::U32($body),
            ArrayData::I32($a) => ArrayData::I32($body),
            ArrayData::I64($a) => ArrayData::I64($body),
            ArrayData::F32($a) => ArrayData::F32($body),
            ArrayData::F64($a) => ArrayData::F64($body),
        }
    };
}

/// Element types that can live inside an [`ArrayData`].
pub trait Element: Clone + Send + Sync + 'static {
    const DTYPE: Dtype;

    fn wrap(array: ArrayD<Self>) -> ArrayData;

    fn view_of(data: &ArrayData) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: Dtype = Dtype::$variant;

            fn wrap(array: ArrayD<Self>) -> ArrayData {
                ArrayData::$variant(array)
            }

            fn view_of(data: &ArrayData) -> Option<&ArrayD<Self>> {
                match data {
                    ArrayData::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }

        impl From<ArrayD<$t>> for ArrayData {
            fn from(array: ArrayD<$t>) -> Self {
                ArrayData::$variant(array)
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);

impl ArrayData {
    pub fn zeros(dtype: Dtype, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            Dtype::U8 => ArrayData::U8(ArrayD::zeros(dim)),
            Dtype::U16 => ArrayData::U16(ArrayD::zeros(dim)),
            Dtype::U32 => ArrayData::U32(ArrayD::zeros(dim)),
            Dtype::I32 => ArrayData::I32(ArrayD::zeros(dim)),
            Dtype::I64 => ArrayData::I64(ArrayD::zeros(dim)),
            Dtype::F32 => ArrayData::F32(ArrayD::zeros(dim)),
            Dtype::F64 => ArrayData::F64(ArrayD::zeros(dim)),
        }
    }

    pub fn from_shape_vec<T: Element>(shape: &[usize], values: Vec<T>) -> Result<Self, ExecutionError> {
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(T::wrap)
            .map_err(|e| ExecutionError::Internal(e.to_string()))
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            ArrayData::U8(_) => Dtype::U8,
            ArrayData::U16(_) => Dtype::U16,
            ArrayData::U32(_) => Dtype::U32,
            ArrayData::I32(_) => Dtype::I32,
            ArrayData::I64(_) => Dtype::I64,
            ArrayData::F32(_) => Dtype::F32,
            ArrayData::F64(_) => Dtype::F64,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        with_array!(self, a => a.shape().to_vec())
    }

    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::view_of(self)
    }

    /// Copy out the sub-region `roi`.
    pub fn slice(&self, roi: &Roi) -> Result<ArrayData, ExecutionError> {
        roi.check_within(&self.shape())?;
        Ok(map_array!(self, a => a
            .slice_each_axis(|ad| {
                let i = ad.axis.index();
                Slice::from(roi.start[i]..roi.stop[i])
            })
            .to_owned()))
    }

    /// Transpose so that axis `i` of the result is axis `order[i]` of `self`.
    pub fn permuted(&self, order: &[usize]) -> Result<ArrayData, ExecutionError> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        for &i in order {
            if i >= ndim || seen[i] {
                return Err(ExecutionError::Internal(format!(
                    "{:?} is not a permutation of {} axes",
                    order, ndim
                )));
            }
            seen[i] = true;
        }
        if order.len() != ndim {
            return Err(ExecutionError::Internal(format!(
                "{:?} is not a permutation of {} axes",
                order, ndim
            )));
        }
        Ok(map_array!(self, a => a
            .clone()
            .permuted_axes(order.to_vec())
            .as_standard_layout()
            .into_owned()))
    }

    /// Reverse the order of all axes.
    pub fn transposed(&self) -> ArrayData {
        map_array!(self, a => a.clone().reversed_axes().as_standard_layout().into_owned())
    }

    /// Insert a singleton axis at `index`.
    pub fn insert_axis(&self, index: usize) -> Result<ArrayData, ExecutionError> {
        if index > self.ndim() {
            return Err(ExecutionError::Internal(format!(
                "cannot insert axis {} into a {}-d array",
                index,
                self.ndim()
            )));
        }
        Ok(map_array!(self, a => a.clone().insert_axis(Axis(index))))
    }

    /// Drop the singleton axis at `index`.
    pub fn remove_axis(&self, index: usize) -> Result<ArrayData, ExecutionError> {
        let shape = self.shape();
        if shape.get(index) != Some(&1) {
            return Err(ExecutionError::Internal(format!(
                "axis {} of shape {:?} is not a singleton",
                index, shape
            )));
        }
        Ok(map_array!(self, a => a.clone().index_axis_move(Axis(index), 0)))
    }

    /// Overwrite the sub-region `roi` with `source`.
    pub fn assign_region(&mut self, roi: &Roi, source: &ArrayData) -> Result<(), ExecutionError> {
        roi.check_within(&self.shape())?;
        if roi.shape() != source.shape() {
            return Err(ExecutionError::Internal(format!(
                "region {} does not match source shape {:?}",
                roi,
                source.shape()
            )));
        }
        let slicer = |ad: ndarray::AxisDescription| {
            let i = ad.axis.index();
            Slice::from(roi.start[i]..roi.stop[i])
        };
        match (self, source) {
            (ArrayData::U8(d), ArrayData::U8(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::U16(d), ArrayData::U16(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::U32(d), ArrayData::U32(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::I32(d), ArrayData::I32(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::I64(d), ArrayData::I64(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::F32(d), ArrayData::F32(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (ArrayData::F64(d), ArrayData::F64(s)) => d.slice_each_axis_mut(slicer).assign(s),
            (d, s) => {
                return Err(ExecutionError::Internal(format!(
                    "cannot write {} data into a {} array",
                    s.dtype(),
                    d.dtype()
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: &[usize]) -> ArrayData {
        let n: usize = shape.iter().product();
        ArrayData::from_shape_vec(shape, (0..n as u32).collect()).unwrap()
    }

    #[test]
    fn zeros_has_dtype_and_shape() {
        let a = ArrayData::zeros(Dtype::F32, &[2, 3]);
        assert_eq!(a.dtype(), Dtype::F32);
        assert_eq!(a.shape(), vec![2, 3]);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn slice_copies_region() {
        let a = ramp(&[3, 4]);
        let s = a.slice(&Roi::new(vec![1, 1], vec![3, 3])).unwrap();
        let view = s.as_array::<u32>().unwrap();
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(view.iter().copied().collect::<Vec<_>>(), vec![5, 6, 9, 10]);
        assert!(a.slice(&Roi::new(vec![0, 0], vec![4, 4])).is_err());
    }

    #[test]
    fn permute_insert_and_remove_axes() {
        let a = ramp(&[2, 3]);
        let p = a.permuted(&[1, 0]).unwrap();
        assert_eq!(p.shape(), vec![3, 2]);
        assert_eq!(
            p.as_array::<u32>().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0, 3, 1, 4, 2, 5]
        );
        assert!(a.permuted(&[0, 0]).is_err());

        let inserted = a.insert_axis(0).unwrap();
        assert_eq!(inserted.shape(), vec![1, 2, 3]);
        assert_eq!(inserted.remove_axis(0).unwrap(), a);
        assert!(a.remove_axis(0).is_err());
    }

    #[test]
    fn transposed_reverses_axes() {
        let a = ramp(&[2, 3, 4]);
        assert_eq!(a.transposed().shape(), vec![4, 3, 2]);
    }

    #[test]
    fn assign_region_writes_in_place() {
        let mut dst = ArrayData::zeros(Dtype::U32, &[4, 4]);
        let src = ramp(&[2, 2]);
        dst.assign_region(&Roi::new(vec![2, 2], vec![4, 4]), &src)
            .unwrap();
        let back = dst.slice(&Roi::new(vec![2, 2], vec![4, 4])).unwrap();
        assert_eq!(back, src);

        let wrong = ArrayData::zeros(Dtype::U8, &[2, 2]);
        assert!(dst
            .assign_region(&Roi::new(vec![0, 0], vec![2, 2]), &wrong)
            .is_err());
    }
}
