// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors, borrowed arena views and owned host tensors.

use crate::{DType, Quantization, Shape, TensorError};

/// Static description of a tensor: shape, element format and optional
/// quantization. A descriptor never owns data.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDesc {
    pub shape: Shape,
    pub dtype: DType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quant: Option<Quantization>,
}

impl TensorDesc {
    /// Creates an unquantised descriptor.
    pub fn new(shape: Shape, dtype: DType) -> Self {
        Self {
            shape,
            dtype,
            quant: None,
        }
    }

    /// Attaches quantization parameters.
    pub fn with_quant(mut self, quant: Quantization) -> Self {
        self.quant = Some(quant);
        self
    }

    /// Byte extent implied by shape × format.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// Byte pitch of each dimension.
    pub fn byte_strides(&self) -> Vec<usize> {
        self.shape.byte_strides(self.dtype)
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    fn check_len(&self, len: usize) -> Result<(), TensorError> {
        let expected = self.size_bytes();
        if len != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}

fn read_f32(data: &[u8], index: usize) -> f32 {
    let at = index * 4;
    f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// A read-only view pairing a descriptor with the bytes it was bound to.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    desc: &'a TensorDesc,
    data: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Creates a view, checking that `data` is exactly the descriptor's extent.
    pub fn new(desc: &'a TensorDesc, data: &'a [u8]) -> Result<Self, TensorError> {
        desc.check_len(data.len())?;
        Ok(Self { desc, data })
    }

    pub fn desc(&self) -> &'a TensorDesc {
        self.desc
    }

    pub fn shape(&self) -> &'a Shape {
        &self.desc.shape
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Reads element `index` as `f32`. The view must be `F32`.
    pub fn f32_at(&self, index: usize) -> f32 {
        read_f32(self.data, index)
    }

    /// Iterates the elements as `f32`. The view must be `F32`.
    pub fn iter_f32(&self) -> impl Iterator<Item = f32> + 'a {
        self.data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Returns the elements as real values, dequantising integer formats.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self.desc.dtype {
            DType::F32 => self.iter_f32().collect(),
            DType::I8 => self
                .data
                .iter()
                .map(|&b| self.dequant(b as i8 as i32))
                .collect(),
            DType::U8 | DType::Bool => {
                self.data.iter().map(|&b| self.dequant(b as i32)).collect()
            }
        }
    }

    fn dequant(&self, q: i32) -> f32 {
        match self.desc.quant {
            Some(quant) => quant.dequantize(q),
            None => q as f32,
        }
    }
}

/// A writable view over an arena slot.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    desc: &'a TensorDesc,
    data: &'a mut [u8],
}

impl<'a> TensorViewMut<'a> {
    /// Creates a mutable view, checking that `data` is exactly the descriptor's extent.
    pub fn new(desc: &'a TensorDesc, data: &'a mut [u8]) -> Result<Self, TensorError> {
        desc.check_len(data.len())?;
        Ok(Self { desc, data })
    }

    pub fn desc(&self) -> &TensorDesc {
        self.desc
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Writes element `index` as little-endian `f32`.
    pub fn set_f32(&mut self, index: usize, value: f32) {
        let at = index * 4;
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> TensorView<'_> {
        TensorView {
            desc: self.desc,
            data: &*self.data,
        }
    }
}

/// An owned host-side tensor used to feed inputs and collect outputs.
///
/// # Memory Layout
/// Data is stored in row-major (C) order as a flat little-endian byte buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    desc: TensorDesc,
    data: Vec<u8>,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{DType, Shape, Tensor, TensorDesc};
    /// let t = Tensor::zeros(TensorDesc::new(Shape::matrix(1, 7), DType::F32));
    /// assert_eq!(t.size_bytes(), 28);
    /// ```
    pub fn zeros(desc: TensorDesc) -> Self {
        let size = desc.size_bytes();
        Self {
            desc,
            data: vec![0u8; size],
        }
    }

    /// Creates a tensor from raw bytes.
    pub fn from_bytes(desc: TensorDesc, data: Vec<u8>) -> Result<Self, TensorError> {
        desc.check_len(data.len())?;
        Ok(Self { desc, data })
    }

    /// Creates an `F32` tensor from values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.to_f32_vec(), vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let desc = TensorDesc::new(shape, DType::F32);
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(desc, data)
    }

    pub fn desc(&self) -> &TensorDesc {
        &self.desc
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            desc: &self.desc,
            data: &self.data,
        }
    }

    pub fn view_mut(&mut self) -> TensorViewMut<'_> {
        TensorViewMut {
            desc: &self.desc,
            data: &mut self.data,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Returns the elements as real values.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.view().to_f32_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(TensorDesc::new(Shape::matrix(2, 3), DType::F32));
        assert_eq!(t.size_bytes(), 24);
        assert!(t.to_f32_vec().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_f32_little_endian() {
        let t = Tensor::from_f32(Shape::vector(1), &[1.0]).unwrap();
        assert_eq!(t.as_bytes(), &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let desc = TensorDesc::new(Shape::matrix(2, 3), DType::F32);
        let err = Tensor::from_bytes(desc, vec![0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            TensorError::BufferSizeMismatch {
                expected: 24,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_view_over_slice() {
        let desc = TensorDesc::new(Shape::vector(2), DType::F32);
        let mut bytes = [0u8; 12];
        {
            let mut v = TensorViewMut::new(&desc, &mut bytes[4..12]).unwrap();
            v.set_f32(0, 2.5);
            v.set_f32(1, -1.0);
        }
        let v = TensorView::new(&desc, &bytes[4..12]).unwrap();
        assert_eq!(v.f32_at(0), 2.5);
        assert_eq!(v.iter_f32().collect::<Vec<_>>(), vec![2.5, -1.0]);
        assert!(TensorView::new(&desc, &bytes[..4]).is_err());
    }

    #[test]
    fn test_quantized_read() {
        let desc = TensorDesc::new(Shape::vector(2), DType::I8).with_quant(Quantization {
            scale: 0.5,
            zero_point: 0,
        });
        let t = Tensor::from_bytes(desc, vec![4u8, 0xfe]).unwrap();
        assert_eq!(t.to_f32_vec(), vec![2.0, -1.0]);
    }

    #[test]
    fn test_byte_strides() {
        let desc = TensorDesc::new(Shape::matrix(147, 100), DType::F32);
        assert_eq!(desc.byte_strides(), vec![400, 4]);
        assert_eq!(desc.size_bytes(), 58_800);
    }
}
