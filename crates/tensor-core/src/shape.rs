// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use crate::{DType, TensorError};
use std::fmt;

/// Maximum number of dimensions a tensor may have.
pub const MAX_RANK: usize = 4;

/// Describes the dimensionality of a tensor.
///
/// Shapes are immutable once created. The rank is capped at [`MAX_RANK`]
/// because every tensor of a compiled network is described by a fixed
/// four-slot record in the network image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![1, 147]).unwrap();
    /// assert_eq!(s.rank(), 2);
    /// assert_eq!(s.num_elements(), 147);
    /// assert!(Shape::new(vec![1, 1, 1, 1, 1]).is_err());
    /// ```
    pub fn new(dims: Vec<usize>) -> Result<Self, TensorError> {
        if dims.len() > MAX_RANK {
            return Err(TensorError::RankTooLarge {
                rank: dims.len(),
                max: MAX_RANK,
            });
        }
        // Every partial product of the dims, scaled by the widest element
        // format, must fit so strides and byte sizes cannot overflow.
        let widest = DType::F32.size_bytes();
        let bounded = dims
            .iter()
            .try_fold(widest, |acc, &d| acc.checked_mul(d.max(1)))
            .is_some();
        if !bounded {
            return Err(TensorError::ShapeOverflow(dims));
        }
        Ok(Self { dims })
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (matrix).
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Returns the dimensions padded with trailing 1s to [`MAX_RANK`].
    pub fn padded(&self) -> [usize; MAX_RANK] {
        let mut out = [1usize; MAX_RANK];
        out[..self.dims.len()].copy_from_slice(&self.dims);
        out
    }

    /// Computes the memory footprint in bytes for a given [`DType`].
    pub fn size_bytes(&self, dtype: DType) -> usize {
        self.num_elements() * dtype.size_bytes()
    }

    /// Computes row-major (C-order) element strides for this shape.
    pub fn strides(&self) -> Vec<usize> {
        let rank = self.dims.len();
        if rank == 0 {
            return vec![];
        }
        let mut strides = vec![0usize; rank];
        strides[rank - 1] = 1;
        for i in (0..rank - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Computes the byte pitch of each dimension for the given element format.
    pub fn byte_strides(&self, dtype: DType) -> Vec<usize> {
        self.strides()
            .into_iter()
            .map(|s| s * dtype.size_bytes())
            .collect()
    }

    /// Returns the number of features: the product of all dimensions except
    /// the leading batch dimension.
    pub fn features(&self) -> usize {
        self.dims.iter().skip(1).product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = TensorError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.dims
    }
}
