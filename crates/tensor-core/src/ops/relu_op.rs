// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rectified linear unit.

use crate::{DType, TensorError, TensorView, TensorViewMut};

/// Applies `max(0, x)` element-wise from `input` into `output`.
///
/// # Errors
/// Returns [`TensorError::UnsupportedDType`] unless both sides are `F32`, and
/// [`TensorError::ShapeMismatch`] if the element counts differ.
pub fn relu(input: &TensorView<'_>, output: &mut TensorViewMut<'_>) -> Result<(), TensorError> {
    for dtype in [input.dtype(), output.dtype()] {
        if dtype != DType::F32 {
            return Err(TensorError::UnsupportedDType { op: "relu", dtype });
        }
    }
    if input.shape().num_elements() != output.shape().num_elements() {
        return Err(TensorError::ShapeMismatch {
            op: "relu",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }

    for (i, x) in input.iter_f32().enumerate() {
        output.set_f32(i, x.max(0.0));
    }
    Ok(())
}
