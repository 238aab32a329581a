// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected layer.

use crate::{DType, Shape, TensorError, TensorView, TensorViewMut};

/// Computes `output = input @ weights + bias` for a batch of one.
///
/// `input` holds `K` features, `weights` is `[K, N]` row-major and `bias`
/// (optional) holds `N` values; `output` must hold `N` values.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
/// Returns [`TensorError::UnsupportedDType`] if any operand is not `F32`.
pub fn dense(
    input: &TensorView<'_>,
    weights: &TensorView<'_>,
    bias: Option<&TensorView<'_>>,
    output: &mut TensorViewMut<'_>,
) -> Result<(), TensorError> {
    let dtypes = [input.dtype(), weights.dtype(), output.dtype()]
        .into_iter()
        .chain(bias.map(|b| b.dtype()));
    for dtype in dtypes {
        if dtype != DType::F32 {
            return Err(TensorError::UnsupportedDType { op: "dense", dtype });
        }
    }

    let w_dims = weights.shape().dims();
    if w_dims.len() != 2 {
        return Err(TensorError::ShapeMismatch {
            op: "dense (weights rank)",
            lhs: Shape::matrix(input.shape().num_elements(), output.shape().num_elements()),
            rhs: weights.shape().clone(),
        });
    }
    let (k, n) = (w_dims[0], w_dims[1]);

    if input.shape().num_elements() != k {
        return Err(TensorError::ShapeMismatch {
            op: "dense (input)",
            lhs: input.shape().clone(),
            rhs: weights.shape().clone(),
        });
    }
    if output.shape().num_elements() != n {
        return Err(TensorError::ShapeMismatch {
            op: "dense (output)",
            lhs: Shape::vector(n),
            rhs: output.shape().clone(),
        });
    }
    if let Some(b) = bias {
        if b.shape().num_elements() != n {
            return Err(TensorError::ShapeMismatch {
                op: "dense (bias)",
                lhs: Shape::vector(n),
                rhs: b.shape().clone(),
            });
        }
    }

    dense_f32_generic(input, weights, bias, output, k, n);
    Ok(())
}

/// Portable kernel: one accumulator per output column, weights walked
/// column-wise so the output is written exactly once.
fn dense_f32_generic(
    x: &TensorView<'_>,
    w: &TensorView<'_>,
    b: Option<&TensorView<'_>>,
    y: &mut TensorViewMut<'_>,
    k: usize,
    n: usize,
) {
    for j in 0..n {
        let mut acc = b.map_or(0.0, |b| b.f32_at(j));
        for i in 0..k {
            acc += x.f32_at(i) * w.f32_at(i * n + j);
        }
        y.set_f32(j, acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Tensor, TensorDesc};

    fn out(n: usize) -> Tensor {
        Tensor::zeros(TensorDesc::new(Shape::matrix(1, n), DType::F32))
    }

    #[test]
    fn test_dense_1x3_times_3x2() {
        // x = [1, 2, 3]; W = [[1, 2], [3, 4], [5, 6]]; b = [0.5, -1]
        let x = Tensor::from_f32(Shape::matrix(1, 3), &[1.0, 2.0, 3.0]).unwrap();
        let w = Tensor::from_f32(Shape::matrix(3, 2), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::from_f32(Shape::vector(2), &[0.5, -1.0]).unwrap();
        let mut y = out(2);

        dense(&x.view(), &w.view(), Some(&b.view()), &mut y.view_mut()).unwrap();

        assert_eq!(y.to_f32_vec(), vec![22.5, 27.0]);
    }

    #[test]
    fn test_dense_without_bias() {
        let x = Tensor::from_f32(Shape::matrix(1, 2), &[2.0, -1.0]).unwrap();
        let w = Tensor::from_f32(Shape::matrix(2, 1), &[3.0, 4.0]).unwrap();
        let mut y = out(1);
        dense(&x.view(), &w.view(), None, &mut y.view_mut()).unwrap();
        assert_eq!(y.to_f32_vec(), vec![2.0]);
    }

    #[test]
    fn test_dense_shape_mismatch() {
        let x = Tensor::zeros(TensorDesc::new(Shape::matrix(1, 4), DType::F32));
        let w = Tensor::zeros(TensorDesc::new(Shape::matrix(3, 2), DType::F32));
        let mut y = out(2);
        let result = dense(&x.view(), &w.view(), None, &mut y.view_mut());
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch { op: "dense (input)", .. })
        ));
    }

    #[test]
    fn test_dense_output_mismatch() {
        let x = Tensor::zeros(TensorDesc::new(Shape::matrix(1, 3), DType::F32));
        let w = Tensor::zeros(TensorDesc::new(Shape::matrix(3, 2), DType::F32));
        let mut y = out(5);
        assert!(dense(&x.view(), &w.view(), None, &mut y.view_mut()).is_err());
    }

    #[test]
    fn test_dense_rejects_bool_input() {
        let x = Tensor::zeros(TensorDesc::new(Shape::matrix(1, 3), DType::Bool));
        let w = Tensor::zeros(TensorDesc::new(Shape::matrix(3, 2), DType::F32));
        let mut y = out(2);
        assert!(matches!(
            dense(&x.view(), &w.view(), None, &mut y.view_mut()),
            Err(TensorError::UnsupportedDType { op: "dense", dtype: DType::Bool })
        ));
    }
}
