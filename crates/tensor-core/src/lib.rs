// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor descriptors and the numeric kernels executed by the network chain.
//!
//! This crate provides:
//! - [`TensorDesc`] — shape, element format and optional quantization of a
//!   tensor. Descriptors never own data: the bytes live in an arena.
//! - [`Shape`] — rank ≤ 4 shape with byte-pitch strides.
//! - [`DType`] — supported element formats (f32, i8, u8, bool).
//! - [`TensorView`] / [`TensorViewMut`] — borrowed views pairing a descriptor
//!   with the arena bytes it was bound to.
//! - [`Tensor`] — an owned host-side tensor for feeding inputs and
//!   collecting outputs.
//! - The `dense` and `relu` kernels.
//!
//! # Design Goals
//! - Zero-copy views over caller-owned memory.
//! - No heap allocation in the kernels.
//! - Clean error types via `thiserror`.

mod dtype;
mod error;
mod ops;
mod shape;
mod tensor;

pub use dtype::{DType, Quantization};
pub use error::TensorError;
pub use ops::{dense, relu};
pub use shape::{Shape, MAX_RANK};
pub use tensor::{Tensor, TensorDesc, TensorView, TensorViewMut};
