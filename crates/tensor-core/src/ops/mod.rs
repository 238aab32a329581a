// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Numeric kernels invoked by the run loop.
//!
//! Each kernel writes into a caller-bound output view and never allocates,
//! so a forward pass touches no heap.

mod dense_op;
mod relu_op;

pub use dense_op::dense;
pub use relu_op::relu;
