// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Caller-owned memory for a statically planned network.
//!
//! # Key Components
//!
//! - [`WeightsArena`] / [`ActivationArena`] — borrowed regions handed in by
//!   the bootstrap code. The runtime never allocates tensor storage.
//! - [`bind`] — resolves a tensor template to a [`Slot`] after checking
//!   `offset + size <= arena size`.
//! - [`validate_aliasing`] — rejects arena maps where two tensors share bytes
//!   while both are live.
//! - [`MemoryBudget`] — arena sizes with human-readable parsing (`"988"`,
//!   `"100K"`).
//! - [`HeapStats`] / [`HighWaterMark`] — instrumentation heap accounting and
//!   paint-based arena usage measurement.
//!
//! # Ownership Model
//!
//! ```text
//!  bootstrap code owns  ──►  &'a [u8] weights, &'a mut [u8] activations
//!                                 │
//!                                 ▼
//!                     Network<'a> borrows both for its lifetime
//!                                 │
//!                     Slot { offset, len } ──► TensorView / TensorViewMut
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{bind, ActivationArena, ArenaKind};
//! use tensor_core::{DType, Shape, TensorDesc};
//!
//! let mut region = vec![0u8; 988];
//! let arena = ActivationArena::new(&mut region);
//! let desc = TensorDesc::new(Shape::matrix(1, 147), DType::F32);
//! let slot = bind(&desc, ArenaKind::Activations, arena.size(), 0).unwrap();
//! assert_eq!(slot.len, 588);
//! ```

mod arena;
mod budget;
mod error;
mod lifetime;
mod stats;

pub use arena::{bind, ActivationArena, ArenaKind, Slot, WeightsArena};
pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use lifetime::{required_size, validate_aliasing, LiveRange};
pub use stats::{HeapStats, HighWaterMark, PAINT_PATTERN};
