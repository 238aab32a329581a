// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for arena binding and validation.

use crate::ArenaKind;

/// Errors raised while binding tensors to arenas or validating the arena map.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A tensor slot does not fit inside its arena.
    #[error("{kind} slot at offset {offset} (+{len} bytes) exceeds arena of {arena_size} bytes")]
    SlotOutOfBounds {
        kind: ArenaKind,
        offset: usize,
        len: usize,
        arena_size: usize,
    },

    /// A caller-provided region is smaller than the declared requirement.
    #[error("{kind} arena too small: {required} bytes required, {provided} provided")]
    ArenaTooSmall {
        kind: ArenaKind,
        required: usize,
        provided: usize,
    },

    /// Two activation tensors share bytes while both are live.
    #[error("tensors {first} and {second} alias the same activation bytes with overlapping lifetimes")]
    AliasConflict { first: usize, second: usize },

    /// A node's input and output ranges overlap.
    #[error("input and output of one node overlap in the activation arena")]
    InOutOverlap,

    /// Attempted to bind a zero-sized region.
    #[error("cannot bind a zero-sized region")]
    ZeroSized,

    /// A budget string could not be parsed.
    #[error("invalid budget string '{0}': expected a number followed by an optional suffix (K, M)")]
    InvalidBudget(String),

    /// A tensor descriptor was rejected by the tensor layer.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}
