// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Caller-owned arenas and tensor slot binding.
//!
//! Binding is pure offset arithmetic: a [`Slot`] records where a tensor's
//! bytes live inside an arena, and views are produced on demand from the
//! borrowed region. Nothing is copied.

use crate::MemoryError;
use std::fmt;
use std::ops::Range;
use tensor_core::{TensorDesc, TensorView, TensorViewMut};

/// Which arena a tensor lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaKind {
    /// Read-only parameters, populated once from the network image.
    Weights,
    /// Read-write scratch, reused across the forward pass.
    Activations,
}

impl fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaKind::Weights => write!(f, "weights"),
            ArenaKind::Activations => write!(f, "activations"),
        }
    }
}

/// A resolved byte range inside one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Slot {
    pub kind: ArenaKind,
    pub offset: usize,
    pub len: usize,
}

impl Slot {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// True if both slots are in the same arena and share at least one byte.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.kind == other.kind && self.offset < other.end() && other.offset < self.end()
    }
}

/// Binds a tensor template to `offset` inside an arena of `arena_size` bytes.
///
/// # Errors
/// [`MemoryError::SlotOutOfBounds`] if `offset + desc.size_bytes() > arena_size`.
pub fn bind(
    desc: &TensorDesc,
    kind: ArenaKind,
    arena_size: usize,
    offset: usize,
) -> Result<Slot, MemoryError> {
    let len = desc.size_bytes();
    let fits = offset
        .checked_add(len)
        .is_some_and(|end| end <= arena_size);
    if !fits {
        return Err(MemoryError::SlotOutOfBounds {
            kind,
            offset,
            len,
            arena_size,
        });
    }
    tracing::debug!(%kind, offset, len, "bound tensor slot");
    Ok(Slot { kind, offset, len })
}

/// Read-only parameter memory.
#[derive(Debug, Clone, Copy)]
pub struct WeightsArena<'a> {
    data: &'a [u8],
}

impl<'a> WeightsArena<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Views a bound weights slot.
    pub fn view<'s>(&self, desc: &'s TensorDesc, slot: Slot) -> Result<TensorView<'s>, MemoryError>
    where
        'a: 's,
    {
        let bytes = self
            .data
            .get(slot.range())
            .ok_or(MemoryError::SlotOutOfBounds {
                kind: ArenaKind::Weights,
                offset: slot.offset,
                len: slot.len,
                arena_size: self.data.len(),
            })?;
        Ok(TensorView::new(desc, bytes)?)
    }
}

/// Read-write activation memory.
#[derive(Debug)]
pub struct ActivationArena<'a> {
    data: &'a mut [u8],
}

impl<'a> ActivationArena<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &*self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    fn out_of_bounds(&self, slot: Slot) -> MemoryError {
        MemoryError::SlotOutOfBounds {
            kind: ArenaKind::Activations,
            offset: slot.offset,
            len: slot.len,
            arena_size: self.data.len(),
        }
    }

    pub fn bytes(&self, slot: Slot) -> Result<&[u8], MemoryError> {
        let err = self.out_of_bounds(slot);
        self.data.get(slot.range()).ok_or(err)
    }

    pub fn bytes_mut(&mut self, slot: Slot) -> Result<&mut [u8], MemoryError> {
        let err = self.out_of_bounds(slot);
        self.data.get_mut(slot.range()).ok_or(err)
    }

    /// Builds a read-only view over a bound slot.
    pub fn view<'s>(
        &'s self,
        desc: &'s TensorDesc,
        slot: Slot,
    ) -> Result<TensorView<'s>, MemoryError> {
        let bytes = self.bytes(slot)?;
        Ok(TensorView::new(desc, bytes)?)
    }

    /// Splits the arena into a read-only input and a writable output.
    ///
    /// # Errors
    /// [`MemoryError::InOutOverlap`] if the two slots share bytes.
    pub fn split_io(
        &mut self,
        input: Slot,
        output: Slot,
    ) -> Result<(&[u8], &mut [u8]), MemoryError> {
        if input.overlaps(&output) {
            return Err(MemoryError::InOutOverlap);
        }
        if input.end() > self.data.len() {
            return Err(self.out_of_bounds(input));
        }
        if output.end() > self.data.len() {
            return Err(self.out_of_bounds(output));
        }

        if input.end() <= output.offset {
            let (lo, hi) = self.data.split_at_mut(output.offset);
            Ok((&lo[input.range()], &mut hi[..output.len]))
        } else {
            let (lo, hi) = self.data.split_at_mut(input.offset);
            Ok((&hi[..input.len], &mut lo[output.range()]))
        }
    }

    /// Builds a mutable view over a bound slot.
    pub fn view_mut<'s>(
        &'s mut self,
        desc: &'s TensorDesc,
        slot: Slot,
    ) -> Result<TensorViewMut<'s>, MemoryError> {
        let bytes = self.bytes_mut(slot)?;
        Ok(TensorViewMut::new(desc, bytes)?)
    }
}
