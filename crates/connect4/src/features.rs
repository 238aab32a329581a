// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Board → network input encoding.
//!
//! ```text
//!   0..126   one-hot per cell, row-major from the bottom row: [empty, AI, human]
//! 126..133   column is playable
//! 133..140   human would win by playing the column
//! 140..147   AI would win by playing the column
//! ```

use crate::board::{Board, Cell, Player, COLS};

pub const FEATURES: usize = 147;
pub const BOARD_BITS: usize = 0;
pub const VALID_BITS: usize = 126;
pub const BLOCK_BITS: usize = 133;
pub const WIN_BITS: usize = 140;

/// The 147-element input vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features([i8; FEATURES]);

impl Features {
    pub fn encode(board: &Board) -> Self {
        let mut v = [0i8; FEATURES];
        for (i, (_, _, cell)) in board.iter().enumerate() {
            let hot = match cell {
                Cell::Empty | Cell::Premove => 0,
                Cell::Ai => 1,
                Cell::Human => 2,
            };
            v[BOARD_BITS + i * 3 + hot] = 1;
        }
        for col in 0..COLS {
            v[VALID_BITS + col] = i8::from(board.is_valid(col));
            v[BLOCK_BITS + col] = i8::from(board.wins_with(col, Player::Human));
            v[WIN_BITS + col] = i8::from(board.wins_with(col, Player::Ai));
        }
        Self(v)
    }

    pub fn as_slice(&self) -> &[i8] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<i8> {
        self.0.get(index).copied()
    }

    /// Writes the features as little-endian `f32`s into `buf`, which must
    /// hold `FEATURES * 4` bytes.
    pub fn write_f32_le(&self, buf: &mut [u8]) {
        for (chunk, &v) in buf.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&f32::from(v).to_le_bytes());
        }
    }
}
