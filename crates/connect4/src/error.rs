// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the game logic.

/// Errors raised by board operations, move selection and the state machine.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The AI was asked to move with no playable column. Callers check for a
    /// draw first, so this indicates a broken invariant and is fatal.
    #[error("no legal move available")]
    NoLegalMove,

    /// A piece was dropped into a full column.
    #[error("column {0} is full")]
    ColumnFull(usize),

    /// A move was taken back from a column holding no pieces.
    #[error("column {0} is empty")]
    ColumnEmpty(usize),

    /// A column index outside the board.
    #[error("column {0} is outside the board")]
    ColumnOutOfRange(usize),

    /// The network returned something other than one score per column.
    #[error("network produced {actual} scores, expected {expected}")]
    ScoreCount { expected: usize, actual: usize },

    /// Inference failed.
    #[error(transparent)]
    Inference(#[from] runtime::RuntimeError),
}
