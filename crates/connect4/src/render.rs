// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Abstract render commands.
//!
//! The game never draws pixels. It emits which cell changed to which logical
//! category and which screen to show; a front end maps these to its display.

use crate::board::{Board, Cell};
use crate::machine::GameResult;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum RenderCommand {
    /// Greeting shown when a new game starts.
    Greeting,
    /// Draw the empty board.
    ClearBoard,
    /// One cell changed.
    Cell { row: usize, col: usize, cell: Cell },
    /// Dump the board as text (see the `Display` impl on [`Board`]).
    BoardText,
    /// Show the result screen.
    Result(GameResult),
    /// Show the "press any button" prompt.
    PressAnyButton,
}

/// Cell commands turning `before` into `after`, bottom row first.
pub fn diff(before: &Board, after: &Board) -> Vec<RenderCommand> {
    before
        .iter()
        .zip(after.iter())
        .filter(|((_, _, a), (_, _, b))| a != b)
        .map(|(_, (row, col, cell))| RenderCommand::Cell { row, col, cell })
        .collect()
}
