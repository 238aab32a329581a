// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The 6×7 board and its rules.
//!
//! Row 0 is the bottom row; pieces stack upward. A premove cell is a cursor
//! marker only: legality, win, draw and encoding all treat it as empty.

use crate::GameError;
use std::fmt;

pub const ROWS: usize = 6;
pub const COLS: usize = 7;

/// Contents of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum Cell {
    #[default]
    Empty,
    Ai,
    Human,
    Premove,
}

impl Cell {
    /// Numeric code used by the text render.
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Ai => 1,
            Cell::Human => 2,
            Cell::Premove => 3,
        }
    }

    /// Empty or holding only the cursor marker.
    pub fn is_vacant(self) -> bool {
        matches!(self, Cell::Empty | Cell::Premove)
    }
}

/// One of the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Player {
    Ai,
    Human,
}

impl Player {
    pub fn cell(self) -> Cell {
        match self {
            Player::Ai => Cell::Ai,
            Player::Human => Cell::Human,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::Ai => Player::Human,
            Player::Human => Player::Ai,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Ai => write!(f, "AI"),
            Player::Human => write!(f, "human"),
        }
    }
}

/// Line directions checked for four in a row: (row step, column step).
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (-1, 1)];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Cell at `row` (0 = bottom) and `col`, or `None` outside the board.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    fn at(&self, row: isize, col: isize) -> Option<Cell> {
        if row < 0 || col < 0 {
            return None;
        }
        self.cell(row as usize, col as usize)
    }

    /// A column is playable iff its top cell is vacant.
    pub fn is_valid(&self, col: usize) -> bool {
        col < COLS && self.cells[ROWS - 1][col].is_vacant()
    }

    /// Playable columns in ascending order.
    pub fn legal_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(|&c| self.is_valid(c))
    }

    /// Lowest vacant row of `col`.
    fn landing_row(&self, col: usize) -> Option<usize> {
        (0..ROWS).find(|&r| self.cells[r][col].is_vacant())
    }

    /// Drops a piece for `player` into `col`. Returns the row it landed on.
    pub fn make_move(&mut self, col: usize, player: Player) -> Result<usize, GameError> {
        self.drop_cell(col, player.cell())
    }

    fn drop_cell(&mut self, col: usize, cell: Cell) -> Result<usize, GameError> {
        if col >= COLS {
            return Err(GameError::ColumnOutOfRange(col));
        }
        let row = self.landing_row(col).ok_or(GameError::ColumnFull(col))?;
        self.cells[row][col] = cell;
        Ok(row)
    }

    /// Removes the topmost piece of `col`, inverting [`Board::make_move`].
    pub fn subtract_move(&mut self, col: usize) -> Result<usize, GameError> {
        if col >= COLS {
            return Err(GameError::ColumnOutOfRange(col));
        }
        let row = (0..ROWS)
            .rev()
            .find(|&r| !self.cells[r][col].is_vacant())
            .ok_or(GameError::ColumnEmpty(col))?;
        self.cells[row][col] = Cell::Empty;
        Ok(row)
    }

    /// Places the cursor marker on the landing cell of `col`.
    pub fn place_premove(&mut self, col: usize) -> Result<usize, GameError> {
        self.clear_premove();
        self.drop_cell(col, Cell::Premove)
    }

    /// Removes every cursor marker.
    pub fn clear_premove(&mut self) {
        for cell in self.cells.iter_mut().flatten() {
            if *cell == Cell::Premove {
                *cell = Cell::Empty;
            }
        }
    }

    /// Four consecutive cells owned by `player` in any direction.
    pub fn has_won(&self, player: Player) -> bool {
        let target = player.cell();
        for row in 0..ROWS as isize {
            for col in 0..COLS as isize {
                for (dr, dc) in DIRECTIONS {
                    if (0..4).all(|k| self.at(row + k * dr, col + k * dc) == Some(target)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Whether `player` would win by playing `col` now.
    pub fn wins_with(&self, col: usize, player: Player) -> bool {
        if !self.is_valid(col) {
            return false;
        }
        let mut probe = self.clone();
        probe.clear_premove();
        probe.make_move(col, player).is_ok() && probe.has_won(player)
    }

    /// No playable column remains.
    pub fn is_full(&self) -> bool {
        self.legal_columns().next().is_none()
    }

    /// Pieces on the board, ignoring the cursor.
    pub fn pieces(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| matches!(c, Cell::Ai | Cell::Human))
            .count()
    }

    /// Cells in row-major order, bottom row first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, &cell)| (r, c, cell)))
    }
}

/// Text render: top row first, cells separated by `|`, column numbers below.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.iter().rev() {
            write!(f, "|")?;
            for cell in row {
                match cell {
                    Cell::Empty => write!(f, " |")?,
                    other => write!(f, "{}|", other.code())?,
                }
            }
            writeln!(f)?;
        }
        write!(f, " 1 2 3 4 5 6 7")
    }
}
