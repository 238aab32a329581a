// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # connect4
//!
//! The game driven by the inference runtime.
//!
//! # Key Components
//!
//! - [`Board`]: the 6×7 grid with gravity, legality, win and draw checks.
//! - [`Features`]: the 147-element network input derived from a board.
//! - [`MovePolicy`] / [`NetworkPolicy`]: column scoring, with
//!   [`select_move`] picking the best legal column.
//! - [`step`]: the game state machine as a pure transition over
//!   [`GameState`], emitting [`RenderCommand`]s.
//!
//! # Data Flow
//! ```text
//! Board ──► Features ──► Network::run ──► 7 scores ──► select_move ──► Board
//! ```

pub mod board;
mod error;
pub mod features;
pub mod machine;
pub mod policy;
pub mod render;

pub use board::{Board, Cell, Player, COLS, ROWS};
pub use error::GameError;
pub use features::{Features, FEATURES};
pub use machine::{step, Button, GameResult, GameState, Move, Phase, Tick};
pub use policy::{choose_move, select_move, MovePolicy, NetworkPolicy};
pub use render::RenderCommand;
