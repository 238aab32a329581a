// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! AI move selection.
//!
//! A [`MovePolicy`] scores the seven columns; [`select_move`] picks the best
//! legal one. The network-backed policy encodes the board, runs inference and
//! reads one score per column from the output tensor.

use crate::board::{Board, COLS};
use crate::features::{Features, FEATURES};
use crate::GameError;
use runtime::{Network, Ready};

/// Scores every column for the AI.
pub trait MovePolicy {
    fn scores(&mut self, board: &Board) -> Result<[f32; COLS], GameError>;
}

/// Highest-scoring legal column; ties go to the lowest index.
///
/// # Errors
/// [`GameError::NoLegalMove`] if every column is full.
pub fn select_move(scores: &[f32; COLS], board: &Board) -> Result<usize, GameError> {
    let mut best: Option<(usize, f32)> = None;
    for col in board.legal_columns() {
        let score = scores[col];
        if best.map_or(true, |(_, s)| score > s || (s.is_nan() && !score.is_nan())) {
            best = Some((col, score));
        }
    }
    match best {
        Some((col, _)) => Ok(col),
        None => {
            tracing::error!("could not find any valid move");
            Err(GameError::NoLegalMove)
        }
    }
}

/// Scores the board with `policy` and returns the selected column.
pub fn choose_move(policy: &mut dyn MovePolicy, board: &Board) -> Result<usize, GameError> {
    let scores = policy.scores(board)?;
    let col = select_move(&scores, board)?;
    tracing::debug!(?scores, col, "AI move selected");
    Ok(col)
}

/// Policy backed by the inference runtime.
pub struct NetworkPolicy<'n, 'a> {
    network: &'n mut Network<'a, Ready>,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl<'n, 'a> NetworkPolicy<'n, 'a> {
    /// # Errors
    /// [`GameError::ScoreCount`] if the network's I/O does not match the
    /// feature vector and the seven columns.
    pub fn new(network: &'n mut Network<'a, Ready>) -> Result<Self, GameError> {
        let report = network.report();
        let inputs = report.input.num_elements();
        if inputs != FEATURES {
            return Err(GameError::ScoreCount {
                expected: FEATURES,
                actual: inputs,
            });
        }
        let outputs = report.output.num_elements();
        if outputs != COLS {
            return Err(GameError::ScoreCount {
                expected: COLS,
                actual: outputs,
            });
        }
        Ok(Self {
            network,
            input: vec![0u8; report.input.size_bytes()],
            output: vec![0u8; report.output.size_bytes()],
        })
    }

    pub fn network(&self) -> &Network<'a, Ready> {
        &*self.network
    }
}

impl MovePolicy for NetworkPolicy<'_, '_> {
    fn scores(&mut self, board: &Board) -> Result<[f32; COLS], GameError> {
        Features::encode(board).write_f32_le(&mut self.input);
        let batch = self.network.run(&self.input, &mut self.output)?;
        if batch != 1 {
            return Err(GameError::ScoreCount {
                expected: 1,
                actual: batch,
            });
        }
        let mut scores = [0f32; COLS];
        for (s, chunk) in scores.iter_mut().zip(self.output.chunks_exact(4)) {
            *s = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(scores)
    }
}
