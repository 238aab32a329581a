// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The game state machine.
//!
//! ```text
//! Intro ──► Play ──────────────────────────────► GameOver ──► Intro
//!           Init ─► AiMove ⇄ HumanMove           SetTimer
//!                                                WaitBeforeImage (2 s)
//!                                                ShowImage
//!                                                WaitBeforeMessage (3 s)
//!                                                ShowMessage
//!                                                WaitForButton
//! ```
//!
//! [`step`] is a pure transition: it consumes the state and one [`Tick`],
//! performs exactly one inner step and returns the next state with the
//! render commands it produced. Time only enters through `Tick::now_ms`, so
//! tests can drive any state without a wall clock.

use crate::board::{Board, Player, COLS};
use crate::policy::{choose_move, MovePolicy};
use crate::render::{diff, RenderCommand};
use crate::GameError;

/// Delay between the end of a game and the result screen.
pub const DELAY_BEFORE_RESULT_MS: u64 = 2000;
/// Delay between the result screen and the "press any button" prompt.
pub const DELAY_BEFORE_PROMPT_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Button {
    Left,
    Right,
    Ok,
    /// Any other key; only counts as "any button".
    Other,
}

/// One periodic tick, carrying the button pressed since the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub now_ms: u64,
    pub button: Option<Button>,
}

impl Tick {
    pub fn idle(now_ms: u64) -> Self {
        Self {
            now_ms,
            button: None,
        }
    }

    pub fn press(now_ms: u64, button: Button) -> Self {
        Self {
            now_ms,
            button: Some(button),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GameResult {
    HumanWon,
    AiWon,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPhase {
    Init,
    HumanMove,
    AiMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverPhase {
    SetTimer,
    WaitBeforeImage { since_ms: u64 },
    ShowImage,
    WaitBeforeMessage { since_ms: u64 },
    ShowMessage,
    WaitForButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Play(PlayPhase),
    GameOver { result: GameResult, phase: OverPhase },
}

/// A committed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Move {
    pub player: Player,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub phase: Phase,
    pub board: Board,
    /// Column under the human's cursor.
    pub cursor: usize,
    /// Moves of the current game in order.
    pub history: Vec<Move>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: Phase::Intro,
            board: Board::new(),
            cursor: 0,
            history: Vec::new(),
        }
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_human_turn(&self) -> bool {
        self.phase == Phase::Play(PlayPhase::HumanMove)
    }

    pub fn result(&self) -> Option<GameResult> {
        match self.phase {
            Phase::GameOver { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Result of the game on `board`, if it is over.
pub fn outcome(board: &Board) -> Option<GameResult> {
    if board.has_won(Player::Human) {
        Some(GameResult::HumanWon)
    } else if board.has_won(Player::Ai) {
        Some(GameResult::AiWon)
    } else if board.is_full() {
        Some(GameResult::Draw)
    } else {
        None
    }
}

/// First playable column at or after `start`, wrapping around.
fn next_valid(board: &Board, start: isize) -> Option<usize> {
    let start = start.rem_euclid(COLS as isize) as usize;
    (0..COLS)
        .map(|i| (start + i) % COLS)
        .find(|&c| board.is_valid(c))
}

/// Advances the game by one tick.
///
/// # Errors
/// [`GameError::NoLegalMove`] if a move is requested on a full board, or
/// an inference error from the policy. Both are fatal for the game.
pub fn step(
    mut state: GameState,
    tick: Tick,
    policy: &mut dyn MovePolicy,
) -> Result<(GameState, Vec<RenderCommand>), GameError> {
    let mut commands = Vec::new();

    state.phase = match state.phase {
        Phase::Intro => {
            tracing::info!("new game");
            state.board.reset();
            state.history.clear();
            state.cursor = 0;
            commands.extend([
                RenderCommand::Greeting,
                RenderCommand::ClearBoard,
                RenderCommand::BoardText,
            ]);
            Phase::Play(PlayPhase::Init)
        }

        Phase::Play(PlayPhase::Init) => {
            state.board.reset();
            commands.push(RenderCommand::ClearBoard);
            Phase::Play(PlayPhase::AiMove)
        }

        Phase::Play(PlayPhase::AiMove) => {
            let before = state.board.clone();
            let col = choose_move(policy, &state.board)?;
            state.board.make_move(col, Player::Ai)?;
            state.history.push(Move {
                player: Player::Ai,
                col,
            });
            commands.extend(diff(&before, &state.board));
            commands.push(RenderCommand::BoardText);
            finish_move(&state.board, Phase::Play(PlayPhase::HumanMove))
        }

        Phase::Play(PlayPhase::HumanMove) => {
            let before = state.board.clone();
            state.board.clear_premove();
            match tick.button {
                Some(Button::Ok) => {
                    let col = next_valid(&state.board, state.cursor as isize)
                        .ok_or(GameError::NoLegalMove)?;
                    state.board.make_move(col, Player::Human)?;
                    state.cursor = col;
                    state.history.push(Move {
                        player: Player::Human,
                        col,
                    });
                    tracing::debug!(col, "human move");
                    commands.extend(diff(&before, &state.board));
                    commands.push(RenderCommand::BoardText);
                    finish_move(&state.board, Phase::Play(PlayPhase::AiMove))
                }
                button => {
                    let target = match button {
                        Some(Button::Left) => state.cursor as isize - 1,
                        Some(Button::Right) => state.cursor as isize + 1,
                        _ => state.cursor as isize,
                    };
                    let col = next_valid(&state.board, target).ok_or(GameError::NoLegalMove)?;
                    state.cursor = col;
                    state.board.place_premove(col)?;
                    commands.extend(diff(&before, &state.board));
                    Phase::Play(PlayPhase::HumanMove)
                }
            }
        }

        Phase::GameOver { result, phase } => {
            let next = match phase {
                OverPhase::SetTimer => Some(OverPhase::WaitBeforeImage {
                    since_ms: tick.now_ms,
                }),
                OverPhase::WaitBeforeImage { since_ms } => (tick.now_ms.saturating_sub(since_ms)
                    >= DELAY_BEFORE_RESULT_MS)
                    .then_some(OverPhase::ShowImage),
                OverPhase::ShowImage => {
                    commands.push(RenderCommand::Result(result));
                    Some(OverPhase::WaitBeforeMessage {
                        since_ms: tick.now_ms,
                    })
                }
                OverPhase::WaitBeforeMessage { since_ms } => (tick.now_ms.saturating_sub(since_ms)
                    >= DELAY_BEFORE_PROMPT_MS)
                    .then_some(OverPhase::ShowMessage),
                OverPhase::ShowMessage => {
                    commands.push(RenderCommand::PressAnyButton);
                    Some(OverPhase::WaitForButton)
                }
                OverPhase::WaitForButton => {
                    if tick.button.is_some() {
                        None
                    } else {
                        Some(OverPhase::WaitForButton)
                    }
                }
            };
            match next {
                Some(phase) => Phase::GameOver { result, phase },
                None => Phase::Intro,
            }
        }
    };

    Ok((state, commands))
}

fn finish_move(board: &Board, otherwise: Phase) -> Phase {
    match outcome(board) {
        Some(result) => {
            tracing::info!(?result, "game over");
            Phase::GameOver {
                result,
                phase: OverPhase::SetTimer,
            }
        }
        None => otherwise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Cell, ROWS};

    /// Plays the listed columns in turn, falling back to the first legal one.
    struct Scripted {
        moves: Vec<usize>,
        at: usize,
    }

    impl Scripted {
        fn new(moves: &[usize]) -> Self {
            Self {
                moves: moves.to_vec(),
                at: 0,
            }
        }
    }

    impl MovePolicy for Scripted {
        fn scores(&mut self, _board: &Board) -> Result<[f32; COLS], GameError> {
            let mut s = [0.0; COLS];
            if let Some(&col) = self.moves.get(self.at) {
                s[col] = 1.0;
            }
            self.at += 1;
            Ok(s)
        }
    }

    fn run(
        state: GameState,
        ticks: &[Tick],
        policy: &mut dyn MovePolicy,
    ) -> (GameState, Vec<RenderCommand>) {
        let mut state = state;
        let mut all = Vec::new();
        for &t in ticks {
            let (next, cmds) = step(state, t, policy).unwrap();
            state = next;
            all.extend(cmds);
        }
        (state, all)
    }

    #[test]
    fn test_game_opens_with_ai_move() {
        let mut policy = Scripted::new(&[3]);
        let (state, cmds) = run(GameState::new(), &[Tick::idle(0); 3], &mut policy);
        assert!(state.is_human_turn());
        assert_eq!(state.board.cell(0, 3), Some(Cell::Ai));
        assert_eq!(cmds[0], RenderCommand::Greeting);
        assert!(cmds.contains(&RenderCommand::Cell {
            row: 0,
            col: 3,
            cell: Cell::Ai
        }));
    }

    #[test]
    fn test_cursor_wraps_and_skips_full_columns() {
        let mut policy = Scripted::new(&[]);
        let mut state = GameState {
            phase: Phase::Play(PlayPhase::HumanMove),
            ..GameState::new()
        };
        for _ in 0..ROWS {
            state.board.make_move(1, Player::Ai).unwrap();
        }

        let (state, cmds) = run(state, &[Tick::idle(0)], &mut policy);
        assert_eq!(state.cursor, 0);
        assert_eq!(
            cmds,
            vec![RenderCommand::Cell {
                row: 0,
                col: 0,
                cell: Cell::Premove
            }]
        );

        let (state, _) = run(state, &[Tick::press(1, Button::Right)], &mut policy);
        assert_eq!(state.cursor, 2);
        assert_eq!(state.board.cell(0, 2), Some(Cell::Premove));
        assert_eq!(state.board.cell(0, 0), Some(Cell::Empty));

        let (state, _) = run(
            state,
            &[Tick::press(2, Button::Left), Tick::press(3, Button::Left)],
            &mut policy,
        );
        // 2 → 1 (full, skipped forward to 2); 2 → 1 again
        assert_eq!(state.cursor, 2);

        let mut state = GameState {
            cursor: 0,
            ..state
        };
        state.board.clear_premove();
        let (state, _) = run(state, &[Tick::press(4, Button::Left)], &mut policy);
        assert_eq!(state.cursor, COLS - 1);
    }

    #[test]
    fn test_ok_commits_and_clears_cursor() {
        let mut policy = Scripted::new(&[]);
        let state = GameState {
            phase: Phase::Play(PlayPhase::HumanMove),
            cursor: 4,
            ..GameState::new()
        };
        let (state, cmds) = run(
            state,
            &[Tick::idle(0), Tick::press(1, Button::Ok)],
            &mut policy,
        );
        assert_eq!(state.phase, Phase::Play(PlayPhase::AiMove));
        assert_eq!(state.board.cell(0, 4), Some(Cell::Human));
        assert!(state.board.iter().all(|(_, _, c)| c != Cell::Premove));
        assert_eq!(state.history, vec![Move { player: Player::Human, col: 4 }]);
        assert!(cmds.ends_with(&[
            RenderCommand::Cell {
                row: 0,
                col: 4,
                cell: Cell::Human
            },
            RenderCommand::BoardText
        ]));
    }

    #[test]
    fn test_game_over_timing() {
        let mut policy = Scripted::new(&[]);
        let state = GameState {
            phase: Phase::GameOver {
                result: GameResult::Draw,
                phase: OverPhase::SetTimer,
            },
            ..GameState::new()
        };
        let (state, _) = run(state, &[Tick::idle(1000)], &mut policy);
        let (state, cmds) = run(state, &[Tick::idle(2999)], &mut policy);
        assert!(cmds.is_empty());
        assert!(matches!(
            state.phase,
            Phase::GameOver {
                phase: OverPhase::WaitBeforeImage { since_ms: 1000 },
                ..
            }
        ));
        let (state, cmds) = run(state, &[Tick::idle(3000), Tick::idle(3010)], &mut policy);
        assert_eq!(cmds, vec![RenderCommand::Result(GameResult::Draw)]);
        let (state, cmds) = run(state, &[Tick::press(6009, Button::Ok)], &mut policy);
        assert!(cmds.is_empty());
        let (state, cmds) = run(
            state,
            &[Tick::idle(6010), Tick::idle(6011), Tick::idle(9000)],
            &mut policy,
        );
        assert_eq!(cmds, vec![RenderCommand::PressAnyButton]);
        assert!(state.result().is_some());
        let (state, _) = run(state, &[Tick::press(9001, Button::Other)], &mut policy);
        assert_eq!(state.phase, Phase::Intro);
    }

    #[test]
    fn test_human_win_ends_game() {
        let mut policy = Scripted::new(&[6, 5, 6, 5]);
        let mut state = GameState::new();
        let mut t = 0;
        while state.result().is_none() {
            let tick = if state.is_human_turn() {
                Tick::press(t, Button::Ok)
            } else {
                Tick::idle(t)
            };
            let (next, _) = step(state, tick, &mut policy).unwrap();
            state = next;
            t += 10;
        }
        assert_eq!(state.result(), Some(GameResult::HumanWon));
        let humans = state
            .history
            .iter()
            .filter(|m| m.player == Player::Human)
            .count();
        assert_eq!(humans, 4);
    }

    #[test]
    fn test_ai_move_on_full_board_is_fatal() {
        let mut board = Board::new();
        for col in 0..COLS {
            for row in 0..ROWS {
                let p = if (row + col / 2) % 2 == 0 { Player::Ai } else { Player::Human };
                board.make_move(col, p).unwrap();
            }
        }
        let state = GameState {
            phase: Phase::Play(PlayPhase::AiMove),
            board,
            ..GameState::new()
        };
        let err = step(state, Tick::idle(0), &mut Scripted::new(&[0])).unwrap_err();
        assert!(matches!(err, GameError::NoLegalMove));
    }

    #[test]
    fn test_outcome_draw() {
        let mut board = Board::new();
        for col in 0..COLS {
            for row in 0..ROWS {
                let p = if (row + col / 2) % 2 == 0 { Player::Ai } else { Player::Human };
                board.make_move(col, p).unwrap();
            }
        }
        assert!(!board.has_won(Player::Ai));
        assert!(!board.has_won(Player::Human));
        assert_eq!(outcome(&board), Some(GameResult::Draw));
    }
}
