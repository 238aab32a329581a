// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Complete games against the built-in network with scripted input.

use connect4::{
    step, Board, Button, GameResult, GameState, Move, NetworkPolicy, Phase, Player,
    RenderCommand, Tick,
};
use model_ir::builtin;
use runtime::{ImageSource, Network};

const TICK_MS: u64 = 10;

/// Plays one game. `human` maps the board to the keys pressed on each turn,
/// the last of which should be `Ok`.
fn play(human: impl Fn(&Board) -> Vec<Button>) -> (GameState, Vec<RenderCommand>) {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let mut policy = NetworkPolicy::new(&mut net).unwrap();

    let mut state = GameState::new();
    let mut commands = Vec::new();
    let mut now = 0;
    let mut pending: Vec<Button> = Vec::new();
    while state.result().is_none() {
        let tick = if state.is_human_turn() {
            if pending.is_empty() {
                pending = human(&state.board);
                pending.reverse();
            }
            match pending.pop() {
                Some(b) => Tick::press(now, b),
                None => Tick::idle(now),
            }
        } else {
            Tick::idle(now)
        };
        let (next, cmds) = step(state, tick, &mut policy).unwrap();
        state = next;
        commands.extend(cmds);
        now += TICK_MS;
        assert!(now < 100_000, "game did not finish");
    }
    (state, commands)
}

#[test]
fn test_ai_wins_against_a_passive_human() {
    let (state, commands) = play(|_| vec![Button::Ok]);
    assert_eq!(state.result(), Some(GameResult::AiWon));
    assert_eq!(
        state.history,
        vec![
            Move { player: Player::Ai, col: 3 },
            Move { player: Player::Human, col: 0 },
            Move { player: Player::Ai, col: 3 },
            Move { player: Player::Human, col: 0 },
            Move { player: Player::Ai, col: 3 },
            Move { player: Player::Human, col: 0 },
            Move { player: Player::Ai, col: 3 },
        ]
    );
    assert_eq!(commands.iter().filter(|c| **c == RenderCommand::BoardText).count(), 8);
}

#[test]
fn test_cursor_navigation_commits_selected_column() {
    // human walks the cursor five columns right before committing
    let (state, _) = play(|_| {
        let mut keys = vec![Button::Right; 5];
        keys.push(Button::Ok);
        keys
    });
    let first_human = state
        .history
        .iter()
        .position(|m| m.player == Player::Human)
        .unwrap();
    assert_eq!(state.history[first_human].col, 5);
    assert!(state.result().is_some());
}

#[test]
fn test_replay_is_deterministic() {
    let keys = |board: &Board| {
        // one Right press per piece of the opponent in the bottom row
        let target = (0..connect4::COLS)
            .filter(|&c| board.cell(0, c) == Some(connect4::Cell::Ai))
            .count();
        let mut keys = vec![Button::Right; target];
        keys.push(Button::Ok);
        keys
    };
    let (a, ca) = play(keys);
    let (b, cb) = play(keys);
    assert_eq!(a.history, b.history);
    assert_eq!(a.board, b.board);
    assert_eq!(ca, cb);
}

#[test]
fn test_game_over_returns_to_intro() {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let mut policy = NetworkPolicy::new(&mut net).unwrap();

    let mut state = GameState {
        phase: Phase::GameOver {
            result: GameResult::HumanWon,
            phase: connect4::machine::OverPhase::SetTimer,
        },
        ..GameState::new()
    };
    let mut shown = Vec::new();
    let mut now = 0;
    while state.phase != Phase::Intro {
        let tick = if shown.contains(&RenderCommand::PressAnyButton) {
            Tick::press(now, Button::Left)
        } else {
            Tick::idle(now)
        };
        let (next, cmds) = step(state, tick, &mut policy).unwrap();
        state = next;
        shown.extend(cmds);
        now += TICK_MS;
    }
    assert_eq!(
        shown,
        vec![
            RenderCommand::Result(GameResult::HumanWon),
            RenderCommand::PressAnyButton
        ]
    );
    assert!(now >= 5000);

    let (state, cmds) = step(state, Tick::idle(now), &mut policy).unwrap();
    assert_eq!(state.phase, Phase::Play(connect4::machine::PlayPhase::Init));
    assert_eq!(cmds[0], RenderCommand::Greeting);
}
