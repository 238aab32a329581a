// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connect4 play` command: a terminal game on a periodic tick.
//!
//! Each line on stdin is one button press: `a`/`h` left, `d`/`l` right,
//! an empty line or `s` confirms, `q` quits, anything else counts as "any
//! button". The state machine advances once per tick.

use super::Memory;
use connect4::machine::OverPhase;
use connect4::{
    step, Button, Cell, GameError, GameState, NetworkPolicy, Phase, RenderCommand, Tick,
};
use runtime::RuntimeConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration, Instant};

enum Key {
    Button(Button),
    Quit,
}

fn parse_key(line: &str) -> Key {
    match line.trim() {
        "" | "s" | "ok" => Key::Button(Button::Ok),
        "a" | "h" | "left" => Key::Button(Button::Left),
        "d" | "l" | "right" => Key::Button(Button::Right),
        "q" | "quit" => Key::Quit,
        _ => Key::Button(Button::Other),
    }
}

pub async fn execute(config: RuntimeConfig, tick_ms: u64) -> anyhow::Result<()> {
    let mut memory = Memory::allocate(&config)?;
    let mut network = memory.open()?;
    let mut policy = NetworkPolicy::new(&mut network)?;

    println!("Keys: a = left, d = right, Enter = drop, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(Duration::from_millis(tick_ms.max(1)));
    let started = Instant::now();
    let mut state = GameState::new();
    let mut pending: Option<Button> = None;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open && pending.is_none() => {
                match line? {
                    Some(line) => match parse_key(&line) {
                        Key::Button(b) => pending = Some(b),
                        Key::Quit => break,
                    },
                    None => stdin_open = false,
                }
            }
            _ = ticker.tick() => {
                let tick = Tick {
                    now_ms: started.elapsed().as_millis() as u64,
                    button: pending.take(),
                };
                let (next, commands) = match step(state, tick, &mut policy) {
                    Ok(v) => v,
                    Err(e @ GameError::NoLegalMove) => {
                        tracing::error!(error = %e, "game halted");
                        return Err(e.into());
                    }
                    Err(e) => return Err(e.into()),
                };
                state = next;
                present(&state, &commands);
                if !stdin_open && waits_for_input(&state) {
                    tracing::info!("input closed, leaving the game");
                    break;
                }
            }
        }
    }
    Ok(())
}

fn waits_for_input(state: &GameState) -> bool {
    state.is_human_turn()
        || matches!(
            state.phase,
            Phase::GameOver {
                phase: OverPhase::WaitForButton,
                ..
            }
        )
}

fn present(state: &GameState, commands: &[RenderCommand]) {
    let mut board_shown = false;
    for cmd in commands {
        match cmd {
            RenderCommand::Greeting => println!("Hello. Let's play a game"),
            RenderCommand::ClearBoard => {}
            RenderCommand::BoardText => {
                println!("{}\n", state.board);
                board_shown = true;
            }
            RenderCommand::Cell {
                cell: Cell::Premove,
                col,
                ..
            } if !board_shown => {
                println!("{}\ncursor on column {}\n", state.board, col + 1);
                board_shown = true;
            }
            RenderCommand::Cell { .. } => {}
            RenderCommand::Result(result) => println!("Game over: {result:?}"),
            RenderCommand::PressAnyButton => println!("Press any button to play again (q quits)"),
        }
    }
}
