// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connect4 validate` command: serve the validation protocol on stdio.
//!
//! stdout carries protocol frames only; logs go to stderr.

use super::Memory;
use runtime::{MonotonicClock, RuntimeConfig, ValidationServer};

pub async fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    let mut memory = Memory::allocate(&config)?;
    let mut network = memory.open()?;

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    let mut server = ValidationServer::new(stdin, stdout, MonotonicClock::new());
    let handled = server.serve(&mut network)?;
    tracing::info!(requests = handled, "validation finished");

    network.destroy();
    Ok(())
}
