// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connect4 perf` command: the system performance harness.
//!
//! Runs the network on seeded random inputs and prints the mean duration,
//! cycles per MACC, activation usage and the per-node table.

use super::Memory;
use runtime::{run_perf, MonotonicClock, PerfOptions, ReferenceKernels, RuntimeConfig};

pub async fn execute(
    config: RuntimeConfig,
    profiling: bool,
    iterations: Option<usize>,
    no_observer: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut options = PerfOptions::from_config(&config, profiling);
    if let Some(n) = iterations {
        anyhow::ensure!(n > 0, "iterations must be at least 1");
        options.iterations = n;
    }
    if no_observer {
        options.observer = false;
    }

    let mut memory = Memory::allocate(&config)?;
    let mut network = memory.open()?;

    if !json {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║          connect4 · System Performance               ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("{}", network.report().summary());
        println!();
    }

    let report = run_perf(&mut network, &ReferenceKernels, MonotonicClock::new(), &options)
        .map_err(|e| {
            tracing::error!("{}", e.diagnostic("run"));
            anyhow::Error::new(e).context("performance run failed")
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    network.destroy();
    Ok(())
}
