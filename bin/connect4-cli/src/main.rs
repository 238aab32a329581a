// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # connect4
//!
//! Command-line front end for the Connect-4 inference runtime.
//!
//! ## Usage
//! ```bash
//! # Play against the network in the terminal
//! connect4 play
//!
//! # System performance harness
//! connect4 perf --profiling --iterations 32
//!
//! # Network report and node table
//! connect4 inspect
//!
//! # Serve the validation protocol over stdin/stdout
//! connect4 validate
//!
//! # Compile a manifest and weights into a network image
//! connect4 compile --manifest net.json --weights net.bin -o net.c4nn
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "connect4",
    about = "Connect-4 against an on-device neural network, with its inference runtime tools",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (overrides the built-in defaults).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network image to load instead of the built-in network.
    #[arg(short, long, global = true)]
    image: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game in the terminal.
    Play {
        /// Tick period in milliseconds.
        #[arg(long, default_value_t = 20)]
        tick_ms: u64,
    },

    /// Run the system performance harness with random inputs.
    Perf {
        /// Multiply the iteration count by the profiling factor.
        #[arg(long)]
        profiling: bool,

        /// Override the configured iteration count.
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Skip the per-node observer.
        #[arg(long)]
        no_observer: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the network report, node table and activation map.
    Inspect,

    /// Serve the validation protocol over stdin/stdout.
    Validate,

    /// Compile a manifest and weights blob into a network image.
    Compile {
        /// JSON manifest; the built-in network when omitted.
        #[arg(short, long, requires = "weights")]
        manifest: Option<PathBuf>,

        /// Raw little-endian weights blob.
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Output image path.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the game and the protocol.
    commands::init_tracing(cli.verbose);

    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(image) = cli.image {
        config.image_path = Some(image);
    }

    match cli.command {
        Commands::Play { tick_ms } => commands::play::execute(config, tick_ms).await,
        Commands::Perf {
            profiling,
            iterations,
            no_observer,
            json,
        } => commands::perf::execute(config, profiling, iterations, no_observer, json).await,
        Commands::Inspect => commands::inspect::execute(config).await,
        Commands::Validate => commands::validate::execute(config).await,
        Commands::Compile {
            manifest,
            weights,
            output,
        } => commands::compile::execute(manifest, weights, output).await,
    }
}
