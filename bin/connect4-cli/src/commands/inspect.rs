// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connect4 inspect` command: display the network report, the node table
//! and the activation arena map.

use super::Memory;
use memory_manager::ArenaKind;
use runtime::{NodeInfo, RuntimeConfig};

pub async fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            connect4 · Network Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut memory = Memory::allocate(&config)?;
    let network = memory.open()?;
    let graph = network.graph();

    // ── Summary ────────────────────────────────────────────────
    println!("{}", network.report().summary());
    println!();

    // ── Nodes ──────────────────────────────────────────────────
    println!("  {:<5} {:<10} {:<5} {:<12} Detail", "c_id", "Type", "Id", "Name");
    println!("  {}", "-".repeat(72));
    let mut cursor = NodeInfo::default();
    while network.node_info(&mut cursor) {
        let detail = graph
            .layer(cursor.index)
            .map(|l| l.summary(&graph.tensors))
            .unwrap_or_default();
        println!(
            "  {:<5} {:<10} {:<5} {:<12} {}",
            cursor.index,
            cursor.layer_type.map_or("?", |t| t.as_str()),
            cursor.id,
            truncate(&cursor.name, 12),
            detail,
        );
        cursor.index += 1;
    }
    println!();

    // ── Activation Map ─────────────────────────────────────────
    println!("  Activation arena ({} bytes)", graph.activations_size);
    println!("  {:<14} {:>7} {:>7}   live", "Tensor", "Offset", "Bytes");
    println!("  {}", "-".repeat(40));
    for range in graph.live_ranges() {
        if range.slot.kind != ArenaKind::Activations {
            continue;
        }
        let name = graph
            .tensor(range.tensor)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!(
            "  {:<14} {:>7} {:>7}   [{}, {}]",
            truncate(name, 14),
            range.slot.offset,
            range.slot.len,
            range.first,
            range.last,
        );
    }
    println!();

    network.destroy();
    Ok(())
}

/// Truncates a string to `max_len` with ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}
