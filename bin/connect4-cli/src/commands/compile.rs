// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connect4 compile` command: build a network image from a JSON manifest
//! and a weights blob, or write out the built-in network.

use anyhow::Context;
use model_ir::{builtin, ModelManifest, NetworkImage};
use std::path::PathBuf;

pub async fn execute(
    manifest: Option<PathBuf>,
    weights: Option<PathBuf>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let (manifest, weights) = match (manifest, weights) {
        (Some(m), Some(w)) => {
            let manifest = ModelManifest::from_file(&m)
                .with_context(|| format!("failed to load manifest '{}'", m.display()))?;
            let weights = std::fs::read(&w)
                .with_context(|| format!("failed to read weights '{}'", w.display()))?;
            (manifest, weights)
        }
        (None, None) => (builtin::connect4_manifest(), builtin::connect4_weights()),
        (None, Some(_)) => anyhow::bail!("--weights needs a --manifest"),
        (Some(_), None) => anyhow::bail!("--manifest needs --weights"),
    };

    let bytes = manifest.compile(&weights)?;
    let image = NetworkImage::parse(&bytes, true)?;
    std::fs::write(&output, &bytes)
        .with_context(|| format!("failed to write image '{}'", output.display()))?;

    println!("{}", image.graph.summary());
    println!("  written {} bytes to {}", bytes.len(), output.display());
    Ok(())
}
