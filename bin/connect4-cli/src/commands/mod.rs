// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the bootstrap shared between them.

pub mod compile;
pub mod inspect;
pub mod perf;
pub mod play;
pub mod validate;

use anyhow::Context;
use model_ir::{builtin, image, LoadMode};
use runtime::{ImageSource, Network, Ready, RuntimeConfig};
use std::ops::Deref;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Defaults, overridden by the TOML file at `path` when given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let config = RuntimeConfig::from_toml(&text)
        .with_context(|| format!("invalid config '{}'", path.display()))?;
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Image bytes: the built-in network or a memory-mapped file.
pub enum ImageBytes {
    Builtin(Vec<u8>),
    Mapped(memmap2::Mmap),
}

impl Deref for ImageBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ImageBytes::Builtin(bytes) => bytes,
            ImageBytes::Mapped(map) => map,
        }
    }
}

/// Caller-owned memory for one network instance: the image, the copy
/// region (copy mode only) and the activation arena.
pub struct Memory {
    config: RuntimeConfig,
    image: ImageBytes,
    region: Vec<u8>,
    activations: Vec<u8>,
}

impl Memory {
    pub fn allocate(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let image = match &config.image_path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("failed to open image '{}'", path.display()))?;
                // SAFETY: the file is opened read-only and the mapping is only read.
                let map = unsafe { memmap2::Mmap::map(&file) }
                    .with_context(|| format!("failed to map image '{}'", path.display()))?;
                ImageBytes::Mapped(map)
            }
            None => ImageBytes::Builtin(builtin::connect4_image()?),
        };
        let region = vec![0u8; image::required_region(config.load_mode, image.len())];
        let activations = vec![0u8; config.activation_budget.as_bytes()];
        tracing::debug!(
            image = image.len(),
            region = region.len(),
            activations = activations.len(),
            "memory allocated"
        );
        Ok(Self {
            config: config.clone(),
            image,
            region,
            activations,
        })
    }

    /// Creates and initialises the network over this memory.
    ///
    /// Failures are logged with the operation name and error code.
    pub fn open(&mut self) -> anyhow::Result<Network<'_, Ready>> {
        let source = match self.config.load_mode {
            LoadMode::Xip => ImageSource::Xip(&self.image),
            LoadMode::Copy => ImageSource::Copy {
                image: &self.image,
                region: &mut self.region,
            },
        };
        let created = Network::create(source, self.config.check_crc).map_err(|e| {
            tracing::error!("{}", e.diagnostic("create"));
            anyhow::Error::new(e).context("network creation failed")
        })?;
        let ready = created.init(&mut self.activations).map_err(|e| {
            tracing::error!("{}", e.diagnostic("init"));
            anyhow::Error::new(e).context("network initialisation failed")
        })?;
        Ok(ready)
    }
}
