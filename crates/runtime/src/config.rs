// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration.
//!
//! [`RuntimeConfig::default`] is the build-time configuration of the game
//! console. Host tools may override it from TOML; the library itself never
//! reads files.
//!
//! # TOML Format
//! ```toml
//! load_mode = "xip"
//! activation_budget = "988"
//! check_crc = true
//! observer = true
//! iterations = 16
//! profiling_factor = 5
//! seed = 3
//! image_path = "./connect4.c4nn"
//! ```

use crate::RuntimeError;
use memory_manager::MemoryBudget;
use model_ir::{builtin, LoadMode};
use std::path::PathBuf;

/// Configuration for loading and exercising a network.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Execute the image in place or copy it into a caller region first.
    pub load_mode: LoadMode,
    /// Size of the activation arena handed to `init`.
    pub activation_budget: MemoryBudget,
    /// Verify the image checksum at load time.
    pub check_crc: bool,
    /// Register the profiling observer in the performance harness.
    pub observer: bool,
    /// Performance harness iterations.
    pub iterations: usize,
    /// Iteration multiplier in profiling mode.
    pub profiling_factor: usize,
    /// Seed for randomized harness inputs.
    pub seed: u64,
    /// Compiled image to load instead of the built-in network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            load_mode: LoadMode::Xip,
            activation_budget: MemoryBudget::from_bytes(builtin::ACTIVATIONS_SIZE),
            check_crc: true,
            observer: true,
            iterations: 16,
            profiling_factor: 5,
            seed: 3,
            image_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Parses configuration from a TOML string. Missing keys keep their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.iterations == 0 {
            return Err(RuntimeError::Config("iterations must be at least 1".into()));
        }
        if self.profiling_factor == 0 {
            return Err(RuntimeError::Config(
                "profiling_factor must be at least 1".into(),
            ));
        }
        if self.iterations.checked_mul(self.profiling_factor).is_none() {
            return Err(RuntimeError::Config(format!(
                "{} iterations x {} overflows the profiling run count",
                self.iterations, self.profiling_factor
            )));
        }
        Ok(())
    }
}
