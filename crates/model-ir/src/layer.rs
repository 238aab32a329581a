// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer and tensor declarations.
//!
//! A network is described by two flat tables: the tensors (each with a role
//! and a fixed offset inside its arena) and the layers, which refer to
//! tensors by their index in the first table. Neither table holds data.

use memory_manager::ArenaKind;
use tensor_core::TensorDesc;

/// The kind of computation a layer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Fully connected: `y = x @ W + b`.
    Dense,
    /// Element-wise `max(0, x)`.
    Relu,
}

impl LayerType {
    /// Parses a layer type from a manifest string.
    ///
    /// Accepts the canonical names and common aliases (`"gemm"`, `"fc"`,
    /// `"linear"`, `"nl"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dense" | "gemm" | "fc" | "linear" => Some(Self::Dense),
            "relu" | "nl" => Some(Self::Relu),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "Dense",
            Self::Relu => "NL",
        }
    }

    /// One-byte tag used by the image encoding.
    pub fn code(&self) -> u8 {
        match self {
            Self::Dense => 0x01,
            Self::Relu => 0x02,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Dense),
            0x02 => Some(Self::Relu),
            _ => None,
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tensor is used for, which also decides its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorRole {
    /// Network input, written by the caller before a run.
    Input,
    /// Network output, read by the caller after a run.
    Output,
    /// Intermediate result between two layers.
    Internal,
    /// Layer parameter (weights or bias).
    Param,
}

impl TensorRole {
    pub fn arena(&self) -> ArenaKind {
        match self {
            Self::Param => ArenaKind::Weights,
            _ => ArenaKind::Activations,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Internal => 2,
            Self::Param => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Input),
            1 => Some(Self::Output),
            2 => Some(Self::Internal),
            3 => Some(Self::Param),
            _ => None,
        }
    }
}

/// A statically declared tensor: descriptor, role and arena offset.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDef {
    pub name: String,
    pub desc: TensorDesc,
    pub role: TensorRole,
    /// Byte offset inside the arena selected by `role`.
    pub offset: usize,
}

impl TensorDef {
    pub fn size_bytes(&self) -> usize {
        self.desc.size_bytes()
    }
}

/// Metadata describing a single node of the chain.
///
/// Tensors are referenced by index into the graph's tensor table. The
/// forward link is implicit: node `i` is followed by node `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayerDef {
    /// Identifier for this layer (e.g., `"fc1"`).
    pub name: String,
    /// User-visible numeric id reported by node introspection.
    pub id: u16,
    pub layer_type: LayerType,
    /// Position in the execution order (0-based).
    pub index: usize,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    /// Parameter tensors; for `Dense` these are `[weights, bias]`.
    pub params: Vec<usize>,
}

impl LayerDef {
    /// Multiply-accumulate count of one forward pass through this layer.
    ///
    /// `Dense` counts one MACC per weight plus one per bias element; `Relu`
    /// counts one per output element.
    pub fn macc(&self, tensors: &[TensorDef]) -> u64 {
        let elements = |ids: &[usize], at: usize| {
            ids.get(at)
                .and_then(|&id| tensors.get(id))
                .map_or(0, |t| t.desc.num_elements() as u64)
        };
        match self.layer_type {
            LayerType::Dense => elements(&self.params, 0) + elements(&self.params, 1),
            LayerType::Relu => elements(&self.outputs, 0),
        }
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self, tensors: &[TensorDef]) -> String {
        let param_bytes: usize = self
            .params
            .iter()
            .filter_map(|&id| tensors.get(id))
            .map(|t| t.size_bytes())
            .sum();
        format!(
            "[{}] {} ({}, id {}): {} MACC, {} param bytes",
            self.index,
            self.name,
            self.layer_type,
            self.id,
            self.macc(tensors),
            param_bytes,
        )
    }
}
