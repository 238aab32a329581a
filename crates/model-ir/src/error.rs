// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for network descriptions and images.

/// Errors that can occur when building, encoding or decoding a network.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The manifest file could not be read.
    #[error("failed to read manifest: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// A layer definition is invalid (e.g., incompatible shapes).
    #[error("invalid layer '{layer}': {detail}")]
    InvalidLayer { layer: String, detail: String },

    /// A tensor declaration is invalid.
    #[error("invalid tensor '{tensor}': {detail}")]
    InvalidTensor { tensor: String, detail: String },

    /// The chain is empty, branches, or does not connect input to output.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),

    /// The image does not start with the expected magic bytes.
    #[error("not a network image (bad magic)")]
    BadMagic,

    /// The image was produced by an incompatible encoder.
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u16),

    /// The image ended before a field could be read.
    #[error("image truncated at byte {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    /// A field holds a value outside its domain.
    #[error("malformed image at byte {offset}: {detail}")]
    Malformed { offset: usize, detail: String },

    /// The trailing checksum does not match the image contents.
    #[error("integrity check failed: stored crc {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },

    /// A descriptor was rejected by the tensor layer.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),

    /// A slot did not fit its declared arena.
    #[error(transparent)]
    Memory(#[from] memory_manager::MemoryError),
}
