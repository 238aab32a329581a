// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element formats.

use crate::TensorError;

/// Enumerates the element formats a tensor can hold.
///
/// The runtime uses `DType` to compute byte extents when binding tensors to
/// arena slots, to decide how the performance harness fills random inputs,
/// and to pick a kernel. The one-byte code is the on-image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 8-bit signed integer (quantised).
    I8,
    /// 8-bit unsigned integer (quantised).
    U8,
    /// One byte per element, 0 or 1.
    Bool,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I8 | DType::U8 | DType::Bool => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::Bool => "bool",
        }
    }

    /// Returns `true` for floating point formats.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32)
    }

    /// Encodes the format as its image byte.
    pub fn code(self) -> u8 {
        match self {
            DType::F32 => 0x01,
            DType::I8 => 0x02,
            DType::U8 => 0x03,
            DType::Bool => 0x04,
        }
    }

    /// Decodes an image byte.
    pub fn from_code(code: u8) -> Result<Self, TensorError> {
        match code {
            0x01 => Ok(DType::F32),
            0x02 => Ok(DType::I8),
            0x03 => Ok(DType::U8),
            0x04 => Ok(DType::Bool),
            other => Err(TensorError::UnknownFormat(other)),
        }
    }
}

/// Affine quantization parameters: `real = scale * (q - zero_point)`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Quantization {
    /// Maps a quantised value back to the real domain.
    pub fn dequantize(&self, q: i32) -> f32 {
        self.scale * (q - self.zero_point) as f32
    }
}
