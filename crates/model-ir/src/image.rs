// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compact binary network image.
//!
//! An image carries everything needed to run a network: the tensor table,
//! the layer chain, the declared arena sizes and the weights blob. It is
//! either referenced in place (execute-in-place) or copied into a
//! caller-owned region first.
//!
//! # Layout (little-endian)
//! ```text
//! magic            b"C4NN"
//! version          u16
//! name             u16 len + utf-8
//! signature        u16 len + utf-8
//! tool_version     3 × u8
//! activations_size u32
//! weights_size     u32
//! tensors          u16 count, then per tensor:
//!                    name, role u8, dtype u8, rank u8, dims 4 × u32,
//!                    quant u8 (0/1), scale f32, zero_point i32, offset u32
//! layers           u16 count, then per layer:
//!                    name, id u16, type u8,
//!                    inputs/outputs/params: u8 count + count × u16
//! weights          weights_size bytes
//! crc32            u32 over every preceding byte
//! ```

use crate::graph::Validated;
use crate::{LayerDef, LayerType, ModelError, ModelGraph, TensorDef, TensorRole};
use tensor_core::{DType, Quantization, Shape, TensorDesc, MAX_RANK};

pub const MAGIC: &[u8; 4] = b"C4NN";
pub const VERSION: u16 = 1;
/// Encoder version recorded in every image.
pub const TOOL_VERSION: [u8; 3] = [0, 1, 0];

/// How the image is made available to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Weights are read directly from the image bytes.
    Xip,
    /// The image is copied into a caller-provided region before use.
    Copy,
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::Xip => f.write_str("xip"),
            LoadMode::Copy => f.write_str("copy"),
        }
    }
}

/// A decoded, validated image borrowing its weights from the source bytes.
#[derive(Debug, Clone)]
pub struct NetworkImage<'a> {
    pub graph: ModelGraph<Validated>,
    pub tool_version: [u8; 3],
    pub weights: &'a [u8],
    /// Total encoded length, including the checksum.
    pub image_len: usize,
}

impl<'a> NetworkImage<'a> {
    /// Decodes and validates an image.
    ///
    /// When `verify_crc` is set, the trailing checksum is compared against
    /// the contents before anything else is decoded.
    pub fn parse(bytes: &'a [u8], verify_crc: bool) -> Result<Self, ModelError> {
        if bytes.len() < MAGIC.len() + 4 {
            return Err(ModelError::Truncated {
                offset: 0,
                needed: MAGIC.len() + 4 - bytes.len(),
            });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(ModelError::BadMagic);
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        if verify_crc {
            let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
            let computed = crc32(body);
            if stored != computed {
                return Err(ModelError::CrcMismatch { stored, computed });
            }
        } else {
            tracing::warn!("image integrity check disabled");
        }

        let mut r = Reader::new(body, MAGIC.len());
        let version = r.u16()?;
        if version != VERSION {
            return Err(ModelError::UnsupportedVersion(version));
        }
        let name = r.string()?;
        let signature = r.string()?;
        let tool_version = [r.u8()?, r.u8()?, r.u8()?];
        let activations_size = r.u32()? as usize;
        let weights_size = r.u32()? as usize;

        let n_tensors = r.u16()? as usize;
        let mut tensors = Vec::with_capacity(n_tensors);
        for _ in 0..n_tensors {
            tensors.push(r.tensor()?);
        }
        let n_layers = r.u16()? as usize;
        let mut layers = Vec::with_capacity(n_layers);
        for index in 0..n_layers {
            layers.push(r.layer(index)?);
        }
        let weights = r.bytes(weights_size)?;
        if r.remaining() != 0 {
            return Err(ModelError::Malformed {
                offset: r.pos,
                detail: format!("{} trailing bytes before checksum", r.remaining()),
            });
        }

        let graph = ModelGraph::new(
            name,
            signature,
            tensors,
            layers,
            activations_size,
            weights_size,
        )
        .validate()?;

        tracing::info!(
            name = %graph.name,
            layers = graph.num_layers(),
            bytes = bytes.len(),
            "network image decoded"
        );
        Ok(Self {
            graph,
            tool_version,
            weights,
            image_len: bytes.len(),
        })
    }
}

/// Bytes the caller must provide to load an image of `image_len` bytes in
/// `mode`, on top of the activation arena.
pub fn required_region(mode: LoadMode, image_len: usize) -> usize {
    match mode {
        LoadMode::Xip => 0,
        LoadMode::Copy => image_len,
    }
}

/// Encodes a validated graph and its weights blob into an image.
///
/// # Errors
/// [`ModelError::Malformed`] if `weights` does not match the declared size
/// or a table does not fit its length field.
pub fn encode(graph: &ModelGraph<Validated>, weights: &[u8]) -> Result<Vec<u8>, ModelError> {
    if weights.len() != graph.weights_size {
        return Err(ModelError::Malformed {
            offset: 0,
            detail: format!(
                "weights blob is {} bytes, graph declares {}",
                weights.len(),
                graph.weights_size
            ),
        });
    }
    let mut w = Writer::default();
    w.buf.extend_from_slice(MAGIC);
    w.u16(VERSION);
    w.string(&graph.name)?;
    w.string(&graph.signature)?;
    w.buf.extend_from_slice(&TOOL_VERSION);
    w.u32(graph.activations_size)?;
    w.u32(graph.weights_size)?;

    w.u16(count(graph.tensors.len())?);
    for t in &graph.tensors {
        w.string(&t.name)?;
        w.u8(t.role.code());
        w.u8(t.desc.dtype.code());
        w.u8(t.desc.shape.rank() as u8);
        for d in t.desc.shape.padded() {
            w.u32(d)?;
        }
        let quant = t.desc.quant.unwrap_or(Quantization {
            scale: 0.0,
            zero_point: 0,
        });
        w.u8(u8::from(t.desc.quant.is_some()));
        w.buf.extend_from_slice(&quant.scale.to_le_bytes());
        w.buf.extend_from_slice(&quant.zero_point.to_le_bytes());
        w.u32(t.offset)?;
    }

    w.u16(count(graph.layers.len())?);
    for l in &graph.layers {
        w.string(&l.name)?;
        w.u16(l.id);
        w.u8(l.layer_type.code());
        for ids in [&l.inputs, &l.outputs, &l.params] {
            w.u8(u8::try_from(ids.len()).map_err(|_| overflow("tensor list"))?);
            for &id in ids.iter() {
                w.u16(count(id)?);
            }
        }
    }

    w.buf.extend_from_slice(weights);
    let crc = crc32(&w.buf);
    w.buf.extend_from_slice(&crc.to_le_bytes());
    Ok(w.buf)
}

fn overflow(what: &str) -> ModelError {
    ModelError::Malformed {
        offset: 0,
        detail: format!("{what} does not fit its length field"),
    }
}

fn count(n: usize) -> Result<u16, ModelError> {
    u16::try_from(n).map_err(|_| overflow("table"))
}

/// CRC-32 (IEEE 802.3, reflected, polynomial 0xEDB88320).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

// ── Encoding helpers ───────────────────────────────────────────────

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: usize) -> Result<(), ModelError> {
        let v = u32::try_from(v).map_err(|_| overflow("size"))?;
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<(), ModelError> {
        self.u16(count(s.len())?);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], ModelError> {
        if self.remaining() < n {
            return Err(ModelError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ModelError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ModelError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ModelError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ModelError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn malformed(&self, detail: impl Into<String>) -> ModelError {
        ModelError::Malformed {
            offset: self.pos,
            detail: detail.into(),
        }
    }

    fn string(&mut self) -> Result<String, ModelError> {
        let len = self.u16()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.malformed("string is not utf-8"))
    }

    fn ids(&mut self) -> Result<Vec<usize>, ModelError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.u16().map(usize::from)).collect()
    }

    fn tensor(&mut self) -> Result<TensorDef, ModelError> {
        let name = self.string()?;
        let role = TensorRole::from_code(self.u8()?)
            .ok_or_else(|| self.malformed(format!("unknown role for tensor '{name}'")))?;
        let dtype = DType::from_code(self.u8()?)?;
        let rank = self.u8()? as usize;
        if rank > MAX_RANK {
            return Err(self.malformed(format!("tensor '{name}' has rank {rank}")));
        }
        let mut dims = [0usize; MAX_RANK];
        for d in dims.iter_mut() {
            *d = self.u32()? as usize;
        }
        let has_quant = self.u8()? != 0;
        let scale = f32::from_le_bytes(self.array()?);
        let zero_point = i32::from_le_bytes(self.array()?);
        let offset = self.u32()? as usize;

        let mut desc = TensorDesc::new(Shape::new(dims[..rank].to_vec())?, dtype);
        if has_quant {
            desc = desc.with_quant(Quantization { scale, zero_point });
        }
        Ok(TensorDef {
            name,
            desc,
            role,
            offset,
        })
    }

    fn layer(&mut self, index: usize) -> Result<LayerDef, ModelError> {
        let name = self.string()?;
        let id = self.u16()?;
        let code = self.u8()?;
        let layer_type = LayerType::from_code(code)
            .ok_or_else(|| self.malformed(format!("unknown layer type {code:#04x}")))?;
        Ok(LayerDef {
            name,
            id,
            layer_type,
            index,
            inputs: self.ids()?,
            outputs: self.ids()?,
            params: self.ids()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    #[test]
    fn test_crc32_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_builtin_image_decodes() {
        let bytes = builtin::connect4_image().unwrap();
        let image = NetworkImage::parse(&bytes, true).unwrap();
        assert_eq!(image.graph.name, builtin::MODEL_NAME);
        assert_eq!(image.graph.signature, builtin::MODEL_SIGNATURE);
        assert_eq!(image.graph.num_layers(), 5);
        assert_eq!(image.weights.len(), 102_428);
        assert_eq!(image.graph.activations_size, 988);
        assert_eq!(image.image_len, bytes.len());
        assert_eq!(image.tool_version, TOOL_VERSION);
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = builtin::connect4_image().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x40;
        assert!(matches!(
            NetworkImage::parse(&bytes, true),
            Err(ModelError::CrcMismatch { .. })
        ));
        // without the check the weights flip goes unnoticed
        assert!(NetworkImage::parse(&bytes, false).is_ok());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = builtin::connect4_image().unwrap();
        bytes[0] = b'X';
        assert!(matches!(NetworkImage::parse(&bytes, false), Err(ModelError::BadMagic)));
    }

    #[test]
    fn test_truncated() {
        let bytes = builtin::connect4_image().unwrap();
        let cut = &bytes[..200];
        assert!(matches!(
            NetworkImage::parse(cut, false),
            Err(ModelError::Truncated { .. })
        ));
        assert!(NetworkImage::parse(&bytes[..3], false).is_err());
    }

    #[test]
    fn test_oversized_dims_are_a_load_error() {
        let mut bytes = builtin::connect4_image().unwrap();
        let mut record = 7u16.to_le_bytes().to_vec();
        record.extend_from_slice(b"fc1_out");
        let at = bytes
            .windows(record.len())
            .position(|w| w == record.as_slice())
            .unwrap();
        // role, dtype, then rank and four u32 dims
        let rank_at = at + record.len() + 2;
        bytes[rank_at] = 4;
        for d in 0..MAX_RANK {
            let o = rank_at + 1 + d * 4;
            bytes[o..o + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        }
        let body = bytes.len() - 4;
        let crc = crc32(&bytes[..body]);
        bytes[body..].copy_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            NetworkImage::parse(&bytes, true),
            Err(ModelError::Tensor(tensor_core::TensorError::ShapeOverflow(_)))
        ));
    }

    #[test]
    fn test_encode_rejects_wrong_weights_len() {
        let bytes = builtin::connect4_image().unwrap();
        let image = NetworkImage::parse(&bytes, true).unwrap();
        assert!(encode(&image.graph, &[0u8; 10]).is_err());
    }

    #[test]
    fn test_required_region() {
        assert_eq!(required_region(LoadMode::Xip, 4096), 0);
        assert_eq!(required_region(LoadMode::Copy, 4096), 4096);
    }
}
