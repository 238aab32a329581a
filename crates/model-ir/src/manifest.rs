// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON network descriptor.
//!
//! The manifest is the human-editable form of a network: a tensor table
//! (shape, format, role, arena offset) and a layer chain referring to
//! tensors by name. [`ModelManifest::compile`] resolves names to indices,
//! validates the chain and emits a binary image.
//!
//! # Format
//! ```json
//! {
//!   "name": "python_model",
//!   "signature": "2cc73a6879a4957c93ee7c16411d7abc",
//!   "activations_size": 988,
//!   "weights_size": 102428,
//!   "tensors": [
//!     { "name": "input_0", "role": "input", "shape": [1, 147], "offset": 0 },
//!     { "name": "fc1_w", "role": "param", "shape": [147, 100], "offset": 0 },
//!     ...
//!   ],
//!   "layers": [
//!     { "name": "fc1", "id": 1, "layer_type": "dense",
//!       "inputs": ["input_0"], "outputs": ["fc1_out"], "params": ["fc1_w", "fc1_b"] },
//!     ...
//!   ]
//! }
//! ```

use crate::{image, LayerDef, LayerType, ModelError, ModelGraph, TensorDef, TensorRole};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tensor_core::{DType, Quantization, Shape, TensorDesc};

/// Top-level network descriptor, deserialized from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub name: String,
    #[serde(default)]
    pub signature: String,
    pub activations_size: usize,
    pub weights_size: usize,
    pub tensors: Vec<ManifestTensor>,
    pub layers: Vec<ManifestLayer>,
}

/// A tensor entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    pub name: String,
    pub role: TensorRole,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    pub shape: Vec<usize>,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quant: Option<Quantization>,
}

fn default_dtype() -> String {
    "f32".to_string()
}

/// A layer entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestLayer {
    pub name: String,
    pub id: u16,
    pub layer_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
}

impl ModelManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks names, layer types and formats.
    ///
    /// Chain structure and shapes are checked later by
    /// [`ModelGraph::validate`].
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::InvalidGraph("manifest contains no layers".into()));
        }

        let mut seen = HashSet::new();
        for t in &self.tensors {
            if !seen.insert(t.name.as_str()) {
                return Err(ModelError::InvalidTensor {
                    tensor: t.name.clone(),
                    detail: "duplicate tensor name".into(),
                });
            }
            parse_dtype(&t.dtype).ok_or_else(|| ModelError::InvalidTensor {
                tensor: t.name.clone(),
                detail: format!("unsupported dtype '{}'", t.dtype),
            })?;
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if !seen.insert(layer.name.as_str()) {
                return Err(ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: "duplicate layer name".into(),
                });
            }
            if LayerType::from_str_loose(&layer.layer_type).is_none() {
                return Err(ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: format!("unrecognised layer type '{}'", layer.layer_type),
                });
            }
        }
        Ok(())
    }

    /// Resolves tensor names and builds an unvalidated graph.
    pub fn to_graph(&self) -> Result<ModelGraph, ModelError> {
        self.validate()?;

        let index: HashMap<&str, usize> = self
            .tensors
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let tensors = self
            .tensors
            .iter()
            .map(|t| -> Result<TensorDef, ModelError> {
                // validate() already rejected unknown dtypes
                let dtype = parse_dtype(&t.dtype).unwrap_or(DType::F32);
                let mut desc = TensorDesc::new(Shape::new(t.shape.clone())?, dtype);
                if let Some(q) = t.quant {
                    desc = desc.with_quant(q);
                }
                Ok(TensorDef {
                    name: t.name.clone(),
                    desc,
                    role: t.role,
                    offset: t.offset,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, l)| -> Result<LayerDef, ModelError> {
                let resolve = |names: &[String]| {
                    names
                        .iter()
                        .map(|n| {
                            index.get(n.as_str()).copied().ok_or_else(|| {
                                ModelError::InvalidLayer {
                                    layer: l.name.clone(),
                                    detail: format!("unknown tensor '{n}'"),
                                }
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()
                };
                Ok(LayerDef {
                    name: l.name.clone(),
                    id: l.id,
                    layer_type: LayerType::from_str_loose(&l.layer_type)
                        .unwrap_or(LayerType::Dense),
                    index: i,
                    inputs: resolve(&l.inputs)?,
                    outputs: resolve(&l.outputs)?,
                    params: resolve(&l.params)?,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(ModelGraph::new(
            self.name.clone(),
            self.signature.clone(),
            tensors,
            layers,
            self.activations_size,
            self.weights_size,
        ))
    }

    /// Validates the manifest against `weights` and encodes an image.
    pub fn compile(&self, weights: &[u8]) -> Result<Vec<u8>, ModelError> {
        let graph = self.to_graph()?.validate()?;
        let bytes = image::encode(&graph, weights)?;
        tracing::info!(
            name = %graph.name,
            macc = graph.total_macc(),
            bytes = bytes.len(),
            "network image compiled"
        );
        Ok(bytes)
    }
}

/// Parses a dtype string into a [`tensor_core::DType`].
pub(crate) fn parse_dtype(s: &str) -> Option<DType> {
    match s.to_lowercase().as_str() {
        "f32" | "float32" | "float" => Some(DType::F32),
        "i8" | "int8" | "s8" => Some(DType::I8),
        "u8" | "uint8" => Some(DType::U8),
        "bool" => Some(DType::Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_json() -> &'static str {
        r#"{
            "name": "tiny",
            "activations_size": 16,
            "weights_size": 24,
            "tensors": [
                { "name": "x", "role": "input", "shape": [1, 2], "offset": 0 },
                { "name": "w", "role": "param", "shape": [2, 2], "offset": 0 },
                { "name": "b", "role": "param", "shape": [2], "offset": 16 },
                { "name": "h", "role": "internal", "shape": [1, 2], "offset": 8 },
                { "name": "y", "role": "output", "shape": [1, 2], "offset": 0 }
            ],
            "layers": [
                { "name": "fc", "id": 1, "layer_type": "gemm",
                  "inputs": ["x"], "outputs": ["h"], "params": ["w", "b"] },
                { "name": "act", "id": 2, "layer_type": "relu",
                  "inputs": ["h"], "outputs": ["y"] }
            ]
        }"#
    }

    #[test]
    fn test_parse_manifest() {
        let m = ModelManifest::from_json(tiny_json()).unwrap();
        assert_eq!(m.name, "tiny");
        assert_eq!(m.tensors.len(), 5);
        assert_eq!(m.tensors[0].dtype, "f32");
        assert!(m.signature.is_empty());
    }

    #[test]
    fn test_to_graph_resolves_names() {
        let graph = ModelManifest::from_json(tiny_json())
            .unwrap()
            .to_graph()
            .unwrap()
            .validate()
            .unwrap();
        let fc = graph.layer(0).unwrap();
        assert_eq!(fc.inputs, vec![0]);
        assert_eq!(fc.params, vec![1, 2]);
        assert_eq!(graph.layer(1).unwrap().layer_type, LayerType::Relu);
        assert_eq!(graph.total_macc(), 6 + 2);
    }

    #[test]
    fn test_unknown_tensor_name() {
        let json = tiny_json().replace(r#""outputs": ["y"]"#, r#""outputs": ["z"]"#);
        let m = ModelManifest::from_json(&json).unwrap();
        assert!(matches!(m.to_graph(), Err(ModelError::InvalidLayer { .. })));
    }

    #[test]
    fn test_validate_bad_layer_type() {
        let json = tiny_json().replace("\"relu\"", "\"softmax\"");
        let m = ModelManifest::from_json(&json).unwrap();
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_tensor() {
        let json = tiny_json().replace(r#""name": "h""#, r#""name": "x""#);
        let m = ModelManifest::from_json(&json).unwrap();
        assert!(matches!(m.validate(), Err(ModelError::InvalidTensor { .. })));
    }

    #[test]
    fn test_compile_and_parse() {
        let m = ModelManifest::from_json(tiny_json()).unwrap();
        let weights: Vec<u8> = [1.0f32, 0.0, 0.0, 1.0, 0.5, -0.5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let bytes = m.compile(&weights).unwrap();
        let image = image::NetworkImage::parse(&bytes, true).unwrap();
        assert_eq!(image.graph.name, "tiny");
        assert_eq!(image.weights, weights.as_slice());
    }

    #[test]
    fn test_parse_dtype() {
        assert_eq!(parse_dtype("float32"), Some(DType::F32));
        assert_eq!(parse_dtype("INT8"), Some(DType::I8));
        assert_eq!(parse_dtype("bool"), Some(DType::Bool));
        assert_eq!(parse_dtype("f16"), None);
    }

    #[test]
    fn test_json_roundtrip() {
        let m = ModelManifest::from_json(tiny_json()).unwrap();
        let back = ModelManifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(back.layers.len(), m.layers.len());
        assert_eq!(back.tensors[4].role, TensorRole::Output);
    }
}
