// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The Connect-4 move-scoring network shipped with the runtime.
//!
//! Topology: `147 → dense(100) → relu → dense(100) → relu → dense(7)`, all
//! `f32`, batch 1. The activation arena is 988 bytes with aliased slots and
//! the weights arena is 102 428 bytes.
//!
//! No trained parameters are distributed, so [`connect4_weights`] wires the
//! layers by hand: each column's score is dominated by its "AI wins here"
//! feature, then its "human wins here" feature, then legality with a small
//! preference for central columns.

use crate::manifest::{ManifestLayer, ManifestTensor};
use crate::{ModelError, ModelManifest, TensorRole};

pub const MODEL_NAME: &str = "python_model";
pub const MODEL_SIGNATURE: &str = "2cc73a6879a4957c93ee7c16411d7abc";

pub const INPUT_LEN: usize = 147;
pub const HIDDEN_LEN: usize = 100;
pub const OUTPUT_LEN: usize = 7;
pub const NODES: usize = 5;
pub const ACTIVATIONS_SIZE: usize = 988;
pub const WEIGHTS_SIZE: usize = 102_428;

// feature vector sections
const VALID_BITS: usize = 126;
const BLOCK_BITS: usize = 133;
const WIN_BITS: usize = 140;

const WIN_WEIGHT: f32 = 100.0;
const BLOCK_WEIGHT: f32 = 10.0;
const CENTRE_BONUS: [f32; OUTPUT_LEN] = [0.0, 0.1, 0.2, 0.3, 0.2, 0.1, 0.0];

// weights arena offsets
const FC1_W: usize = 0;
const FC1_B: usize = 58_800;
const FC2_W: usize = 59_200;
const FC2_B: usize = 99_200;
const OUT_W: usize = 99_600;
const OUT_B: usize = 102_400;

fn tensor(name: &str, role: TensorRole, shape: &[usize], offset: usize) -> ManifestTensor {
    ManifestTensor {
        name: name.into(),
        role,
        dtype: "f32".into(),
        shape: shape.to_vec(),
        offset,
        quant: None,
    }
}

fn layer(
    name: &str,
    id: u16,
    ty: &str,
    input: &str,
    output: &str,
    params: &[&str],
) -> ManifestLayer {
    ManifestLayer {
        name: name.into(),
        id,
        layer_type: ty.into(),
        inputs: vec![input.into()],
        outputs: vec![output.into()],
        params: params.iter().map(|p| p.to_string()).collect(),
    }
}

/// Descriptor of the built-in network and its fixed arena layout.
pub fn connect4_manifest() -> ModelManifest {
    use TensorRole::*;
    ModelManifest {
        name: MODEL_NAME.into(),
        signature: MODEL_SIGNATURE.into(),
        activations_size: ACTIVATIONS_SIZE,
        weights_size: WEIGHTS_SIZE,
        tensors: vec![
            tensor("input_0", Input, &[1, INPUT_LEN], 0),
            tensor("fc1_w", Param, &[INPUT_LEN, HIDDEN_LEN], FC1_W),
            tensor("fc1_b", Param, &[1, HIDDEN_LEN], FC1_B),
            tensor("fc1_out", Internal, &[1, HIDDEN_LEN], 588),
            tensor("relu_out", Internal, &[1, HIDDEN_LEN], 0),
            tensor("fc2_w", Param, &[HIDDEN_LEN, HIDDEN_LEN], FC2_W),
            tensor("fc2_b", Param, &[1, HIDDEN_LEN], FC2_B),
            tensor("fc2_out", Internal, &[1, HIDDEN_LEN], 400),
            tensor("relu_1_out", Internal, &[1, HIDDEN_LEN], 0),
            tensor("output_w", Param, &[HIDDEN_LEN, OUTPUT_LEN], OUT_W),
            tensor("output_b", Param, &[1, OUTPUT_LEN], OUT_B),
            tensor("output_0", Output, &[1, OUTPUT_LEN], 400),
        ],
        layers: vec![
            layer("fc1", 1, "dense", "input_0", "fc1_out", &["fc1_w", "fc1_b"]),
            layer("relu", 2, "relu", "fc1_out", "relu_out", &[]),
            layer("fc2", 3, "dense", "relu_out", "fc2_out", &["fc2_w", "fc2_b"]),
            layer("relu_1", 4, "relu", "fc2_out", "relu_1_out", &[]),
            layer("output", 5, "dense", "relu_1_out", "output_0", &["output_w", "output_b"]),
        ],
    }
}

fn put(blob: &mut [u8], base: usize, index: usize, value: f32) {
    let at = base + index * 4;
    blob[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Hand-wired parameters for the built-in network.
///
/// Hidden unit `c` (for column `c`) accumulates the column's win, block and
/// legality features; the remaining hidden units stay at zero. The second
/// dense layer and the output layer pass the first seven units through.
pub fn connect4_weights() -> Vec<u8> {
    let mut blob = vec![0u8; WEIGHTS_SIZE];
    for c in 0..OUTPUT_LEN {
        put(&mut blob, FC1_W, (WIN_BITS + c) * HIDDEN_LEN + c, WIN_WEIGHT);
        put(&mut blob, FC1_W, (BLOCK_BITS + c) * HIDDEN_LEN + c, BLOCK_WEIGHT);
        put(&mut blob, FC1_W, (VALID_BITS + c) * HIDDEN_LEN + c, 1.0 + CENTRE_BONUS[c]);
        put(&mut blob, FC2_W, c * HIDDEN_LEN + c, 1.0);
        put(&mut blob, OUT_W, c * OUTPUT_LEN + c, 1.0);
    }
    blob
}

/// The built-in network encoded as an image.
pub fn connect4_image() -> Result<Vec<u8>, ModelError> {
    connect4_manifest().compile(&connect4_weights())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(blob: &[u8], base: usize, index: usize) -> f32 {
        let at = base + index * 4;
        f32::from_le_bytes([blob[at], blob[at + 1], blob[at + 2], blob[at + 3]])
    }

    #[test]
    fn test_weights_size() {
        assert_eq!(connect4_weights().len(), WEIGHTS_SIZE);
    }

    #[test]
    fn test_weight_layout() {
        let blob = connect4_weights();
        assert_eq!(get(&blob, FC1_W, (WIN_BITS + 3) * HIDDEN_LEN + 3), WIN_WEIGHT);
        assert!((get(&blob, FC1_W, (VALID_BITS + 3) * HIDDEN_LEN + 3) - 1.3).abs() < 1e-6);
        assert_eq!(get(&blob, FC1_W, (VALID_BITS + 3) * HIDDEN_LEN + 4), 0.0);
        assert_eq!(get(&blob, OUT_W, 6 * OUTPUT_LEN + 6), 1.0);
        assert_eq!(get(&blob, OUT_B, 6), 0.0);
    }

    #[test]
    fn test_manifest_compiles() {
        let graph = connect4_manifest().to_graph().unwrap().validate().unwrap();
        assert_eq!(graph.input().offset, 0);
        assert_eq!(graph.output().offset, 400);
        let ids: Vec<u16> = graph.iter_layers().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(connect4_image().is_ok());
    }
}
