// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph: the compiled network as a chain of layers.
//!
//! # Type-State Pattern
//!
//! ```text
//! ModelGraph<Loaded>     — tables decoded, not yet checked.
//!       │  .validate()
//!       ▼
//! ModelGraph<Validated>  — chain verified, every tensor bound to a slot.
//! ```
//!
//! The runtime only accepts a `ModelGraph<Validated>`, so it never sees a
//! dangling tensor reference or a slot that overruns its arena.

use crate::{LayerDef, LayerType, ModelError, TensorDef, TensorRole};
use memory_manager::{bind, ArenaKind, LiveRange, Slot};
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been decoded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and its slots resolved.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── ModelGraph ─────────────────────────────────────────────────────

/// A compiled network: tensor table, layer chain and declared arena sizes.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    pub name: String,
    /// Content signature of the compiled model (hex digest).
    pub signature: String,
    pub tensors: Vec<TensorDef>,
    pub layers: Vec<LayerDef>,
    /// Declared activation arena size in bytes.
    pub activations_size: usize,
    /// Declared weights arena size in bytes.
    pub weights_size: usize,
    slots: Vec<Slot>,
    input_id: usize,
    output_id: usize,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelGraph<Loaded> {
    pub fn new(
        name: String,
        signature: String,
        tensors: Vec<TensorDef>,
        layers: Vec<LayerDef>,
        activations_size: usize,
        weights_size: usize,
    ) -> Self {
        Self {
            name,
            signature,
            tensors,
            layers,
            activations_size,
            weights_size,
            slots: Vec::new(),
            input_id: 0,
            output_id: 0,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the chain and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The chain is non-empty and indices are consecutive from 0.
    /// - Every tensor has elements and fits its declared arena.
    /// - Exactly one `Input` and one `Output` tensor exist.
    /// - Every layer has the arity and shapes its type requires.
    /// - Node `i`'s output is node `i + 1`'s input; the first node reads the
    ///   network input and the last node writes the network output.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::InvalidGraph("network contains no layers".into()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.index != i {
                return Err(ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: format!("expected index {i}, got {}", layer.index),
                });
            }
        }

        let slots = self.bind_tensors()?;
        let input = self.unique_role(TensorRole::Input)?;
        let output = self.unique_role(TensorRole::Output)?;

        for layer in &self.layers {
            self.check_layer(layer)?;
        }

        let first = &self.layers[0];
        if first.inputs[0] != input {
            return Err(ModelError::InvalidGraph(format!(
                "first layer '{}' does not read the network input",
                first.name
            )));
        }
        let last = &self.layers[self.layers.len() - 1];
        if last.outputs[0] != output {
            return Err(ModelError::InvalidGraph(format!(
                "last layer '{}' does not write the network output",
                last.name
            )));
        }
        for pair in self.layers.windows(2) {
            if pair[0].outputs[0] != pair[1].inputs[0] {
                return Err(ModelError::InvalidGraph(format!(
                    "'{}' does not feed '{}'",
                    pair[0].name, pair[1].name
                )));
            }
        }

        tracing::debug!(
            name = %self.name,
            layers = self.layers.len(),
            tensors = self.tensors.len(),
            "network graph validated"
        );

        Ok(ModelGraph {
            name: self.name,
            signature: self.signature,
            tensors: self.tensors,
            layers: self.layers,
            activations_size: self.activations_size,
            weights_size: self.weights_size,
            slots,
            input_id: input,
            output_id: output,
            _state: std::marker::PhantomData,
        })
    }

    fn bind_tensors(&self) -> Result<Vec<Slot>, ModelError> {
        self.tensors
            .iter()
            .map(|t| {
                if t.desc.num_elements() == 0 {
                    return Err(ModelError::InvalidTensor {
                        tensor: t.name.clone(),
                        detail: "shape has zero elements".into(),
                    });
                }
                let kind = t.role.arena();
                let arena_size = match kind {
                    ArenaKind::Weights => self.weights_size,
                    ArenaKind::Activations => self.activations_size,
                };
                Ok(bind(&t.desc, kind, arena_size, t.offset)?)
            })
            .collect()
    }

    fn unique_role(&self, role: TensorRole) -> Result<usize, ModelError> {
        let mut found = self
            .tensors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.role == role)
            .map(|(i, _)| i);
        match (found.next(), found.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(ModelError::InvalidGraph(format!("no {role:?} tensor declared"))),
            (Some(_), Some(_)) => Err(ModelError::InvalidGraph(format!(
                "more than one {role:?} tensor declared"
            ))),
        }
    }

    fn check_layer(&self, layer: &LayerDef) -> Result<(), ModelError> {
        let invalid = |detail: String| ModelError::InvalidLayer {
            layer: layer.name.clone(),
            detail,
        };
        let lookup = |id: usize| {
            self.tensors
                .get(id)
                .ok_or_else(|| invalid(format!("tensor index {id} out of range")))
        };

        if layer.inputs.len() != 1 || layer.outputs.len() != 1 {
            return Err(invalid(format!(
                "expected 1 input and 1 output, got {} and {}",
                layer.inputs.len(),
                layer.outputs.len()
            )));
        }
        let input = lookup(layer.inputs[0])?;
        let output = lookup(layer.outputs[0])?;
        if input.role == TensorRole::Param || output.role == TensorRole::Param {
            return Err(invalid("parameter tensor used as activation".into()));
        }
        if layer.inputs[0] == layer.outputs[0] {
            return Err(invalid("input and output are the same tensor".into()));
        }
        let params = layer
            .params
            .iter()
            .map(|&id| lookup(id))
            .collect::<Result<Vec<_>, _>>()?;
        if params.iter().any(|p| p.role != TensorRole::Param) {
            return Err(invalid("activation tensor used as parameter".into()));
        }

        let in_elems = input.desc.num_elements();
        let out_elems = output.desc.num_elements();
        match layer.layer_type {
            LayerType::Dense => {
                let weights = params
                    .first()
                    .ok_or_else(|| invalid("dense layer has no weights".into()))?;
                if params.len() > 2 {
                    return Err(invalid(format!("expected at most 2 params, got {}", params.len())));
                }
                let dims = weights.desc.shape.dims();
                if dims.len() != 2 || dims[0] != in_elems || dims[1] != out_elems {
                    return Err(invalid(format!(
                        "weights {} incompatible with {in_elems} inputs and {out_elems} outputs",
                        weights.desc.shape
                    )));
                }
                if let Some(bias) = params.get(1) {
                    if bias.desc.num_elements() != out_elems {
                        return Err(invalid(format!(
                            "bias {} does not match {out_elems} outputs",
                            bias.desc.shape
                        )));
                    }
                }
            }
            LayerType::Relu => {
                if !params.is_empty() {
                    return Err(invalid("relu takes no parameters".into()));
                }
                if in_elems != out_elems {
                    return Err(invalid(format!(
                        "input {} and output {} differ in size",
                        input.desc.shape, output.desc.shape
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── Validated state ────────────────────────────────────────────────

impl ModelGraph<Validated> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns an iterator over the layers in execution order.
    pub fn iter_layers(&self) -> impl Iterator<Item = &LayerDef> {
        self.layers.iter()
    }

    pub fn layer(&self, index: usize) -> Option<&LayerDef> {
        self.layers.get(index)
    }

    pub fn tensor(&self, id: usize) -> Option<&TensorDef> {
        self.tensors.get(id)
    }

    /// The resolved arena slot of tensor `id`.
    pub fn slot(&self, id: usize) -> Option<Slot> {
        self.slots.get(id).copied()
    }

    /// Index of the network input tensor.
    pub fn input_id(&self) -> usize {
        self.input_id
    }

    /// Index of the network output tensor.
    pub fn output_id(&self) -> usize {
        self.output_id
    }

    pub fn input(&self) -> &TensorDef {
        &self.tensors[self.input_id]
    }

    pub fn output(&self) -> &TensorDef {
        &self.tensors[self.output_id]
    }

    /// Total multiply-accumulate count of one forward pass.
    pub fn total_macc(&self) -> u64 {
        self.layers.iter().map(|l| l.macc(&self.tensors)).sum()
    }

    /// Live ranges of every activation tensor, for alias validation.
    ///
    /// The network input is live from node 0 until its last reader; the
    /// network output stays live one step past the final node so the caller
    /// can read it.
    pub fn live_ranges(&self) -> Vec<LiveRange> {
        let n = self.layers.len();
        self.tensors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.role != TensorRole::Param)
            .map(|(id, t)| {
                let producer = self.layers.iter().find(|l| l.outputs.contains(&id));
                let last_reader = self
                    .layers
                    .iter()
                    .filter(|l| l.inputs.contains(&id))
                    .map(|l| l.index)
                    .max();
                let first = producer.map_or(0, |l| l.index);
                let last = match t.role {
                    TensorRole::Output => n,
                    _ => last_reader.unwrap_or(first),
                };
                LiveRange {
                    tensor: id,
                    slot: self.slots[id],
                    first,
                    last,
                }
            })
            .collect()
    }

    /// Returns a summary string describing the network.
    pub fn summary(&self) -> String {
        format!(
            "Network '{}': {} layers, {} MACC, {} B activations, {} B weights",
            self.name,
            self.num_layers(),
            self.total_macc(),
            self.activations_size,
            self.weights_size,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ModelGraph '{}' ({} layers):", self.name, self.layers.len())?;
        for layer in &self.layers {
            writeln!(f, "  {}", layer.summary(&self.tensors))?;
        }
        Ok(())
    }
}
