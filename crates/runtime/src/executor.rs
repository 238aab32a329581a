// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The run loop.
//!
//! Nodes execute strictly in chain order. For each node the loop fires the
//! pre-node event, runs the kernel over the node's bound slots and fires the
//! post-node event with a view of the freshly written output. The first
//! kernel failure aborts the run.

use crate::error::{ErrorDetail, ErrorType};
use crate::{EventMask, NodeEvent, NodeObserver, RuntimeError};
use memory_manager::{ActivationArena, Slot, WeightsArena};
use model_ir::graph::Validated;
use model_ir::{LayerDef, LayerType, ModelGraph};
use tensor_core::{TensorError, TensorView, TensorViewMut};

/// Numeric primitives used by the run loop.
pub trait Kernels {
    fn dense(
        &self,
        input: &TensorView<'_>,
        weights: &TensorView<'_>,
        bias: Option<&TensorView<'_>>,
        output: &mut TensorViewMut<'_>,
    ) -> Result<(), TensorError>;

    fn relu(&self, input: &TensorView<'_>, output: &mut TensorViewMut<'_>)
        -> Result<(), TensorError>;
}

/// The portable kernels from `tensor-core`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceKernels;

impl Kernels for ReferenceKernels {
    fn dense(
        &self,
        input: &TensorView<'_>,
        weights: &TensorView<'_>,
        bias: Option<&TensorView<'_>>,
        output: &mut TensorViewMut<'_>,
    ) -> Result<(), TensorError> {
        tensor_core::dense(input, weights, bias, output)
    }

    fn relu(
        &self,
        input: &TensorView<'_>,
        output: &mut TensorViewMut<'_>,
    ) -> Result<(), TensorError> {
        tensor_core::relu(input, output)
    }
}

/// An observer together with the events it subscribed to.
pub type Registered<'o> = Option<(&'o mut dyn NodeObserver, EventMask)>;

fn slot_of(graph: &ModelGraph<Validated>, layer: &LayerDef, id: usize) -> Result<Slot, RuntimeError> {
    graph.slot(id).ok_or_else(|| {
        RuntimeError::run(
            ErrorType::InvalidState,
            ErrorDetail::Tensor,
            format!("layer '{}' references unbound tensor {id}", layer.name),
        )
    })
}

fn kernel_failed(layer: &LayerDef, source: TensorError) -> RuntimeError {
    RuntimeError::run(
        ErrorType::InvalidValue,
        ErrorDetail::Layer,
        format!("layer '{}' ({}): {source}", layer.name, layer.layer_type),
    )
}

/// Views parameter `at` of `layer`, if the layer has one.
fn param_view<'s>(
    graph: &'s ModelGraph<Validated>,
    layer: &LayerDef,
    weights: &WeightsArena<'s>,
    at: usize,
) -> Result<Option<TensorView<'s>>, RuntimeError> {
    let Some(&id) = layer.params.get(at) else {
        return Ok(None);
    };
    let slot = slot_of(graph, layer, id)?;
    weights
        .view(&graph.tensors[id].desc, slot)
        .map(Some)
        .map_err(|e| {
            RuntimeError::run(
                ErrorType::InvalidState,
                ErrorDetail::NetworkWeights,
                format!("layer '{}': {e}", layer.name),
            )
        })
}

/// Executes one node's kernel over its bound slots.
fn compute(
    graph: &ModelGraph<Validated>,
    layer: &LayerDef,
    weights: WeightsArena<'_>,
    arena: &mut ActivationArena<'_>,
    kernels: &dyn Kernels,
) -> Result<(), RuntimeError> {
    let in_id = layer.inputs[0];
    let out_id = layer.outputs[0];
    let in_desc = &graph.tensors[in_id].desc;
    let out_desc = &graph.tensors[out_id].desc;
    let in_slot = slot_of(graph, layer, in_id)?;
    let out_slot = slot_of(graph, layer, out_id)?;

    let memory_failed = |e: memory_manager::MemoryError| {
        RuntimeError::run(
            ErrorType::InvalidState,
            ErrorDetail::NetworkActivations,
            format!("layer '{}': {e}", layer.name),
        )
    };
    let (in_bytes, out_bytes) = arena.split_io(in_slot, out_slot).map_err(memory_failed)?;
    let input = TensorView::new(in_desc, in_bytes).map_err(|e| kernel_failed(layer, e))?;
    let mut output =
        TensorViewMut::new(out_desc, out_bytes).map_err(|e| kernel_failed(layer, e))?;

    let result = match layer.layer_type {
        LayerType::Dense => {
            let w = param_view(graph, layer, &weights, 0)?.ok_or_else(|| {
                RuntimeError::run(
                    ErrorType::InvalidState,
                    ErrorDetail::Layer,
                    format!("dense layer '{}' has no weights", layer.name),
                )
            })?;
            let bias = param_view(graph, layer, &weights, 1)?;
            kernels.dense(&input, &w, bias.as_ref(), &mut output)
        }
        LayerType::Relu => kernels.relu(&input, &mut output),
    };
    result.map_err(|e| kernel_failed(layer, e))
}

/// Runs the whole chain once.
pub(crate) fn execute(
    graph: &ModelGraph<Validated>,
    weights: WeightsArena<'_>,
    arena: &mut ActivationArena<'_>,
    kernels: &dyn Kernels,
    mut observer: Registered<'_>,
) -> Result<(), RuntimeError> {
    let n = graph.num_layers();
    for layer in graph.iter_layers() {
        let event = NodeEvent {
            index: layer.index,
            layer_type: layer.layer_type,
            id: layer.id,
            first: layer.index == 0,
            last: layer.index + 1 == n,
        };

        if let Some((obs, mask)) = observer.as_mut() {
            if mask.contains(EventMask::PRE_NODE) {
                obs.on_pre_node(&event);
            }
        }

        compute(graph, layer, weights, arena, kernels)?;
        tracing::trace!(index = layer.index, name = %layer.name, "node executed");

        if let Some((obs, mask)) = observer.as_mut() {
            if mask.contains(EventMask::POST_NODE) {
                let out_id = layer.outputs[0];
                let slot = slot_of(graph, layer, out_id)?;
                let view = arena
                    .view(&graph.tensors[out_id].desc, slot)
                    .map_err(|e| {
                        RuntimeError::run(
                            ErrorType::InvalidState,
                            ErrorDetail::NetworkActivations,
                            e.to_string(),
                        )
                    })?;
                obs.on_post_node(&event, view);
            }
        }
    }
    Ok(())
}
