// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Network instance lifecycle with type-state–enforced transitions.
//!
//! ```text
//!   image bytes
//!       │  Network::create()      (LoadError)
//!       ▼
//!   Network<Created>
//!       │  .init(activations)     (InitError, instance consumed)
//!       ▼
//!   Network<Ready> ──► .run() ──► batch = 1   (RunError, instance kept)
//!       │
//!       ▼  .destroy()
//! ```
//!
//! Each transition consumes the old value, so a half-initialised instance
//! can never be observed and a destroyed one can never be used.

use crate::error::{ErrorCode, ErrorDetail, ErrorType};
use crate::executor::{self, Kernels, ReferenceKernels, Registered};
use crate::{EventMask, NodeObserver, RuntimeError};
use memory_manager::{
    validate_aliasing, ActivationArena, ArenaKind, HighWaterMark, MemoryBudget, WeightsArena,
};
use model_ir::graph::Validated;
use model_ir::image::required_region;
use model_ir::{LayerType, LoadMode, ModelGraph, NetworkImage};
use tensor_core::TensorDesc;

// ── Type-state markers ─────────────────────────────────────────

/// Image loaded and graph resolved; no arenas bound yet.
#[derive(Debug)]
pub struct Created;

/// Arenas bound and validated; `run` is available.
#[derive(Debug)]
pub struct Ready;

/// Sealed trait for network states.
pub trait NetworkState: std::fmt::Debug {}
impl NetworkState for Created {}
impl NetworkState for Ready {}

// ── Image source ───────────────────────────────────────────────

/// Where the compiled image comes from and how it is made available.
#[derive(Debug)]
pub enum ImageSource<'a> {
    /// Use the image bytes in place.
    Xip(&'a [u8]),
    /// Copy the image into `region` and use the copy.
    Copy { image: &'a [u8], region: &'a mut [u8] },
}

impl ImageSource<'_> {
    pub fn mode(&self) -> LoadMode {
        match self {
            ImageSource::Xip(_) => LoadMode::Xip,
            ImageSource::Copy { .. } => LoadMode::Copy,
        }
    }
}

// ── Report and introspection ───────────────────────────────────

/// Static description of a loaded network.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NetworkReport {
    pub model_name: String,
    pub model_signature: String,
    pub tool_version: [u8; 3],
    pub load_mode: LoadMode,
    pub n_nodes: usize,
    pub n_macc: u64,
    pub input: TensorDesc,
    pub output: TensorDesc,
    pub activations_size: usize,
    pub weights_size: usize,
}

impl NetworkReport {
    /// Returns a multi-line summary suitable for a console.
    pub fn summary(&self) -> String {
        let [major, minor, patch] = self.tool_version;
        format!(
            "model name      : {}\n\
             model signature : {}\n\
             tool version    : {major}.{minor}.{patch}\n\
             load mode       : {}\n\
             complexity      : {} MACC\n\
             c-nodes         : {}\n\
             input           : {} {}\n\
             output          : {} {}\n\
             activations     : {} bytes\n\
             weights         : {} bytes",
            self.model_name,
            self.model_signature,
            self.load_mode,
            self.n_macc,
            self.n_nodes,
            self.input.dtype.as_str(),
            self.input.shape,
            self.output.dtype.as_str(),
            self.output.shape,
            self.activations_size,
            self.weights_size,
        )
    }
}

/// Cursor for [`Network::node_info`].
///
/// Set `index` to 0 to start; the caller advances it after every
/// successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub index: usize,
    pub layer_type: Option<LayerType>,
    pub id: u16,
    pub name: String,
}

// ── Network ────────────────────────────────────────────────────

/// One network instance bound to caller-owned memory.
///
/// `S` is a type-state marker. `run` only exists on `Network<Ready>`.
pub struct Network<'a, S: NetworkState = Created> {
    image: NetworkImage<'a>,
    mode: LoadMode,
    activations: Option<ActivationArena<'a>>,
    last_error: ErrorCode,
    _state: std::marker::PhantomData<S>,
}

impl<S: NetworkState> std::fmt::Debug for Network<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.image.graph.name)
            .field("mode", &self.mode)
            .field("bound", &self.activations.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}

// ── → Created ──────────────────────────────────────────────────

impl<'a> Network<'a, Created> {
    /// Loads an image and resolves the graph.
    ///
    /// # Errors
    /// [`RuntimeError::Load`] if the copy region is too small, the image is
    /// malformed or the checksum does not match.
    pub fn create(source: ImageSource<'a>, check_crc: bool) -> Result<Self, RuntimeError> {
        let mode = source.mode();
        let bytes: &'a [u8] = match source {
            ImageSource::Xip(image) => image,
            ImageSource::Copy { image, region } => {
                let needed = required_region(LoadMode::Copy, image.len());
                if region.len() < needed {
                    return Err(RuntimeError::load(
                        ErrorType::InvalidSize,
                        ErrorDetail::Network,
                        format!(
                            "copy region is {} bytes, image needs {needed}",
                            region.len()
                        ),
                    ));
                }
                region[..needed].copy_from_slice(image);
                let region: &'a [u8] = region;
                &region[..needed]
            }
        };

        let image = NetworkImage::parse(bytes, check_crc).map_err(|e| {
            let kind = match e {
                model_ir::ModelError::CrcMismatch { .. } => ErrorType::InvalidSignature,
                model_ir::ModelError::Truncated { .. } => ErrorType::InvalidSize,
                _ => ErrorType::CreateFailed,
            };
            RuntimeError::load(kind, ErrorDetail::Network, e.to_string())
        })?;

        tracing::info!(
            name = %image.graph.name,
            %mode,
            nodes = image.graph.num_layers(),
            "network created"
        );
        Ok(Self {
            image,
            mode,
            activations: None,
            last_error: ErrorCode::NONE,
            _state: std::marker::PhantomData,
        })
    }

    /// Binds the activation arena and validates the arena map.
    ///
    /// On failure the instance is dropped; the caller must start again from
    /// [`Network::create`].
    ///
    /// # Errors
    /// [`RuntimeError::Init`] if the arena is smaller than declared, two
    /// live tensors alias, or a node's input overlaps its output.
    pub fn init(self, activations: &'a mut [u8]) -> Result<Network<'a, Ready>, RuntimeError> {
        let graph = &self.image.graph;
        let init_failed = |e: memory_manager::MemoryError| {
            tracing::error!(name = %graph.name, error = %e, "network init failed");
            RuntimeError::init(ErrorType::InitFailed, ErrorDetail::NetworkActivations, e.to_string())
        };

        MemoryBudget::from_bytes(activations.len())
            .check(ArenaKind::Activations, graph.activations_size)
            .map_err(init_failed)?;
        if self.image.weights.len() != graph.weights_size {
            return Err(RuntimeError::init(
                ErrorType::InitFailed,
                ErrorDetail::NetworkWeights,
                format!(
                    "weights are {} bytes, network declares {}",
                    self.image.weights.len(),
                    graph.weights_size
                ),
            ));
        }
        validate_aliasing(&graph.live_ranges()).map_err(init_failed)?;
        for layer in graph.iter_layers() {
            let (Some(i), Some(o)) = (graph.slot(layer.inputs[0]), graph.slot(layer.outputs[0]))
            else {
                continue;
            };
            if i.overlaps(&o) {
                return Err(init_failed(memory_manager::MemoryError::InOutOverlap));
            }
        }

        tracing::info!(
            name = %graph.name,
            arena = activations.len(),
            required = graph.activations_size,
            "network initialised"
        );
        Ok(Network {
            image: self.image,
            mode: self.mode,
            activations: Some(ActivationArena::new(activations)),
            last_error: ErrorCode::NONE,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Ready ──────────────────────────────────────────────────────

impl<'a> Network<'a, Ready> {
    /// Runs one inference with the reference kernels.
    ///
    /// `input` and `output` must be exactly the declared I/O tensor sizes.
    /// Returns the batch count, which is always 1.
    pub fn run(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, RuntimeError> {
        self.run_with(&ReferenceKernels, None, input, output)
    }

    /// Runs one inference, delivering node events to `observer`.
    pub fn run_observed(
        &mut self,
        observer: &mut dyn NodeObserver,
        mask: EventMask,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, RuntimeError> {
        self.run_with(&ReferenceKernels, Some((observer, mask)), input, output)
    }

    /// Runs one inference with explicit kernels and an optional observer.
    ///
    /// On failure the error code is kept as the last error and the output
    /// buffer is left undefined. The instance stays usable.
    pub fn run_with(
        &mut self,
        kernels: &dyn Kernels,
        observer: Registered<'_>,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, RuntimeError> {
        let result = self.run_inner(kernels, observer, input, output);
        match &result {
            Ok(_) => self.last_error = ErrorCode::NONE,
            Err(e) => {
                self.last_error = e.code();
                tracing::warn!(name = %self.image.graph.name, error = %e, "run aborted");
            }
        }
        result
    }

    fn run_inner(
        &mut self,
        kernels: &dyn Kernels,
        observer: Registered<'_>,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, RuntimeError> {
        let graph = &self.image.graph;
        let in_len = graph.input().size_bytes();
        let out_len = graph.output().size_bytes();
        if input.len() != in_len {
            return Err(RuntimeError::run(
                ErrorType::InvalidInput,
                ErrorDetail::InvalidSize,
                format!("input is {} bytes, expected {in_len}", input.len()),
            ));
        }
        if output.len() != out_len {
            return Err(RuntimeError::run(
                ErrorType::InvalidOutput,
                ErrorDetail::InvalidSize,
                format!("output is {} bytes, expected {out_len}", output.len()),
            ));
        }
        let arena = self.activations.as_mut().ok_or_else(|| {
            RuntimeError::run(
                ErrorType::InvalidState,
                ErrorDetail::NetworkActivations,
                "activation arena not bound",
            )
        })?;
        let in_slot = graph.slot(graph.input_id());
        let out_slot = graph.slot(graph.output_id());
        let (Some(in_slot), Some(out_slot)) = (in_slot, out_slot) else {
            return Err(RuntimeError::run(
                ErrorType::InvalidState,
                ErrorDetail::Tensor,
                "network I/O tensors are not bound",
            ));
        };

        let unbound = |e: memory_manager::MemoryError| {
            RuntimeError::run(ErrorType::InvalidState, ErrorDetail::Tensor, e.to_string())
        };
        arena.bytes_mut(in_slot).map_err(unbound)?.copy_from_slice(input);

        executor::execute(
            graph,
            WeightsArena::new(self.image.weights),
            arena,
            kernels,
            observer,
        )?;

        output.copy_from_slice(arena.bytes(out_slot).map_err(unbound)?);
        tracing::debug!(name = %graph.name, "run complete");
        Ok(1)
    }

    /// Fills the activation arena with the paint pattern.
    pub fn paint_activations(&mut self) {
        if let Some(arena) = self.activations.as_mut() {
            HighWaterMark::paint(arena.as_bytes_mut());
        }
    }

    /// How much of the activation arena has been written since the last paint.
    pub fn activation_usage(&self) -> HighWaterMark {
        self.activations
            .as_ref()
            .map(|a| HighWaterMark::scan(a.as_bytes()))
            .unwrap_or_default()
    }
}

// ── Any state ──────────────────────────────────────────────────

impl<'a, S: NetworkState> Network<'a, S> {
    pub fn graph(&self) -> &ModelGraph<Validated> {
        &self.image.graph
    }

    pub fn load_mode(&self) -> LoadMode {
        self.mode
    }

    /// Code of the most recent failure, or [`ErrorCode::NONE`].
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    pub fn report(&self) -> NetworkReport {
        let graph = &self.image.graph;
        NetworkReport {
            model_name: graph.name.clone(),
            model_signature: graph.signature.clone(),
            tool_version: self.image.tool_version,
            load_mode: self.mode,
            n_nodes: graph.num_layers(),
            n_macc: graph.total_macc(),
            input: graph.input().desc.clone(),
            output: graph.output().desc.clone(),
            activations_size: graph.activations_size,
            weights_size: graph.weights_size,
        }
    }

    /// Fills `cursor` with the metadata of node `cursor.index`.
    ///
    /// Returns `false` once the index is past the last node.
    pub fn node_info(&self, cursor: &mut NodeInfo) -> bool {
        match self.image.graph.layer(cursor.index) {
            Some(layer) => {
                cursor.layer_type = Some(layer.layer_type);
                cursor.id = layer.id;
                cursor.name.clone_from(&layer.name);
                true
            }
            None => {
                cursor.layer_type = None;
                false
            }
        }
    }

    /// Tears the instance down.
    pub fn destroy(self) {
        tracing::info!(name = %self.image.graph.name, "network destroyed");
    }
}

/// Destroys the instance held by `handle`, leaving `None`.
///
/// Destroying an empty handle does nothing.
pub fn destroy<S: NetworkState>(handle: &mut Option<Network<'_, S>>) {
    if let Some(network) = handle.take() {
        network.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::builtin;

    fn image() -> Vec<u8> {
        builtin::connect4_image().unwrap()
    }

    #[test]
    fn test_create_xip() {
        let bytes = image();
        let net = Network::create(ImageSource::Xip(&bytes), true).unwrap();
        assert_eq!(net.load_mode(), LoadMode::Xip);
        assert_eq!(net.report().n_nodes, 5);
        assert!(net.last_error().is_none());
    }

    #[test]
    fn test_create_copy_region_too_small() {
        let bytes = image();
        let mut region = vec![0u8; bytes.len() - 1];
        let err = Network::create(
            ImageSource::Copy {
                image: &bytes,
                region: &mut region,
            },
            true,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Load { .. }));
        assert_eq!(err.code().kind, ErrorType::InvalidSize);
    }

    #[test]
    fn test_create_bad_crc() {
        let mut bytes = image();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = Network::create(ImageSource::Xip(&bytes), true).unwrap_err();
        assert_eq!(err.code().kind, ErrorType::InvalidSignature);
    }

    #[test]
    fn test_init_arena_too_small() {
        let bytes = image();
        let mut acts = vec![0u8; 987];
        let net = Network::create(ImageSource::Xip(&bytes), true).unwrap();
        let err = net.init(&mut acts).unwrap_err();
        assert!(matches!(err, RuntimeError::Init { .. }));
        assert_eq!(err.code().detail, ErrorDetail::NetworkActivations);
    }

    #[test]
    fn test_run_rejects_wrong_sizes() {
        let bytes = image();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();

        let mut out = [0u8; 28];
        let err = net.run(&[0u8; 12], &mut out).unwrap_err();
        assert_eq!(err.code().kind, ErrorType::InvalidInput);
        assert_eq!(net.last_error().kind, ErrorType::InvalidInput);

        let mut short = [0u8; 4];
        let err = net.run(&[0u8; 588], &mut short).unwrap_err();
        assert_eq!(err.code().kind, ErrorType::InvalidOutput);

        // the instance survives a failed run
        assert_eq!(net.run(&[0u8; 588], &mut out).unwrap(), 1);
        assert!(net.last_error().is_none());
    }

    #[test]
    fn test_copy_and_xip_agree() {
        let bytes = image();
        let input: Vec<u8> = (0..147)
            .flat_map(|i| ((i % 3) as f32).to_le_bytes())
            .collect();

        let mut acts = vec![0u8; 988];
        let mut xip = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        let mut a = [0u8; 28];
        xip.run(&input, &mut a).unwrap();

        let mut region = vec![0u8; bytes.len()];
        let mut acts2 = vec![0u8; 988];
        let mut copy = Network::create(
            ImageSource::Copy {
                image: &bytes,
                region: &mut region,
            },
            true,
        )
        .unwrap()
        .init(&mut acts2)
        .unwrap();
        let mut b = [0u8; 28];
        copy.run(&input, &mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(copy.load_mode(), LoadMode::Copy);
    }

    #[test]
    fn test_node_info_cursor() {
        let bytes = image();
        let net = Network::create(ImageSource::Xip(&bytes), true).unwrap();
        let mut cursor = NodeInfo::default();
        let mut seen = Vec::new();
        while net.node_info(&mut cursor) {
            seen.push((cursor.index, cursor.layer_type, cursor.id));
            cursor.index += 1;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[1], (1, Some(LayerType::Relu), 2));

        // restartable from zero
        cursor.index = 0;
        assert!(net.node_info(&mut cursor));
        assert_eq!(cursor.name, "fc1");
    }

    #[test]
    fn test_high_water_mark() {
        let bytes = image();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        net.paint_activations();
        assert_eq!(net.activation_usage().used, 0);
        let mut out = [0u8; 28];
        net.run(&[0u8; 588], &mut out).unwrap();
        assert_eq!(net.activation_usage().used, 988);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let bytes = image();
        let mut handle = Some(Network::create(ImageSource::Xip(&bytes), true).unwrap());
        destroy(&mut handle);
        assert!(handle.is_none());
        destroy(&mut handle);
        assert!(handle.is_none());
    }

    #[test]
    fn test_report_summary() {
        let bytes = image();
        let net = Network::create(ImageSource::Xip(&bytes), true).unwrap();
        let s = net.report().summary();
        assert!(s.contains("python_model"));
        assert!(s.contains("25807 MACC"));
        assert!(s.contains("f32 [1, 147]"));
    }
}
