// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! A minimal representation of an ahead-of-time compiled network: a fixed
//! chain of typed layers over statically placed tensors.
//!
//! - [`LayerType`] / [`LayerDef`] — one node of the chain and its tensor references.
//! - [`TensorDef`] / [`TensorRole`] — the tensor table; the role selects the arena.
//! - [`ModelGraph`] — the chain with a **type-state pattern** (`Loaded` → `Validated`).
//! - [`NetworkImage`] — the compact binary form, with CRC-32 integrity check,
//!   usable in place ([`LoadMode::Xip`]) or after copying ([`LoadMode::Copy`]).
//! - [`ModelManifest`] — the JSON descriptor that compiles into an image.
//! - [`builtin`] — the Connect-4 network shipped with the runtime.
//!
//! # Example
//! ```
//! use model_ir::{builtin, NetworkImage};
//!
//! let bytes = builtin::connect4_image().unwrap();
//! let image = NetworkImage::parse(&bytes, true).unwrap();
//! println!("{}", image.graph.summary());
//! for layer in image.graph.iter_layers() {
//!     println!("  {}", layer.summary(&image.graph.tensors));
//! }
//! ```

pub mod builtin;
mod error;
pub mod graph;
pub mod image;
mod layer;
pub mod manifest;

pub use error::ModelError;
pub use graph::ModelGraph;
pub use image::{LoadMode, NetworkImage};
pub use layer::{LayerDef, LayerType, TensorDef, TensorRole};
pub use manifest::ModelManifest;
