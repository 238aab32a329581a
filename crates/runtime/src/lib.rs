// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Loads a compiled network image, binds it to caller-provided memory and
//! runs inference node by node.
//!
//! The runtime takes:
//! - A network image (see `model-ir`), executed in place or copied into a
//!   caller-provided region.
//! - An activations buffer, which must hold the declared arena size.
//!
//! And exposes inference runs, node introspection, per-node observer
//! events, a performance harness and a validation protocol server.
//!
//! # Type-State Lifecycle
//! ```text
//! Network<Created> → init → Network<Ready> → destroy
//! ```
//! Running an uninitialized network does not compile.
//!
//! # Error Reporting
//! Every failure carries an [`ErrorCode`] (type plus detail) that is also
//! recorded as the network's last error, so a failed run leaves the
//! instance usable and inspectable.

mod config;
mod engine;
mod error;
mod executor;
mod metrics;
mod observer;
mod perf;
mod profiler;
mod session;
pub mod transport;

pub use config::RuntimeConfig;
pub use engine::{
    destroy, Created, ImageSource, Network, NetworkReport, NetworkState, NodeInfo, Ready,
};
pub use error::{ErrorCode, ErrorDetail, ErrorType, RuntimeError, WireError};
pub use executor::{Kernels, ReferenceKernels};
pub use metrics::{NodeBreakdown, NodeTiming, PerfReport};
pub use observer::{EventCounter, EventMask, NodeEvent, NodeObserver};
pub use perf::{fill_random, run_perf, PerfOptions};
pub use profiler::{CycleCounter, ManualClock, MonotonicClock, NodeStat, Profiler};
pub use session::ExecSession;
pub use transport::ValidationServer;
