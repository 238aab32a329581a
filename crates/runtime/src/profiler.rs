// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-node cycle accounting.
//!
//! The [`Profiler`] times its own callbacks. On entry it stamps `ts`; on a
//! post-node event the node is charged `ts - start` where `start` is the exit
//! stamp of the previous callback. On exit it stamps a new `start` and adds
//! `start - ts` to the callback overhead. Node durations therefore exclude
//! callback time, and the overhead is reported separately so the harness can
//! subtract it from the aggregate.

use crate::{NodeEvent, NodeObserver, RuntimeError};
use memory_manager::HeapStats;
use model_ir::LayerType;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;
use tensor_core::TensorView;

/// A free-running tick source.
pub trait CycleCounter {
    fn now(&self) -> u64;

    /// Tick rate used to convert ticks to wall-clock time.
    fn ticks_per_second(&self) -> u64;

    fn ticks_to_ms(&self, ticks: u64) -> f64 {
        ticks as f64 * 1000.0 / self.ticks_per_second() as f64
    }
}

/// Nanosecond ticks from the host monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000_000
    }
}

/// A clock that only moves when told to. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ticks: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: u64) {
        self.ticks.set(self.ticks.get() + ticks);
    }
}

impl CycleCounter for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.get()
    }

    /// One tick per microsecond.
    fn ticks_per_second(&self) -> u64 {
        1_000_000
    }
}

/// Accumulated statistics for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    pub layer_type: LayerType,
    pub id: u16,
    pub ticks: u64,
    pub runs: u32,
}

impl NodeStat {
    /// Mean ticks per invocation; zero for a node that never ran.
    pub fn mean_ticks(&self) -> u64 {
        if self.runs == 0 {
            0
        } else {
            self.ticks / u64::from(self.runs)
        }
    }
}

type UserHook = Box<dyn FnMut(&NodeEvent)>;

/// Timing observer.
pub struct Profiler<C: CycleCounter> {
    clock: C,
    nodes: Vec<Option<NodeStat>>,
    callbacks: u64,
    start: u64,
    kernel_ticks: u64,
    user_ticks: u64,
    heap: HeapStats,
    hook: Option<UserHook>,
}

impl<C: CycleCounter> Profiler<C> {
    /// Creates a profiler for a chain of `n_nodes` nodes.
    ///
    /// # Errors
    /// [`RuntimeError::Observer`] if the per-node table cannot be allocated.
    pub fn new(clock: C, n_nodes: usize) -> Result<Self, RuntimeError> {
        let mut heap = HeapStats::default();
        let mut nodes = Vec::new();
        if nodes.try_reserve_exact(n_nodes).is_err() {
            heap.record_failure();
            return Err(RuntimeError::Observer(format!(
                "unable to allocate statistics for {n_nodes} nodes"
            )));
        }
        nodes.resize(n_nodes, None);
        heap.record_alloc(n_nodes * std::mem::size_of::<Option<NodeStat>>());

        let start = clock.now();
        Ok(Self {
            clock,
            nodes,
            callbacks: 0,
            start,
            kernel_ticks: 0,
            user_ticks: 0,
            heap,
            hook: None,
        })
    }

    /// Runs `hook` inside every callback. Its cost is counted as callback
    /// overhead.
    pub fn with_hook(mut self, hook: impl FnMut(&NodeEvent) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    fn record(&mut self, event: &NodeEvent, post: bool) {
        let ts = self.clock.now();
        self.callbacks += 1;

        if post {
            let elapsed = ts.saturating_sub(self.start);
            self.kernel_ticks += elapsed;
            if let Some(slot) = self.nodes.get_mut(event.index) {
                let stat = slot.get_or_insert(NodeStat {
                    layer_type: event.layer_type,
                    id: event.id,
                    ticks: 0,
                    runs: 0,
                });
                stat.ticks += elapsed;
                stat.runs += 1;
            }
        }
        if let Some(hook) = self.hook.as_mut() {
            hook(event);
        }

        self.start = self.clock.now();
        self.user_ticks += self.start.saturating_sub(ts);
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Statistics of node `index`, or `None` if it never completed.
    pub fn node(&self, index: usize) -> Option<&NodeStat> {
        self.nodes.get(index).and_then(Option::as_ref)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Ticks charged to nodes across all runs.
    pub fn kernel_ticks(&self) -> u64 {
        self.kernel_ticks
    }

    /// Ticks spent inside the callbacks themselves.
    pub fn user_ticks(&self) -> u64 {
        self.user_ticks
    }

    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }

    /// Number of completed runs, taken from the first node.
    pub fn runs(&self) -> u32 {
        self.node(0).map_or(0, |s| s.runs)
    }

    pub fn heap(&self) -> &HeapStats {
        &self.heap
    }

    /// Releases the node table and returns the final heap accounting.
    pub fn finish(mut self) -> HeapStats {
        let bytes = self.nodes.len() * std::mem::size_of::<Option<NodeStat>>();
        self.nodes = Vec::new();
        self.heap.record_free(bytes);
        self.heap
    }
}

impl<C: CycleCounter> NodeObserver for Profiler<C> {
    fn on_pre_node(&mut self, event: &NodeEvent) {
        self.record(event, false);
    }

    fn on_post_node(&mut self, event: &NodeEvent, _output: TensorView<'_>) {
        self.record(event, true);
    }
}

impl<C: CycleCounter> std::fmt::Debug for Profiler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("nodes", &self.nodes.len())
            .field("callbacks", &self.callbacks)
            .field("kernel_ticks", &self.kernel_ticks)
            .field("user_ticks", &self.user_ticks)
            .finish()
    }
}
