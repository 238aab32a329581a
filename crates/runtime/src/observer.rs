// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Node execution observer interface.
//!
//! The run loop depends only on [`NodeObserver`]; profilers, validation
//! capture and tests implement it. Callbacks run synchronously on the
//! executing thread between node computations and never alter the numeric
//! results.

use model_ir::LayerType;
use std::ops::BitOr;
use tensor_core::TensorView;

/// Static metadata of the node an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    /// Position in the chain (`c_id`).
    pub index: usize,
    pub layer_type: LayerType,
    /// User-visible node id.
    pub id: u16,
    /// Set on the first node of the chain.
    pub first: bool,
    /// Set on the last node of the chain.
    pub last: bool,
}

/// Which events an observer receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const PRE_NODE: EventMask = EventMask(0x01);
    pub const POST_NODE: EventMask = EventMask(0x02);
    pub const ALL: EventMask = EventMask(0x03);

    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// Instrumentation hook fired around every node of a run.
pub trait NodeObserver {
    /// Called before the node's kernel runs.
    fn on_pre_node(&mut self, _event: &NodeEvent) {}

    /// Called after the node's kernel has written `output`.
    fn on_post_node(&mut self, _event: &NodeEvent, _output: TensorView<'_>) {}
}

/// Counts callbacks; useful as a cheap observer in tests and benches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventCounter {
    pub pre: usize,
    pub post: usize,
    pub first_seen: usize,
    pub last_seen: usize,
}

impl NodeObserver for EventCounter {
    fn on_pre_node(&mut self, event: &NodeEvent) {
        self.pre += 1;
        if event.first {
            self.first_seen += 1;
        }
    }

    fn on_post_node(&mut self, event: &NodeEvent, _output: TensorView<'_>) {
        self.post += 1;
        if event.last {
            self.last_seen += 1;
        }
    }
}
