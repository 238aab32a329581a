// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Live-range analysis for aliased activation tensors.
//!
//! The activation arena is reused across the forward pass: a layer's output
//! may land on bytes whose previous occupant has already been consumed. The
//! arena map is only sound if no two tensors that share bytes are ever live
//! at the same time.

use crate::{ArenaKind, MemoryError, Slot};

/// The interval of node indices during which a tensor's bytes must be kept.
///
/// `first` is the producing node (0 for network inputs) and `last` is the
/// final consuming node (one past the last node for network outputs, which
/// the caller reads after the run). Both ends are inclusive, so a node's own
/// input and output are always considered simultaneously live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub tensor: usize,
    pub slot: Slot,
    pub first: usize,
    pub last: usize,
}

impl LiveRange {
    fn intersects(&self, other: &LiveRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Checks that every pair of activation tensors sharing bytes has disjoint
/// live ranges.
///
/// Weight slots are ignored: parameters are read-only and never recycled.
pub fn validate_aliasing(ranges: &[LiveRange]) -> Result<(), MemoryError> {
    let acts: Vec<&LiveRange> = ranges
        .iter()
        .filter(|r| r.slot.kind == ArenaKind::Activations && r.slot.len > 0)
        .collect();

    for (i, a) in acts.iter().enumerate() {
        for b in &acts[i + 1..] {
            if a.slot.overlaps(&b.slot) && a.intersects(b) {
                return Err(MemoryError::AliasConflict {
                    first: a.tensor,
                    second: b.tensor,
                });
            }
        }
    }
    tracing::debug!(tensors = acts.len(), "activation alias map validated");
    Ok(())
}

/// Returns the smallest arena size that holds every activation slot.
pub fn required_size(ranges: &[LiveRange]) -> usize {
    ranges
        .iter()
        .filter(|r| r.slot.kind == ArenaKind::Activations)
        .map(|r| r.slot.end())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(tensor: usize, offset: usize, len: usize, first: usize, last: usize) -> LiveRange {
        LiveRange {
            tensor,
            slot: Slot {
                kind: ArenaKind::Activations,
                offset,
                len,
            },
            first,
            last,
        }
    }

    /// The Connect-4 network's activation layout.
    fn connect4_layout() -> Vec<LiveRange> {
        vec![
            act(0, 0, 588, 0, 0),
            act(1, 588, 400, 0, 1),
            act(2, 0, 400, 1, 2),
            act(3, 400, 400, 2, 3),
            act(4, 0, 400, 3, 4),
            act(5, 400, 28, 4, 5),
        ]
    }

    #[test]
    fn test_connect4_layout_is_sound() {
        let layout = connect4_layout();
        validate_aliasing(&layout).unwrap();
        assert_eq!(required_size(&layout), 988);
    }

    #[test]
    fn test_live_overlap_rejected() {
        let mut layout = connect4_layout();
        // relu output moved onto the bytes still holding fc1's output
        layout[2] = act(2, 588, 400, 1, 2);
        let err = validate_aliasing(&layout).unwrap_err();
        assert!(matches!(err, MemoryError::AliasConflict { first: 1, second: 2 }));
    }

    #[test]
    fn test_same_node_in_out_rejected() {
        let layout = vec![act(0, 0, 16, 0, 0), act(1, 8, 16, 0, 1)];
        assert!(validate_aliasing(&layout).is_err());
    }

    #[test]
    fn test_weights_ignored() {
        let mut w = act(9, 0, 588, 0, 5);
        w.slot.kind = ArenaKind::Weights;
        let layout = vec![act(0, 0, 588, 0, 0), w];
        assert!(validate_aliasing(&layout).is_ok());
        assert_eq!(required_size(&layout), 588);
    }
}
