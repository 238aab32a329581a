// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Heap accounting and arena high-water marks.
//!
//! The inference path itself never allocates. The only heap user is the
//! observer bookkeeping, and [`HeapStats`] tracks it so the performance
//! report can state how much the instrumentation cost. [`HighWaterMark`]
//! measures how much of the activation arena a run actually touched.

/// Cumulative statistics about heap usage by instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeapStats {
    /// Number of successful allocations.
    pub allocations: u64,
    /// Number of releases.
    pub deallocations: u64,
    /// Number of allocation requests that could not be satisfied.
    pub failures: u64,
    /// Bytes currently held.
    pub current_bytes: usize,
    /// Highest value of `current_bytes` observed.
    pub peak_bytes: usize,
}

impl HeapStats {
    pub fn record_alloc(&mut self, size: usize) {
        self.allocations += 1;
        self.current_bytes += size;
        if self.current_bytes > self.peak_bytes {
            self.peak_bytes = self.current_bytes;
        }
    }

    pub fn record_free(&mut self, size: usize) {
        self.deallocations += 1;
        self.current_bytes = self.current_bytes.saturating_sub(size);
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "heap: {} allocs, {} frees, {} failures, {} bytes in use, peak {} bytes",
            self.allocations,
            self.deallocations,
            self.failures,
            self.current_bytes,
            self.peak_bytes,
        )
    }
}

/// Fill pattern written into a region before measuring how much of it is used.
pub const PAINT_PATTERN: u8 = 0xA5;

/// Paint-and-scan usage measurement for a caller-owned region.
///
/// The region is filled with [`PAINT_PATTERN`] before a run; afterwards the
/// highest byte no longer holding the pattern marks the used extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct HighWaterMark {
    pub size: usize,
    pub used: usize,
}

impl HighWaterMark {
    pub fn paint(region: &mut [u8]) {
        region.fill(PAINT_PATTERN);
    }

    pub fn scan(region: &[u8]) -> Self {
        let used = region
            .iter()
            .rposition(|&b| b != PAINT_PATTERN)
            .map_or(0, |i| i + 1);
        Self {
            size: region.len(),
            used,
        }
    }

    /// Used extent as a percentage of the region.
    pub fn percent(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.used as f64 / self.size as f64 * 100.0
    }
}
