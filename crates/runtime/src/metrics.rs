// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Performance report produced by the system performance harness.

use memory_manager::{HeapStats, HighWaterMark};
use model_ir::LayerType;
use std::fmt;

/// Timing of one node across all profiled runs.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeTiming {
    /// Position in the chain.
    pub c_id: usize,
    pub layer_type: LayerType,
    pub id: u16,
    /// Mean duration per invocation.
    pub mean_ms: f64,
    /// Share of the total kernel time.
    pub percent: f64,
}

/// Observer-derived breakdown of a harness run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeBreakdown {
    /// Mean kernel time per inference.
    pub kernel_ms: f64,
    /// Mean time spent in the observer callbacks per inference.
    pub user_ms: f64,
    pub nodes: Vec<NodeTiming>,
    /// Heap taken by the observer bookkeeping.
    pub heap: HeapStats,
}

impl NodeBreakdown {
    /// Sum of the per-node means.
    pub fn total_ms(&self) -> f64 {
        self.nodes.iter().map(|n| n.mean_ms).sum()
    }
}

/// Aggregated results of the performance harness.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerfReport {
    pub model_name: String,
    pub iterations: usize,
    pub profiling: bool,
    /// Mean ticks per inference, after removing callback overhead.
    pub mean_ticks: u64,
    pub ticks_per_second: u64,
    pub n_macc: u64,
    pub activations: HighWaterMark,
    pub breakdown: Option<NodeBreakdown>,
}

impl PerfReport {
    pub fn duration_ms(&self) -> f64 {
        if self.ticks_per_second == 0 {
            return 0.0;
        }
        self.mean_ticks as f64 * 1000.0 / self.ticks_per_second as f64
    }

    /// Mean ticks per multiply-accumulate.
    pub fn cycles_per_macc(&self) -> f64 {
        if self.n_macc == 0 {
            return 0.0;
        }
        self.mean_ticks as f64 / self.n_macc as f64
    }
}

/// Multi-line console report.
impl fmt::Display for PerfReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Results for \"{}\", {} inferences (complexity: {} MACC){}",
            self.model_name,
            self.iterations,
            self.n_macc,
            if self.profiling { " [profiling]" } else { "" },
        )?;
        writeln!(f, " duration     : {:.3} ms (average)", self.duration_ms())?;
        writeln!(f, " CPU cycles   : {} (average)", self.mean_ticks)?;
        writeln!(
            f,
            " cycles/MACC  : {:.2} (average for all layers)",
            self.cycles_per_macc()
        )?;
        writeln!(
            f,
            " activations  : {} of {} bytes used ({:.1}%)",
            self.activations.used,
            self.activations.size,
            self.activations.percent()
        )?;

        if let Some(b) = &self.breakdown {
            writeln!(
                f,
                " observer res : {} bytes used from the heap ({} c-nodes)",
                b.heap.peak_bytes,
                b.nodes.len()
            )?;
            writeln!(f)?;
            writeln!(f, " Inference time by c-node")?;
            writeln!(f, "  kernel  : {:.3}ms (time passed in the c-kernel fcts)", b.kernel_ms)?;
            writeln!(f, "  user    : {:.3}ms (time passed in the user cb)", b.user_ms)?;
            writeln!(f)?;
            writeln!(f, " {:<6}{:<20}{:<7}  time (ms)", "c_id", "type", "id")?;
            writeln!(f, " {}", "-".repeat(51))?;
            for n in &b.nodes {
                writeln!(
                    f,
                    " {:<6}{:<20}{:<5} {:>10.3} {:>6.2} %",
                    n.c_id,
                    n.layer_type.as_str(),
                    n.id,
                    n.mean_ms,
                    n.percent
                )?;
            }
            writeln!(f, " {}", "-".repeat(51))?;
            writeln!(f, " {:>31} {:>10.3} ms", "", b.total_ms())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(breakdown: Option<NodeBreakdown>) -> PerfReport {
        PerfReport {
            model_name: "python_model".into(),
            iterations: 16,
            profiling: false,
            mean_ticks: 51_614,
            ticks_per_second: 1_000_000,
            n_macc: 25_807,
            activations: HighWaterMark {
                size: 988,
                used: 988,
            },
            breakdown,
        }
    }

    #[test]
    fn test_derived_figures() {
        let r = report(None);
        assert!((r.duration_ms() - 51.614).abs() < 1e-9);
        assert!((r.cycles_per_macc() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_guards() {
        let mut r = report(None);
        r.ticks_per_second = 0;
        r.n_macc = 0;
        assert_eq!(r.duration_ms(), 0.0);
        assert_eq!(r.cycles_per_macc(), 0.0);
    }

    #[test]
    fn test_display_with_nodes() {
        let b = NodeBreakdown {
            kernel_ms: 0.5,
            user_ms: 0.01,
            nodes: vec![
                NodeTiming {
                    c_id: 0,
                    layer_type: LayerType::Dense,
                    id: 1,
                    mean_ms: 0.4,
                    percent: 80.0,
                },
                NodeTiming {
                    c_id: 1,
                    layer_type: LayerType::Relu,
                    id: 2,
                    mean_ms: 0.1,
                    percent: 20.0,
                },
            ],
            heap: HeapStats::default(),
        };
        assert!((b.total_ms() - 0.5).abs() < 1e-9);
        let s = report(Some(b)).to_string();
        assert!(s.contains("Inference time by c-node"));
        assert!(s.contains("Dense"));
        assert!(s.contains("NL"));
        assert!(s.contains("80.00 %"));
    }

    #[test]
    fn test_display_without_observer() {
        let s = report(None).to_string();
        assert!(s.contains("cycles/MACC  : 2.00"));
        assert!(!s.contains("c-node"));
    }
}
