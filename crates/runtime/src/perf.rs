// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! System performance harness.
//!
//! Fills the input with seeded random values, runs the network repeatedly,
//! and reports the mean duration, cycles per MACC, activation usage and,
//! with the observer enabled, a per-node breakdown.

use crate::engine::{NodeInfo, Ready};
use crate::executor::Kernels;
use crate::metrics::{NodeBreakdown, NodeTiming, PerfReport};
use crate::profiler::{CycleCounter, Profiler};
use crate::{EventMask, ExecSession, Network, RuntimeConfig, RuntimeError};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tensor_core::DType;

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfOptions {
    pub iterations: usize,
    pub profiling: bool,
    pub profiling_factor: usize,
    pub observer: bool,
    pub seed: u64,
}

impl PerfOptions {
    pub fn from_config(config: &RuntimeConfig, profiling: bool) -> Self {
        Self {
            iterations: config.iterations,
            profiling,
            profiling_factor: config.profiling_factor,
            observer: config.observer,
            seed: config.seed,
        }
    }

    /// Iterations actually executed.
    pub fn effective_iterations(&self) -> usize {
        if self.profiling {
            self.iterations.saturating_mul(self.profiling_factor)
        } else {
            self.iterations
        }
    }
}

impl Default for PerfOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default(), false)
    }
}

/// Fills `buf` with uniform values in `[-1, 1]` encoded as `dtype`.
///
/// Integer formats are scaled by 127; booleans are 1 where the scaled value
/// is positive.
pub fn fill_random(rng: &mut impl Rng, dtype: DType, buf: &mut [u8]) {
    match dtype {
        DType::F32 => {
            for chunk in buf.chunks_exact_mut(4) {
                let v: f32 = rng.random_range(-1.0..=1.0);
                chunk.copy_from_slice(&v.to_le_bytes());
            }
        }
        DType::I8 | DType::U8 | DType::Bool => {
            for b in buf.iter_mut() {
                let v: f32 = rng.random_range(-1.0..=1.0);
                let q = (v * 127.0) as i8;
                *b = if dtype == DType::Bool {
                    u8::from(q > 0)
                } else {
                    q as u8
                };
            }
        }
    }
}

/// Runs the performance harness on a ready network.
///
/// The observer is skipped with a warning if its bookkeeping cannot be
/// allocated; inference still proceeds.
pub fn run_perf<C: CycleCounter + Clone>(
    network: &mut Network<'_, Ready>,
    kernels: &dyn Kernels,
    clock: C,
    options: &PerfOptions,
) -> Result<PerfReport, RuntimeError> {
    let report = network.report();
    let niter = options.effective_iterations();
    if niter == 0 {
        return Err(RuntimeError::Config("iterations must be at least 1".into()));
    }
    tracing::info!(
        model = %report.model_name,
        iterations = niter,
        profiling = options.profiling,
        "running performance test with random inputs"
    );

    let mut profiler = if options.observer {
        match Profiler::new(clock.clone(), report.n_nodes) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "observer unavailable, profiling skipped");
                None
            }
        }
    } else {
        None
    };

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(options.seed);
    let mut input = vec![0u8; report.input.size_bytes()];
    let mut output = vec![0u8; report.output.size_bytes()];
    network.paint_activations();

    let mut total: u64 = 0;
    {
        let mut session = ExecSession::with_kernels(network, kernels);
        if let Some(p) = profiler.as_mut() {
            session.register(p, EventMask::ALL)?;
        }
        for iter in 0..niter {
            fill_random(&mut rng, report.input.dtype, &mut input);
            let start = clock.now();
            session.run(&input, &mut output)?;
            let elapsed = clock.now().saturating_sub(start);
            total += elapsed;
            tracing::trace!(iter, ticks = elapsed, "inference");
        }
        session.close();
    }

    let user_ticks = profiler.as_ref().map_or(0, Profiler::user_ticks);
    let mean_ticks = total.saturating_sub(user_ticks) / niter as u64;

    let breakdown = profiler.map(|p| breakdown(network, &clock, p));

    let perf = PerfReport {
        model_name: report.model_name,
        iterations: niter,
        profiling: options.profiling,
        mean_ticks,
        ticks_per_second: clock.ticks_per_second(),
        n_macc: report.n_macc,
        activations: network.activation_usage(),
        breakdown,
    };
    tracing::info!(
        duration_ms = perf.duration_ms(),
        cycles_per_macc = perf.cycles_per_macc(),
        "performance test complete"
    );
    Ok(perf)
}

fn breakdown<C: CycleCounter>(
    network: &Network<'_, Ready>,
    clock: &C,
    profiler: Profiler<C>,
) -> NodeBreakdown {
    let runs = u64::from(profiler.runs().max(1));
    let kernel = profiler.kernel_ticks();
    let mut nodes = Vec::with_capacity(profiler.num_nodes());

    let mut cursor = NodeInfo::default();
    while network.node_info(&mut cursor) {
        if let (Some(layer_type), stat) = (cursor.layer_type, profiler.node(cursor.index)) {
            let (mean, ticks) = stat.map_or((0, 0), |s| (s.mean_ticks(), s.ticks));
            let percent = if kernel == 0 {
                0.0
            } else {
                ticks as f64 * 100.0 / kernel as f64
            };
            nodes.push(NodeTiming {
                c_id: cursor.index,
                layer_type,
                id: cursor.id,
                mean_ms: clock.ticks_to_ms(mean),
                percent,
            });
        }
        cursor.index += 1;
    }

    let kernel_ms = clock.ticks_to_ms(kernel / runs);
    let user_ms = clock.ticks_to_ms(profiler.user_ticks() / runs);
    NodeBreakdown {
        kernel_ms,
        user_ms,
        nodes,
        heap: profiler.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageSource;
    use crate::executor::ReferenceKernels;
    use crate::profiler::MonotonicClock;
    use model_ir::builtin;

    #[test]
    fn test_fill_random_formats() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut f = [0u8; 40];
        fill_random(&mut rng, DType::F32, &mut f);
        for c in f.chunks_exact(4) {
            let v = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            assert!((-1.0..=1.0).contains(&v));
        }

        let mut b = [7u8; 64];
        fill_random(&mut rng, DType::Bool, &mut b);
        assert!(b.iter().all(|&x| x <= 1));
    }

    #[test]
    fn test_fill_random_is_seeded() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut Xoshiro256PlusPlus::seed_from_u64(3), DType::I8, &mut a);
        fill_random(&mut Xoshiro256PlusPlus::seed_from_u64(3), DType::I8, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_run_perf_builtin() {
        let bytes = builtin::connect4_image().unwrap();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        let options = PerfOptions {
            iterations: 4,
            ..Default::default()
        };
        let report = run_perf(&mut net, &ReferenceKernels, MonotonicClock::new(), &options).unwrap();
        assert_eq!(report.iterations, 4);
        assert_eq!(report.n_macc, 25_807);
        assert_eq!(report.activations.used, 988);
        let b = report.breakdown.unwrap();
        assert_eq!(b.nodes.len(), 5);
        assert_eq!(b.heap.current_bytes, 0);
        let pct: f64 = b.nodes.iter().map(|n| n.percent).sum();
        assert!(pct == 0.0 || (pct - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_profiling_multiplies_iterations() {
        let options = PerfOptions {
            iterations: 16,
            profiling: true,
            profiling_factor: 5,
            observer: false,
            seed: 3,
        };
        assert_eq!(options.effective_iterations(), 80);

        let huge = PerfOptions {
            iterations: usize::MAX,
            ..options
        };
        assert_eq!(huge.effective_iterations(), usize::MAX);
    }
}
