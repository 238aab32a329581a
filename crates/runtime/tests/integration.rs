// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end network lifecycle.
//!
//! These tests drive the built-in Connect-4 network through create → init →
//! run → destroy, check that node timing accounts exactly for observer
//! overhead, and exercise a full validation session over an in-memory
//! stream.

use model_ir::builtin;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use runtime::transport::{self, run_param, tensor_flags, Request, Response, State};
use runtime::{
    destroy, fill_random, run_perf, CycleCounter, ErrorDetail, ErrorType, EventMask,
    ExecSession, ImageSource, Kernels, ManualClock, Network, PerfOptions, Profiler,
    ReferenceKernels, RuntimeError, ValidationServer, WireError,
};
use tensor_core::{DType, TensorError, TensorView, TensorViewMut};

// ── Helpers ────────────────────────────────────────────────────

const IN_BYTES: usize = builtin::INPUT_LEN * 4;
const OUT_BYTES: usize = builtin::OUTPUT_LEN * 4;

/// Reference kernels that advance a manual clock by a fixed step.
struct TickingKernels {
    clock: ManualClock,
    step: u64,
}

impl Kernels for TickingKernels {
    fn dense(
        &self,
        input: &TensorView<'_>,
        weights: &TensorView<'_>,
        bias: Option<&TensorView<'_>>,
        output: &mut TensorViewMut<'_>,
    ) -> Result<(), TensorError> {
        self.clock.advance(self.step);
        ReferenceKernels.dense(input, weights, bias, output)
    }

    fn relu(&self, input: &TensorView<'_>, output: &mut TensorViewMut<'_>) -> Result<(), TensorError> {
        self.clock.advance(self.step);
        ReferenceKernels.relu(input, output)
    }
}

/// Relu kernel that always fails.
struct BrokenRelu;

impl Kernels for BrokenRelu {
    fn dense(
        &self,
        input: &TensorView<'_>,
        weights: &TensorView<'_>,
        bias: Option<&TensorView<'_>>,
        output: &mut TensorViewMut<'_>,
    ) -> Result<(), TensorError> {
        ReferenceKernels.dense(input, weights, bias, output)
    }

    fn relu(&self, _: &TensorView<'_>, _: &mut TensorViewMut<'_>) -> Result<(), TensorError> {
        Err(TensorError::UnsupportedDType {
            op: "relu",
            dtype: DType::F32,
        })
    }
}

fn random_inputs(seed: u64, n: usize) -> Vec<Vec<u8>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut buf = vec![0u8; IN_BYTES];
            fill_random(&mut rng, DType::F32, &mut buf);
            buf
        })
        .collect()
}

/// One full lifecycle: returns the outputs of all runs.
fn lifecycle(image: &[u8], inputs: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let net = Network::create(ImageSource::Xip(image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let mut handle = Some(net);
    let mut outputs = Vec::new();
    if let Some(net) = handle.as_mut() {
        for input in inputs {
            let mut out = vec![0u8; OUT_BYTES];
            assert_eq!(net.run(input, &mut out).unwrap(), 1);
            outputs.push(out);
        }
    }
    destroy(&mut handle);
    destroy(&mut handle);
    assert!(handle.is_none());
    outputs
}

// ── Lifecycle ──────────────────────────────────────────────────

#[test]
fn test_repeated_lifecycles_are_bit_identical() {
    let image = builtin::connect4_image().unwrap();
    let inputs = random_inputs(3, 16);
    let first = lifecycle(&image, &inputs);
    let second = lifecycle(&image, &inputs);
    assert_eq!(first.len(), 16);
    assert_eq!(first, second);
}

#[test]
fn test_copy_mode_lifecycle() {
    let image = builtin::connect4_image().unwrap();
    let mut region = vec![0u8; image.len()];
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(
        ImageSource::Copy {
            image: &image,
            region: &mut region,
        },
        true,
    )
    .unwrap()
    .init(&mut acts)
    .unwrap();

    let input = &random_inputs(11, 1)[0];
    let mut out = vec![0u8; OUT_BYTES];
    net.run(input, &mut out).unwrap();
    net.destroy();

    assert_eq!(vec![out], lifecycle(&image, std::slice::from_ref(input)));
}

#[test]
fn test_failed_run_leaves_network_usable() {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let input = vec![0u8; IN_BYTES];
    let mut out = vec![0u8; OUT_BYTES];

    let err = net.run_with(&BrokenRelu, None, &input, &mut out).unwrap_err();
    assert!(matches!(err, RuntimeError::Run { .. }));
    assert_eq!(net.last_error().detail, ErrorDetail::Layer);

    assert_eq!(net.run(&input, &mut out).unwrap(), 1);
    assert!(net.last_error().is_none());

    let err = net.run(&input[..10], &mut out).unwrap_err();
    assert_eq!(err.code().kind, ErrorType::InvalidInput);
}

// ── Observer timing ────────────────────────────────────────────

#[test]
fn test_observer_overhead_is_excluded_exactly() {
    const KERNEL: u64 = 40;
    const HOOK: u64 = 7;
    const RUNS: u64 = 16;

    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();

    let clock = ManualClock::new();
    let hook_clock = clock.clone();
    let kernels = TickingKernels {
        clock: clock.clone(),
        step: KERNEL,
    };
    let mut profiler = Profiler::new(clock.clone(), builtin::NODES)
        .unwrap()
        .with_hook(move |_| hook_clock.advance(HOOK));

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(PerfOptions::default().seed);
    let mut input = vec![0u8; IN_BYTES];
    let mut out = vec![0u8; OUT_BYTES];
    let mut total = 0;
    {
        let mut session = ExecSession::with_kernels(&mut net, &kernels);
        session.register(&mut profiler, EventMask::ALL).unwrap();
        for _ in 0..RUNS {
            fill_random(&mut rng, DType::F32, &mut input);
            let start = clock.now();
            session.run(&input, &mut out).unwrap();
            total += clock.now() - start;
        }
        session.close();
    }

    let nodes = builtin::NODES as u64;
    let per_node: u64 = (0..builtin::NODES)
        .map(|i| profiler.node(i).unwrap().ticks)
        .sum();
    assert_eq!(profiler.user_ticks(), RUNS * nodes * 2 * HOOK);
    assert_eq!(total - profiler.user_ticks(), per_node);
    assert_eq!(per_node, profiler.kernel_ticks());
    assert_eq!(profiler.runs(), RUNS as u32);
    for i in 0..builtin::NODES {
        assert_eq!(profiler.node(i).unwrap().mean_ticks(), KERNEL);
    }
}

#[test]
fn test_perf_harness_with_manual_clock() {
    const KERNEL: u64 = 25;

    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let clock = ManualClock::new();
    let kernels = TickingKernels {
        clock: clock.clone(),
        step: KERNEL,
    };

    let options = PerfOptions {
        iterations: 8,
        observer: true,
        ..Default::default()
    };
    let report = run_perf(&mut net, &kernels, clock, &options).unwrap();
    assert_eq!(report.mean_ticks, KERNEL * builtin::NODES as u64);
    let breakdown = report.breakdown.as_ref().unwrap();
    assert_eq!(breakdown.nodes.len(), builtin::NODES);
    for node in &breakdown.nodes {
        assert!((node.percent - 20.0).abs() < 1e-9);
    }
    assert!(report.to_string().contains("Inference time by c-node"));
}

// ── Validation protocol ────────────────────────────────────────

fn script(requests: &[Request]) -> Vec<u8> {
    let mut out = Vec::new();
    for req in requests {
        transport::write_frame(&mut out, &req.encode()).unwrap();
    }
    out
}

fn input_chunks(input: &[u8]) -> Vec<Request> {
    input
        .chunks(transport::CHUNK_SIZE)
        .map(|c| Request::Data(c.to_vec()))
        .collect()
}

#[test]
fn test_validation_session() {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let input = random_inputs(5, 1).remove(0);

    let mut requests = vec![
        Request::SysInfo,
        Request::NetworkInfo { param: 0 },
        Request::NetworkRun {
            param: run_param::PER_LAYER_WITH_DATA,
            name: builtin::MODEL_NAME.into(),
        },
    ];
    requests.extend(input_chunks(&input));
    requests.extend((0..builtin::NODES).map(|_| Request::Ack));
    requests.push(Request::NetworkRun {
        param: run_param::PERF_ONLY,
        name: builtin::MODEL_NAME.into(),
    });
    requests.extend(input_chunks(&input));
    requests.push(Request::NetworkRun {
        param: 0,
        name: "unknown".into(),
    });
    let stream = script(&requests);

    let mut server = ValidationServer::new(stream.as_slice(), Vec::new(), ManualClock::new());
    assert_eq!(server.serve(&mut net).unwrap(), 5);
    let (_, written) = server.into_inner();
    let responses = transport::decode_stream(&written).unwrap();

    let mut expected = vec![0u8; OUT_BYTES];
    net.run(&input, &mut expected).unwrap();

    let mut it = responses.into_iter();
    assert!(matches!(it.next(), Some(Response::SysInfo { .. })));
    match it.next() {
        Some(Response::NetworkInfo(info)) => {
            assert_eq!(info.name, builtin::MODEL_NAME);
            assert_eq!(info.n_nodes as usize, builtin::NODES);
            assert_eq!(info.activations_size as usize, builtin::ACTIVATIONS_SIZE);
        }
        other => panic!("unexpected {other:?}"),
    }

    // first run: per-layer with data
    let acks: Vec<_> = it.by_ref().take(3).collect();
    assert_eq!(
        acks,
        vec![
            Response::Ack {
                state: State::Waiting,
                param: IN_BYTES as u32,
                error: WireError::None
            },
            Response::Ack {
                state: State::Waiting,
                param: transport::CHUNK_SIZE as u32,
                error: WireError::None
            },
            Response::Ack {
                state: State::Processing,
                param: IN_BYTES as u32,
                error: WireError::None
            },
        ]
    );
    let mut last_internal = Vec::new();
    for i in 0..builtin::NODES {
        assert!(matches!(it.next(), Some(Response::Operator { id, .. }) if id as usize == i + 1));
        match it.next() {
            Some(Response::Tensor { flags, data, .. }) => {
                assert_ne!(flags & tensor_flags::INTERNAL, 0);
                assert_eq!(flags & tensor_flags::NO_DATA, 0);
                assert_eq!(flags & tensor_flags::LAST != 0, i + 1 == builtin::NODES);
                last_internal = data;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(matches!(it.next(), Some(Response::Operator { id: 0, .. })));
    match it.next() {
        Some(Response::Tensor {
            state, flags, data, ..
        }) => {
            assert_eq!(state, State::Done);
            assert_eq!(flags, tensor_flags::OUTPUT | tensor_flags::LAST);
            assert_eq!(data, expected);
            assert_eq!(last_internal, expected);
        }
        other => panic!("unexpected {other:?}"),
    }

    // second run: perf only, no per-layer records
    assert_eq!(it.by_ref().take(3).count(), 3);
    assert!(matches!(it.next(), Some(Response::Operator { .. })));
    match it.next() {
        Some(Response::Tensor { flags, data, .. }) => {
            assert_ne!(flags & tensor_flags::NO_DATA, 0);
            assert!(data.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }

    // unknown network
    assert_eq!(
        it.next(),
        Some(Response::Ack {
            state: State::Error,
            param: WireError::InvalidParam as u32,
            error: WireError::InvalidParam
        })
    );
    assert!(it.next().is_none());
}

#[test]
fn test_validation_rejects_oversized_chunk() {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let stream = script(&[
        Request::NetworkRun {
            param: 0,
            name: builtin::MODEL_NAME.into(),
        },
        Request::Data(vec![0u8; transport::CHUNK_SIZE + 1]),
        Request::SysInfo,
    ]);

    let mut server = ValidationServer::new(stream.as_slice(), Vec::new(), ManualClock::new());
    server.serve(&mut net).unwrap();
    let (_, written) = server.into_inner();
    let responses = transport::decode_stream(&written).unwrap();

    assert_eq!(responses.len(), 3);
    assert!(matches!(
        responses[1],
        Response::Ack {
            state: State::Error,
            error: WireError::InvalidSize,
            ..
        }
    ));
    assert!(matches!(responses[2], Response::SysInfo { .. }));
}

#[test]
fn test_validation_resyncs_after_oversized_frame() {
    let image = builtin::connect4_image().unwrap();
    let mut acts = vec![0u8; builtin::ACTIVATIONS_SIZE];
    let mut net = Network::create(ImageSource::Xip(&image), true)
        .unwrap()
        .init(&mut acts)
        .unwrap();
    let declared = transport::MAX_FRAME + 1;
    let mut stream = (declared as u32).to_le_bytes().to_vec();
    stream.extend(std::iter::repeat(0u8).take(declared));
    stream.extend(script(&[Request::SysInfo]));

    let mut server = ValidationServer::new(stream.as_slice(), Vec::new(), ManualClock::new());
    assert_eq!(server.serve(&mut net).unwrap(), 1);
    let (_, written) = server.into_inner();
    let responses = transport::decode_stream(&written).unwrap();

    assert_eq!(responses.len(), 2);
    assert!(matches!(
        responses[0],
        Response::Ack {
            state: State::Error,
            error: WireError::InvalidSize,
            ..
        }
    ));
    assert!(matches!(responses[1], Response::SysInfo { .. }));
}
