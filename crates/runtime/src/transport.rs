// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Validation protocol over a byte stream.
//!
//! Every message is a frame: a little-endian `u32` payload length followed
//! by the payload, whose first byte is the message tag. The host issues
//! `SYS_INFO`, `NETWORK_INFO` and `NETWORK_RUN` requests; the device answers
//! with acknowledgements, info records, operator timings and tensors.
//!
//! A run proceeds as:
//!
//! ```text
//! host                              device
//!  NETWORK_RUN(name, param)  ───►
//!                            ◄───  ACK(WAITING, input bytes)
//!  DATA(chunk) ──────────────────►
//!                            ◄───  ACK(WAITING | PROCESSING, bytes so far)
//!  ...                                 (run)
//!                            ◄───  OPERATOR + TENSOR(INTERNAL) per node
//!  ACK ──────────────────────────►     (per-layer modes only)
//!                            ◄───  OPERATOR(model, total time)
//!                            ◄───  TENSOR(OUTPUT | LAST), state DONE
//! ```
//!
//! Malformed or short messages are answered with an error acknowledgement
//! and the session continues.

use crate::engine::Ready;
use crate::error::WireError;
use crate::profiler::CycleCounter;
use crate::{EventMask, Network, NodeEvent, NodeObserver, RuntimeError};
use std::io::{self, Read, Write};
use tensor_core::{DType, Quantization, Shape, TensorDesc, TensorView};

/// Largest accepted frame payload.
pub const MAX_FRAME: usize = 1 << 20;
/// Largest input data chunk the device accepts.
pub const CHUNK_SIZE: usize = 512;

// request tags
const TAG_SYS_INFO: u8 = 0x01;
const TAG_NETWORK_INFO: u8 = 0x02;
const TAG_NETWORK_RUN: u8 = 0x03;
const TAG_DATA: u8 = 0x10;
const TAG_HOST_ACK: u8 = 0x11;
// response tags
const TAG_ACK: u8 = 0x81;
const TAG_SYS: u8 = 0x82;
const TAG_NET: u8 = 0x83;
const TAG_OPERATOR: u8 = 0x84;
const TAG_TENSOR: u8 = 0x85;

/// Device state reported with every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Waiting = 1,
    Processing = 2,
    Done = 3,
    Error = 4,
}

impl State {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(State::Idle),
            1 => Some(State::Waiting),
            2 => Some(State::Processing),
            3 => Some(State::Done),
            4 => Some(State::Error),
            _ => None,
        }
    }
}

/// Tensor descriptor flags.
pub mod tensor_flags {
    pub const INPUT: u32 = 0x01;
    pub const OUTPUT: u32 = 0x02;
    pub const INTERNAL: u32 = 0x04;
    pub const LAST: u32 = 0x08;
    pub const NO_DATA: u32 = 0x10;
    pub const IN_MEMPOOL: u32 = 0x20;
}

/// `NETWORK_RUN` parameter bits.
pub mod run_param {
    /// Report each node's timing.
    pub const PER_LAYER: u32 = 0x01;
    /// Report each node's timing and output tensor.
    pub const PER_LAYER_WITH_DATA: u32 = 0x03;
    /// Omit the output tensor data.
    pub const PERF_ONLY: u32 = 0x04;
}

/// Host → device messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SysInfo,
    NetworkInfo { param: u32 },
    NetworkRun { param: u32, name: String },
    Data(Vec<u8>),
    Ack,
}

/// Network description carried by the `NETWORK_INFO` response.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfoMsg {
    pub name: String,
    pub signature: String,
    pub tool_version: [u8; 3],
    pub n_macc: u64,
    pub n_nodes: u32,
    pub input: TensorDesc,
    pub input_flags: u32,
    pub output: TensorDesc,
    pub output_flags: u32,
    pub activations_size: u32,
    pub weights_size: u32,
}

/// Device → host messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ack {
        state: State,
        param: u32,
        error: WireError,
    },
    SysInfo {
        version: String,
        ticks_per_second: u64,
    },
    NetworkInfo(NetworkInfoMsg),
    Operator {
        state: State,
        name: String,
        /// Flags in the top byte, layer type code in the low bits.
        type_flags: u32,
        id: u16,
        duration_ms: f32,
    },
    Tensor {
        state: State,
        flags: u32,
        desc: TensorDesc,
        data: Vec<u8>,
    },
}

// ── Framing ────────────────────────────────────────────────────

/// Writes one frame.
pub fn write_frame(w: &mut impl Write, payload: &[u8]) -> Result<(), RuntimeError> {
    if payload.len() > MAX_FRAME {
        return Err(RuntimeError::protocol(
            WireError::InvalidSize,
            format!("frame of {} bytes exceeds {MAX_FRAME}", payload.len()),
        ));
    }
    w.write_all(&(payload.len() as u32).to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Reads one frame. Returns `None` on a clean end of stream.
pub fn read_frame(r: &mut impl Read) -> Result<Option<Vec<u8>>, RuntimeError> {
    let mut len = [0u8; 4];
    match r.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len) as usize;
    if len > MAX_FRAME {
        // Skip the payload so the next read starts on a frame boundary.
        io::copy(&mut r.by_ref().take(len as u64), &mut io::sink())?;
        return Err(RuntimeError::protocol(
            WireError::InvalidSize,
            format!("frame of {len} bytes exceeds {MAX_FRAME}"),
        ));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

// ── Codec ──────────────────────────────────────────────────────

#[derive(Default)]
struct Enc(Vec<u8>);

impl Enc {
    fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }
    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u64(&mut self, v: u64) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn f32(&mut self, v: f32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn str(&mut self, s: &str) -> &mut Self {
        let bytes = &s.as_bytes()[..s.len().min(u8::MAX as usize)];
        self.u8(bytes.len() as u8);
        self.0.extend_from_slice(bytes);
        self
    }
    fn blob(&mut self, data: &[u8]) -> &mut Self {
        self.u32(data.len() as u32);
        self.0.extend_from_slice(data);
        self
    }
    fn desc(&mut self, desc: &TensorDesc) -> &mut Self {
        let q = desc.quant.unwrap_or(Quantization {
            scale: 0.0,
            zero_point: 0,
        });
        self.u8(desc.dtype.code()).u8(desc.shape.rank() as u8);
        for &d in desc.shape.dims() {
            self.u32(d as u32);
        }
        self.f32(q.scale).u32(q.zero_point as u32)
    }
}

struct Dec<'b> {
    buf: &'b [u8],
    pos: usize,
}

impl<'b> Dec<'b> {
    fn new(buf: &'b [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'b [u8], RuntimeError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        let Some(end) = end else {
            return Err(RuntimeError::protocol(
                WireError::InvalidSize,
                format!("message truncated at byte {}", self.pos),
            ));
        };
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }
    fn array<const N: usize>(&mut self) -> Result<[u8; N], RuntimeError> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.take(N)?);
        Ok(a)
    }
    fn u8(&mut self) -> Result<u8, RuntimeError> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<u16, RuntimeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }
    fn u32(&mut self) -> Result<u32, RuntimeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }
    fn u64(&mut self) -> Result<u64, RuntimeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
    fn f32(&mut self) -> Result<f32, RuntimeError> {
        Ok(f32::from_le_bytes(self.array()?))
    }
    fn str(&mut self) -> Result<String, RuntimeError> {
        let n = self.u8()? as usize;
        String::from_utf8(self.take(n)?.to_vec())
            .map_err(|_| RuntimeError::protocol(WireError::InvalidParam, "string is not UTF-8"))
    }
    fn blob(&mut self) -> Result<Vec<u8>, RuntimeError> {
        let n = self.u32()? as usize;
        Ok(self.take(n)?.to_vec())
    }
    fn state(&mut self) -> Result<State, RuntimeError> {
        let c = self.u8()?;
        State::from_code(c)
            .ok_or_else(|| RuntimeError::protocol(WireError::InvalidParam, format!("bad state {c}")))
    }
    fn desc(&mut self) -> Result<TensorDesc, RuntimeError> {
        let bad = |e: tensor_core::TensorError| RuntimeError::protocol(WireError::InvalidParam, e.to_string());
        let dtype = DType::from_code(self.u8()?).map_err(bad)?;
        let rank = self.u8()? as usize;
        let dims = (0..rank)
            .map(|_| self.u32().map(|d| d as usize))
            .collect::<Result<Vec<_>, _>>()?;
        let shape = Shape::new(dims).map_err(bad)?;
        let scale = self.f32()?;
        let zero_point = self.u32()? as i32;
        let desc = TensorDesc::new(shape, dtype);
        Ok(if scale != 0.0 {
            desc.with_quant(Quantization { scale, zero_point })
        } else {
            desc
        })
    }
    fn finish(&self) -> Result<(), RuntimeError> {
        if self.pos != self.buf.len() {
            return Err(RuntimeError::protocol(
                WireError::InvalidSize,
                format!("{} trailing bytes", self.buf.len() - self.pos),
            ));
        }
        Ok(())
    }
}

impl Request {
    pub fn encode(&self) -> Vec<u8> {
        let mut e = Enc::default();
        match self {
            Request::SysInfo => {
                e.u8(TAG_SYS_INFO);
            }
            Request::NetworkInfo { param } => {
                e.u8(TAG_NETWORK_INFO).u32(*param);
            }
            Request::NetworkRun { param, name } => {
                e.u8(TAG_NETWORK_RUN).u32(*param).str(name);
            }
            Request::Data(data) => {
                e.u8(TAG_DATA);
                e.0.extend_from_slice(data);
            }
            Request::Ack => {
                e.u8(TAG_HOST_ACK);
            }
        }
        e.0
    }

    pub fn decode(payload: &[u8]) -> Result<Self, RuntimeError> {
        let mut d = Dec::new(payload);
        let req = match d.u8()? {
            TAG_SYS_INFO => Request::SysInfo,
            TAG_NETWORK_INFO => Request::NetworkInfo { param: d.u32()? },
            TAG_NETWORK_RUN => Request::NetworkRun {
                param: d.u32()?,
                name: d.str()?,
            },
            TAG_DATA => {
                let rest = payload.len() - d.pos;
                Request::Data(d.take(rest)?.to_vec())
            }
            TAG_HOST_ACK => Request::Ack,
            other => {
                return Err(RuntimeError::protocol(
                    WireError::InvalidParam,
                    format!("unknown request tag {other:#04x}"),
                ))
            }
        };
        d.finish()?;
        Ok(req)
    }
}

impl Response {
    pub fn encode(&self) -> Vec<u8> {
        let mut e = Enc::default();
        match self {
            Response::Ack {
                state,
                param,
                error,
            } => {
                e.u8(TAG_ACK).u8(*state as u8).u32(*param).u8(*error as u8);
            }
            Response::SysInfo {
                version,
                ticks_per_second,
            } => {
                e.u8(TAG_SYS).str(version).u64(*ticks_per_second);
            }
            Response::NetworkInfo(m) => {
                e.u8(TAG_NET)
                    .str(&m.name)
                    .str(&m.signature)
                    .u8(m.tool_version[0])
                    .u8(m.tool_version[1])
                    .u8(m.tool_version[2])
                    .u64(m.n_macc)
                    .u32(m.n_nodes)
                    .desc(&m.input)
                    .u32(m.input_flags)
                    .desc(&m.output)
                    .u32(m.output_flags)
                    .u32(m.activations_size)
                    .u32(m.weights_size);
            }
            Response::Operator {
                state,
                name,
                type_flags,
                id,
                duration_ms,
            } => {
                e.u8(TAG_OPERATOR)
                    .u8(*state as u8)
                    .str(name)
                    .u32(*type_flags)
                    .u16(*id)
                    .f32(*duration_ms);
            }
            Response::Tensor {
                state,
                flags,
                desc,
                data,
            } => {
                e.u8(TAG_TENSOR).u8(*state as u8).u32(*flags).desc(desc).blob(data);
            }
        }
        e.0
    }

    pub fn decode(payload: &[u8]) -> Result<Self, RuntimeError> {
        let mut d = Dec::new(payload);
        let resp = match d.u8()? {
            TAG_ACK => {
                let state = d.state()?;
                let param = d.u32()?;
                let code = d.u8()?;
                let error = WireError::from_code(code).ok_or_else(|| {
                    RuntimeError::protocol(WireError::InvalidParam, format!("bad error code {code}"))
                })?;
                Response::Ack {
                    state,
                    param,
                    error,
                }
            }
            TAG_SYS => Response::SysInfo {
                version: d.str()?,
                ticks_per_second: d.u64()?,
            },
            TAG_NET => Response::NetworkInfo(NetworkInfoMsg {
                name: d.str()?,
                signature: d.str()?,
                tool_version: [d.u8()?, d.u8()?, d.u8()?],
                n_macc: d.u64()?,
                n_nodes: d.u32()?,
                input: d.desc()?,
                input_flags: d.u32()?,
                output: d.desc()?,
                output_flags: d.u32()?,
                activations_size: d.u32()?,
                weights_size: d.u32()?,
            }),
            TAG_OPERATOR => Response::Operator {
                state: d.state()?,
                name: d.str()?,
                type_flags: d.u32()?,
                id: d.u16()?,
                duration_ms: d.f32()?,
            },
            TAG_TENSOR => Response::Tensor {
                state: d.state()?,
                flags: d.u32()?,
                desc: d.desc()?,
                data: d.blob()?,
            },
            other => {
                return Err(RuntimeError::protocol(
                    WireError::InvalidParam,
                    format!("unknown response tag {other:#04x}"),
                ))
            }
        };
        d.finish()?;
        Ok(resp)
    }
}

/// Decodes every frame in a captured device output stream.
pub fn decode_stream(mut bytes: &[u8]) -> Result<Vec<Response>, RuntimeError> {
    let mut out = Vec::new();
    while let Some(frame) = read_frame(&mut bytes)? {
        out.push(Response::decode(&frame)?);
    }
    Ok(out)
}

// ── Per-layer capture ──────────────────────────────────────────

struct CapturedNode {
    event: NodeEvent,
    ticks: u64,
    desc: TensorDesc,
    data: Vec<u8>,
}

/// Observer recording each node's duration and, optionally, its output.
struct LayerCapture<'c, C: CycleCounter> {
    clock: &'c C,
    with_data: bool,
    entered: u64,
    nodes: Vec<CapturedNode>,
}

impl<C: CycleCounter> NodeObserver for LayerCapture<'_, C> {
    fn on_pre_node(&mut self, _event: &NodeEvent) {
        self.entered = self.clock.now();
    }

    fn on_post_node(&mut self, event: &NodeEvent, output: TensorView<'_>) {
        let ticks = self.clock.now().saturating_sub(self.entered);
        self.nodes.push(CapturedNode {
            event: *event,
            ticks,
            desc: output.desc().clone(),
            data: if self.with_data {
                output.as_bytes().to_vec()
            } else {
                Vec::new()
            },
        });
    }
}

// ── Server ─────────────────────────────────────────────────────

/// Device side of the validation protocol.
pub struct ValidationServer<R, W, C> {
    reader: R,
    writer: W,
    clock: C,
}

impl<R: Read, W: Write, C: CycleCounter> ValidationServer<R, W, C> {
    pub fn new(reader: R, writer: W, clock: C) -> Self {
        Self {
            reader,
            writer,
            clock,
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn send(&mut self, resp: &Response) -> Result<(), RuntimeError> {
        write_frame(&mut self.writer, &resp.encode())
    }

    fn ack(&mut self, state: State, param: u32, error: WireError) -> Result<(), RuntimeError> {
        self.send(&Response::Ack {
            state,
            param,
            error,
        })
    }

    fn receive(&mut self) -> Result<Request, RuntimeError> {
        let frame = read_frame(&mut self.reader)?.ok_or_else(|| {
            RuntimeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed mid-request",
            ))
        })?;
        Request::decode(&frame)
    }

    fn wait_ack(&mut self) -> Result<(), RuntimeError> {
        match self.receive()? {
            Request::Ack => Ok(()),
            other => Err(RuntimeError::protocol(
                WireError::Generic,
                format!("expected ACK, got {other:?}"),
            )),
        }
    }

    /// Serves requests until the host closes the stream.
    ///
    /// Protocol errors are answered with an error acknowledgement and the
    /// loop continues; I/O errors end it. Returns the number of requests
    /// handled.
    pub fn serve(&mut self, network: &mut Network<'_, Ready>) -> Result<usize, RuntimeError> {
        let mut handled = 0;
        tracing::info!("validation session started");
        loop {
            let frame = match read_frame(&mut self.reader) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(RuntimeError::Protocol { kind, detail }) => {
                    tracing::warn!(?kind, %detail, "rejected frame");
                    self.ack(State::Error, kind as u32, kind)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let result = Request::decode(&frame).and_then(|req| self.handle(network, req));
            match result {
                Ok(()) => {}
                Err(RuntimeError::Protocol { kind, detail }) => {
                    tracing::warn!(?kind, %detail, "protocol error");
                    self.ack(State::Error, kind as u32, kind)?;
                }
                Err(e @ RuntimeError::Io(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "request failed");
                    self.ack(State::Error, WireError::Generic as u32, WireError::Generic)?;
                }
            }
            handled += 1;
        }
        tracing::info!(requests = handled, "validation session closed");
        Ok(handled)
    }

    fn handle(&mut self, network: &mut Network<'_, Ready>, req: Request) -> Result<(), RuntimeError> {
        tracing::debug!(?req, "request");
        match req {
            Request::SysInfo => self.send(&Response::SysInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ticks_per_second: self.clock.ticks_per_second(),
            }),
            Request::NetworkInfo { param } => {
                if param != 0 {
                    return Err(RuntimeError::protocol(
                        WireError::InvalidParam,
                        format!("network index {param} does not exist"),
                    ));
                }
                let r = network.report();
                self.send(&Response::NetworkInfo(NetworkInfoMsg {
                    name: r.model_name,
                    signature: r.model_signature,
                    tool_version: r.tool_version,
                    n_macc: r.n_macc,
                    n_nodes: r.n_nodes as u32,
                    input: r.input,
                    input_flags: tensor_flags::INPUT | tensor_flags::IN_MEMPOOL,
                    output: r.output,
                    output_flags: tensor_flags::OUTPUT | tensor_flags::IN_MEMPOOL,
                    activations_size: r.activations_size as u32,
                    weights_size: r.weights_size as u32,
                }))
            }
            Request::NetworkRun { param, name } => self.run(network, param, &name),
            Request::Data(_) | Request::Ack => Err(RuntimeError::protocol(
                WireError::InvalidParam,
                "data or ACK outside a run",
            )),
        }
    }

    fn receive_input(&mut self, expected: usize) -> Result<Vec<u8>, RuntimeError> {
        let mut input = Vec::with_capacity(expected);
        while input.len() < expected {
            let Request::Data(chunk) = self.receive()? else {
                return Err(RuntimeError::protocol(
                    WireError::InvalidParam,
                    "expected input data",
                ));
            };
            if chunk.is_empty() || chunk.len() > CHUNK_SIZE || input.len() + chunk.len() > expected
            {
                return Err(RuntimeError::protocol(
                    WireError::InvalidSize,
                    format!(
                        "chunk of {} bytes at offset {} (input is {expected} bytes)",
                        chunk.len(),
                        input.len()
                    ),
                ));
            }
            input.extend_from_slice(&chunk);
            let state = if input.len() == expected {
                State::Processing
            } else {
                State::Waiting
            };
            self.ack(state, input.len() as u32, WireError::None)?;
        }
        Ok(input)
    }

    fn run(
        &mut self,
        network: &mut Network<'_, Ready>,
        param: u32,
        name: &str,
    ) -> Result<(), RuntimeError> {
        let report = network.report();
        if name != report.model_name {
            return Err(RuntimeError::protocol(
                WireError::InvalidParam,
                format!("unknown network '{name}'"),
            ));
        }
        let per_layer = param & run_param::PER_LAYER != 0;
        let with_data = param & run_param::PER_LAYER_WITH_DATA == run_param::PER_LAYER_WITH_DATA;
        let in_len = report.input.size_bytes();

        self.ack(State::Waiting, in_len as u32, WireError::None)?;
        let input = self.receive_input(in_len)?;
        let mut output = vec![0u8; report.output.size_bytes()];

        let mut capture = LayerCapture {
            clock: &self.clock,
            with_data,
            entered: 0,
            nodes: Vec::new(),
        };
        let start = self.clock.now();
        if per_layer {
            network.run_observed(&mut capture, EventMask::ALL, &input, &mut output)?;
        } else {
            network.run(&input, &mut output)?;
        }
        let total = self.clock.now().saturating_sub(start);
        let nodes = std::mem::take(&mut capture.nodes);

        for node in nodes {
            let mut flags = tensor_flags::INTERNAL;
            if node.event.last {
                flags |= tensor_flags::LAST;
            }
            if !with_data {
                flags |= tensor_flags::NO_DATA;
            }
            let layer_name = network
                .graph()
                .layer(node.event.index)
                .map(|l| l.name.clone())
                .unwrap_or_default();
            self.send(&Response::Operator {
                state: State::Processing,
                name: layer_name,
                type_flags: (flags << 24) | u32::from(node.event.layer_type.code()),
                id: node.event.id,
                duration_ms: self.clock.ticks_to_ms(node.ticks) as f32,
            })?;
            self.send(&Response::Tensor {
                state: State::Processing,
                flags,
                desc: node.desc,
                data: node.data,
            })?;
            self.wait_ack()?;
        }

        self.send(&Response::Operator {
            state: State::Processing,
            name: report.model_name,
            type_flags: 0,
            id: 0,
            duration_ms: self.clock.ticks_to_ms(total) as f32,
        })?;

        let mut flags = tensor_flags::OUTPUT | tensor_flags::LAST;
        if param & run_param::PERF_ONLY != 0 {
            flags |= tensor_flags::NO_DATA;
            output.clear();
        }
        self.send(&Response::Tensor {
            state: State::Done,
            flags,
            desc: report.output,
            data: output,
        })
    }
}
