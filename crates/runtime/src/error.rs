// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the network runtime.
//!
//! Every lifecycle failure carries an [`ErrorCode`]: a coarse error type and
//! a finer code identifying the object involved. The last code is kept on
//! the network so callers can query it after a failed run.

use std::fmt;

/// Coarse classification of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ErrorType {
    None = 0x00,
    InvalidState = 0x11,
    InvalidInput = 0x12,
    InvalidOutput = 0x13,
    InvalidSignature = 0x15,
    InvalidSize = 0x16,
    InvalidValue = 0x17,
    InitFailed = 0x30,
    AllocationFailed = 0x31,
    CreateFailed = 0x33,
}

/// The object a failure relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ErrorDetail {
    None = 0x00,
    Network = 0x10,
    NetworkWeights = 0x12,
    NetworkActivations = 0x13,
    Layer = 0x14,
    Tensor = 0x15,
    InvalidSize = 0x18,
    InvalidFormat = 0x19,
    InvalidBatch = 0x21,
    InUse = 0x40,
}

/// A `(type, code)` pair as reported by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ErrorCode {
    pub kind: ErrorType,
    pub detail: ErrorDetail,
}

impl ErrorCode {
    pub const NONE: ErrorCode = ErrorCode::new(ErrorType::None, ErrorDetail::None);

    pub const fn new(kind: ErrorType, detail: ErrorDetail) -> Self {
        Self { kind, detail }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ErrorType::None
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:#04x}.{:#04x}", self.kind as u8, self.detail as u8)
    }
}

/// Error codes carried by validation protocol acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum WireError {
    None = 0,
    InvalidSize = 1,
    InvalidParam = 2,
    Generic = 3,
}

impl WireError {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(WireError::None),
            1 => Some(WireError::InvalidSize),
            2 => Some(WireError::InvalidParam),
            3 => Some(WireError::Generic),
            _ => None,
        }
    }
}

/// Errors that can occur while loading, initialising or running a network.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The image could not be loaded into an instance.
    #[error("load error ({code}): {detail}")]
    Load { code: ErrorCode, detail: String },

    /// Arena binding or post-init validation failed.
    #[error("init error ({code}): {detail}")]
    Init { code: ErrorCode, detail: String },

    /// A run was aborted; output tensors are undefined.
    #[error("run error ({code}): {detail}")]
    Run { code: ErrorCode, detail: String },

    /// Observer registration failed; inference proceeds without it.
    #[error("observer error: {0}")]
    Observer(String),

    /// A malformed or short transport message.
    #[error("protocol error ({kind:?}): {detail}")]
    Protocol { kind: WireError, detail: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model image error outside the lifecycle (e.g. while encoding).
    #[error("model error: {0}")]
    Model(#[from] model_ir::ModelError),
}

impl RuntimeError {
    pub(crate) fn load(kind: ErrorType, detail: ErrorDetail, msg: impl Into<String>) -> Self {
        RuntimeError::Load {
            code: ErrorCode::new(kind, detail),
            detail: msg.into(),
        }
    }

    pub(crate) fn init(kind: ErrorType, detail: ErrorDetail, msg: impl Into<String>) -> Self {
        RuntimeError::Init {
            code: ErrorCode::new(kind, detail),
            detail: msg.into(),
        }
    }

    pub(crate) fn run(kind: ErrorType, detail: ErrorDetail, msg: impl Into<String>) -> Self {
        RuntimeError::Run {
            code: ErrorCode::new(kind, detail),
            detail: msg.into(),
        }
    }

    pub(crate) fn protocol(kind: WireError, msg: impl Into<String>) -> Self {
        RuntimeError::Protocol {
            kind,
            detail: msg.into(),
        }
    }

    /// The lifecycle error code, or [`ErrorCode::NONE`] for errors that do
    /// not come from the network itself.
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::Load { code, .. }
            | RuntimeError::Init { code, .. }
            | RuntimeError::Run { code, .. } => *code,
            _ => ErrorCode::NONE,
        }
    }

    /// One-line diagnostic naming the failing operation, e.g.
    /// `"network_run: E0x12.0x18 input is 12 bytes, expected 588"`.
    pub fn diagnostic(&self, operation: &str) -> String {
        match self {
            RuntimeError::Load { code, detail }
            | RuntimeError::Init { code, detail }
            | RuntimeError::Run { code, detail } => format!("{operation}: {code} {detail}"),
            other => format!("{operation}: {other}"),
        }
    }
}
