//! Error kinds for the wire-level bus layer.
//!
//! Kinds mirror the frame decode failure modes named in the protocol
//! specification, not the underlying transport: a `Truncated` frame and a
//! `BadChecksum` frame are both just bytes that didn't survive the wire, and
//! callers (the framer, the quality monitor) care which *kind* of failure it
//! was, not which `std::io` call produced it.

use thiserror::Error;

/// Failure decoding or serializing a bus frame.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FrameError {
    #[error("truncated frame: declared {declared} bytes, got {actual}")]
    Truncated { declared: usize, actual: usize },

    #[error("bad marker: expected start 0x32/end 0x34, got start={start:#04x} end={end:#04x}")]
    BadMarker { start: u8, end: u8 },

    #[error("checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    BadChecksum { expected: u8, computed: u8 },

    #[error("unknown enum value for {field}: {value}")]
    BadEnum { field: &'static str, value: u8 },

    #[error("unknown field_kind byte: {0:#04x}")]
    BadFieldKind(u8),

    #[error("internal length mismatch: {0}")]
    BadLength(String),
}

/// Failure evaluating a restricted arithmetic expression (C1).
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ExprError {
    #[error("unknown identifier '{0}' in expression")]
    UnknownIdentifier(String),

    #[error("unbalanced parentheses in expression")]
    UnbalancedParens,

    #[error("malformed token '{0}' in expression")]
    MalformedToken(String),

    #[error("empty expression")]
    EmptyExpression,

    #[error("arity mismatch evaluating expression")]
    ArityMismatch,

    #[error("division by zero")]
    DivisionByZero,
}
