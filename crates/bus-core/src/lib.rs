//! Wire-level types for the EHS device bus: frames, messages, and the safe
//! arithmetic evaluator used to convert between raw field bytes and
//! semantic values.
//!
//! This crate has no notion of *what* an address means — that belongs to
//! `repository`. It only knows how to turn bytes into a `Frame` and back.

pub mod error;
pub mod expr;
pub mod frame;
pub mod message;

pub use error::{ExprError, FrameError};
pub use expr::Expr;
pub use frame::{AddressClass, DataType, Endpoint, Frame, PacketType, DEFAULT_PACKET_NUMBER};
pub use message::{FieldKind, Message};
