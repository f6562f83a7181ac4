//! Byte-stream transport (C4) and framer (C5) for the device bus
//! (`spec.md` §4.4, §4.5).

mod byte_stream;
pub mod dump;
mod error;
pub mod file;
pub mod framer;
pub mod serial;
pub mod tcp;

pub use byte_stream::{ByteStream, ReadHalf, Transport, WriteHalf};
pub use dump::DumpSink;
pub use error::TransportError;
pub use framer::{FrameEvent, Framer};
