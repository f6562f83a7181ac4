//! Errors surfaced by the transport layer (C4, `spec.md` §4.4/§7).
//!
//! Every read/write failure collapses to `TransportError` — a recoverable
//! kind whose reconnection policy lives entirely in the runtime (C10), not
//! here. The transport itself never retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open {kind} transport: {source}")]
    Open {
        kind: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("transport read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("transport write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("transport disconnected")]
    Disconnected,
}
