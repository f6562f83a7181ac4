//! Dump-file transport variant (`spec.md` §6 `--dry-run`): replays a
//! previously recorded raw-byte trace instead of opening a live bus.
//!
//! Grounded on the live variants' shape (`tcp::open`/`serial::open`) but the
//! write half has nowhere to go — there is no device on the other end of a
//! dump file — so writes are accepted and discarded rather than surfaced as
//! an error. This lets the scheduler and control ingress run unmodified
//! against a replayed trace.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::byte_stream::Transport;
use crate::error::TransportError;

/// Open `path` as a read-only replay source. Every byte written back is
/// silently dropped.
pub async fn open_replay(path: &str) -> Result<Transport, TransportError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| TransportError::Open { kind: "dump-file", source })?;
    Ok(Transport::new(Box::new(Replay { file }), "dump-file"))
}

struct Replay {
    file: tokio::fs::File,
}

impl AsyncRead for Replay {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncWrite for Replay {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
