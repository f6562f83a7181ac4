//! The byte-stream framer (C5, `spec.md` §4.5): scans a continuous stream
//! for frame boundaries and hands complete candidate frames upstream.
//!
//! The state machine itself (`Framer`) is synchronous and transport-free —
//! it only ever sees bytes, never a socket — so it can be driven from a
//! live `Transport`, a dump-file replay, or a property test with identical
//! code. `run` is the async pump that drives it from a live `Transport`.

use tokio::sync::mpsc;

use crate::byte_stream::ReadHalf;
use crate::dump::DumpSink;
use crate::error::TransportError;

const START_MARKER: u8 = 0x32;
const END_MARKER: u8 = 0x34;

/// Minimum plausible frame size (header + trailer, no messages). Buffers
/// shorter than this at dispatch are "too short" per `spec.md` §4.5 and are
/// silently dropped rather than handed to the decoder.
pub const MIN_DISPATCH_LEN: usize = 15;

/// What the framer produced after observing one more byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, end-marker-terminated candidate frame.
    Candidate(Vec<u8>),
    /// Accumulated to the declared length, but the trailing byte wasn't
    /// `END_MARKER` — discarded, counted invalid.
    Invalid,
}

/// The pull-based frame boundary scanner (`spec.md` §4.5 state machine).
#[derive(Debug, Default)]
pub struct Framer {
    prev_byte: Option<u8>,
    in_frame: bool,
    acc: Vec<u8>,
    declared_len: usize,
}

impl Framer {
    pub fn new() -> Self {
        Framer::default()
    }

    /// Feed one more byte from the stream. Returns `Some(event)` whenever a
    /// frame boundary resolves (valid or invalid); `None` while still
    /// accumulating or scanning for the start pair.
    pub fn feed_byte(&mut self, byte: u8) -> Option<FrameEvent> {
        if !self.in_frame {
            let started = matches!(self.prev_byte, Some(p) if p == START_MARKER) && byte == 0x00;
            self.prev_byte = Some(byte);
            if started {
                self.in_frame = true;
                self.acc = vec![START_MARKER, 0x00];
                self.declared_len = 0;
            }
            return None;
        }

        self.acc.push(byte);
        if self.acc.len() == 3 {
            self.declared_len = (((self.acc[1] as usize) << 8) | self.acc[2] as usize) + 2;
        }
        if self.acc.len() >= 3 && self.acc.len() >= self.declared_len {
            let frame = std::mem::take(&mut self.acc);
            self.in_frame = false;
            self.prev_byte = None;
            if frame.len() < MIN_DISPATCH_LEN {
                tracing::debug!(len = frame.len(), "dropping too-short candidate frame");
                return None;
            }
            return Some(if *frame.last().expect("non-empty") == END_MARKER {
                FrameEvent::Candidate(frame)
            } else {
                FrameEvent::Invalid
            });
        }
        None
    }

    /// Feed a whole chunk at once, returning every event it produced in
    /// arrival order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        bytes.iter().filter_map(|&b| self.feed_byte(b)).collect()
    }
}

/// Drive `Framer` from a live transport read half, forwarding every
/// `FrameEvent` to `events`. Runs until the transport disconnects or
/// `events` is closed. `spec.md` §5: bytes reach the framer in arrival
/// order; this loop is the reader task's entire body, so it never blocks on
/// decode (that happens in whatever task consumes `events`).
///
/// When `dump` is `Some`, every raw byte read off the transport is also
/// appended there verbatim (`spec.md` §6 `--dump <path>`), before framing.
pub async fn run(
    reader: &mut ReadHalf,
    events: mpsc::Sender<FrameEvent>,
    mut dump: Option<&mut DumpSink>,
) -> Result<(), TransportError> {
    let mut framer = Framer::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if let Some(sink) = dump.as_deref_mut() {
            sink.record(&buf[..n]).await?;
        }
        for event in framer.feed(&buf[..n]) {
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}
