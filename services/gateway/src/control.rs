//! Control ingress (C8, `spec.md` §4.8): turns an inbound `<name> <text>`
//! write command into a Write frame on the bus, tracks it until the device
//! acknowledges (or the command times out), and optionally follows up with
//! a Read so the published state reflects what the device actually accepted.
//!
//! Grounded on the teacher's outbound command/ack bookkeeping (a map keyed
//! by what's awaiting a reply, swept on a timer) generalized to repository
//! variables instead of race-timer commands.

use std::collections::HashMap;
use std::time::Duration;

use bus_core::{AddressClass, DataType, Endpoint, Frame, Message, PacketType};
use repository::{convert, Repository};
use test_support::Clock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Delay before the optional read-back follow-up, giving the device time to
/// apply the write (`spec.md` §4.8).
const READ_BACK_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("variable is not writable: {0}")]
    NotWritable(String),
    #[error("invalid write value for {variable}: {source}")]
    Encode {
        variable: String,
        #[source]
        source: repository::convert::EncodeError,
    },
    #[error("failed to send frame to transport")]
    SendFailed,
}

struct PendingWrite<C: Clock> {
    issued_at: chrono::DateTime<chrono::Utc>,
    _clock: std::marker::PhantomData<C>,
}

/// Owns the pending-write table and issues Write (and optional follow-up
/// Read) frames against the device bus.
pub struct ControlIngress<C: Clock> {
    repository: std::sync::Arc<Repository>,
    sender: mpsc::Sender<Frame>,
    command_timeout: chrono::Duration,
    pub(crate) clock: C,
    pending: HashMap<String, PendingWrite<C>>,
    degraded_count: u64,
    timeout_count: u64,
}

const SELF_ENDPOINT: Endpoint = Endpoint {
    class: AddressClass::JIGTester,
    channel: 255,
    address: 0,
};

impl<C: Clock> ControlIngress<C> {
    pub fn new(
        repository: std::sync::Arc<Repository>,
        sender: mpsc::Sender<Frame>,
        command_timeout: Duration,
        clock: C,
    ) -> Self {
        ControlIngress {
            repository,
            sender,
            command_timeout: chrono::Duration::from_std(command_timeout)
                .unwrap_or(chrono::Duration::seconds(30)),
            clock,
            pending: HashMap::new(),
            degraded_count: 0,
            timeout_count: 0,
        }
    }

    /// How many writes have been degraded (clamped to zero on overflow)
    /// since this ingress started.
    pub fn degraded_count(&self) -> u64 {
        self.degraded_count
    }

    /// How many pending writes expired without a matching state update
    /// within `command_timeout` (`spec.md` §4.8, §7 `PendingWriteTimeout`).
    pub fn timeout_count(&self) -> u64 {
        self.timeout_count
    }

    /// Resolve `variable`, encode `text` against its repository entry, and
    /// send a Write frame. If `read_after` is set, also schedules a
    /// follow-up Read by recording a pending write; the caller is
    /// responsible for actually issuing that follow-up after
    /// `READ_BACK_DELAY` (see `schedule_read_back`).
    pub async fn write(&mut self, variable: &str, text: &str, read_after: bool) -> Result<(), ControlError> {
        let entry = self
            .repository
            .by_name(variable)
            .ok_or_else(|| ControlError::UnknownVariable(variable.to_owned()))?;
        if !entry.writable {
            return Err(ControlError::NotWritable(variable.to_owned()));
        }

        let encoded = convert::encode_value(entry, text).map_err(|source| ControlError::Encode {
            variable: variable.to_owned(),
            source,
        })?;
        if encoded.degraded {
            self.degraded_count += 1;
            warn!(variable = %variable, text = %text, "write value degraded to zero on overflow");
        }

        let frame = Frame {
            source: SELF_ENDPOINT,
            destination: Endpoint {
                class: AddressClass::Outdoor,
                channel: 0,
                address: 0,
            },
            information: false,
            version: 2,
            retry_count: 0,
            packet_type: PacketType::Normal,
            data_type: DataType::Write,
            packet_number: bus_core::DEFAULT_PACKET_NUMBER,
            messages: vec![Message::new(entry.address, encoded.field_kind, encoded.payload)],
        };

        self.sender.send(frame).await.map_err(|_| ControlError::SendFailed)?;

        if read_after {
            self.pending.insert(
                variable.to_owned(),
                PendingWrite {
                    issued_at: self.clock.now_utc(),
                    _clock: std::marker::PhantomData,
                },
            );
        }
        debug!(variable = %variable, text = %text, read_after, "write issued");
        Ok(())
    }

    /// Build the read-back frame for every pending write old enough to read
    /// (`READ_BACK_DELAY` elapsed), removing them from the pending table.
    /// Entries older than `command_timeout` are dropped without a read-back;
    /// each counts toward `timeout_count` (`spec.md` §4.8, §7
    /// `PendingWriteTimeout`) instead of the overflow-clamp `degraded_count`.
    pub fn due_read_backs(&mut self) -> Vec<Frame> {
        let now = self.clock.now_utc();
        let read_back_delay = chrono::Duration::from_std(READ_BACK_DELAY).unwrap();
        let mut frames = Vec::new();
        let mut timed_out = Vec::new();
        let mut read_back = Vec::new();

        for (variable, pending) in self.pending.iter() {
            let age = now - pending.issued_at;
            if age >= self.command_timeout {
                timed_out.push(variable.clone());
                continue;
            }
            if age >= read_back_delay {
                if let Some(entry) = self.repository.by_name(variable) {
                    frames.push(Frame {
                        source: SELF_ENDPOINT,
                        destination: Endpoint {
                            class: AddressClass::Outdoor,
                            channel: 0,
                            address: 0,
                        },
                        information: false,
                        version: 2,
                        retry_count: 0,
                        packet_type: PacketType::Normal,
                        data_type: DataType::Read,
                        packet_number: bus_core::DEFAULT_PACKET_NUMBER,
                        messages: vec![Message::new(entry.address, entry.kind.wire_kind(), Vec::new())],
                    });
                }
                read_back.push(variable.clone());
            }
        }

        for variable in timed_out {
            if self.pending.remove(&variable).is_some() {
                self.timeout_count += 1;
                warn!(variable = %variable, "pending write timed out without a matching state update");
            }
        }
        for variable in read_back {
            if self.pending.remove(&variable).is_some() {
                debug!(variable = %variable, "pending write read back");
            }
        }
        frames
    }
}
