//! Polling scheduler (C7, `spec.md` §4.7): drives three independently
//! cadenced groups of Read requests — `live_data`, `settings`, and
//! `static_data` — against the device bus.
//!
//! Grounded on the teacher's long-running worker task shape (a loop that
//! sleeps, checks a shutdown signal, and does one unit of work per
//! iteration) generalized to the source's `PollingManager` stagger/chunk
//! behaviour: each group starts offset by a multiple of its index so groups
//! don't all fire a burst of writes in the same instant, and each group's
//! variable list is split into `CHUNK_SIZE`-sized frames with a short pause
//! between chunks so a large group doesn't monopolize the bus.

use std::time::Duration;

use bus_core::{AddressClass, DataType, Endpoint, Frame, Message, PacketType};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use repository::Repository;

/// Variables per group are polled in frames of this size (`spec.md` §4.7).
pub const CHUNK_SIZE: usize = 10;

/// Pause between chunks within a single poll pass.
const INTER_CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// Stagger between the start of group `i` and group `i + 1`.
const STAGGER_UNIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollingGroup {
    pub name: String,
    pub cadence: Duration,
    pub variable_names: Vec<String>,
}

/// Signals a poll task should stop at its next checkpoint. Cloned into each
/// group's task; checked at every sleep and chunk boundary.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: tokio::sync::watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new(inner: tokio::sync::watch::Receiver<bool>) -> Self {
        ShutdownSignal { inner }
    }

    fn is_shutdown(&self) -> bool {
        *self.inner.borrow()
    }

    async fn wait_or_shutdown(&mut self, duration: Duration) {
        let mut changed = Box::pin(self.inner.changed());
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = &mut changed => {}
        }
    }
}

/// The gateway's own address on the bus, used as every outbound frame's
/// source endpoint.
const SELF_ENDPOINT: Endpoint = Endpoint {
    class: AddressClass::JIGTester,
    channel: 255,
    address: 0,
};

/// Builds the Read frames for one group, `CHUNK_SIZE` variables per frame,
/// resolving each variable name's address/wire-kind through the repository.
/// Unknown names are logged and skipped rather than aborting the whole
/// group.
fn build_chunks(repository: &Repository, variable_names: &[String]) -> Vec<Frame> {
    let entries: Vec<(u16, bus_core::FieldKind)> = variable_names
        .iter()
        .filter_map(|name| match repository.by_name(name) {
            Some(entry) => Some((entry.address, entry.kind.wire_kind())),
            None => {
                warn!(variable = %name, "polling group references unknown variable, skipping");
                None
            }
        })
        .collect();

    entries
        .chunks(CHUNK_SIZE)
        .map(|chunk| Frame {
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
            messages: chunk
                .iter()
                .map(|(address, kind)| Message::new(*address, *kind, Vec::new()))
                .collect(),
        })
        .collect()
}

/// One full pass over a group's chunks, writing each chunk's frame out and
/// pausing between chunks. Returns early if shutdown fires mid-pass.
async fn run_pass(sender: &mpsc::Sender<Frame>, chunks: &[Frame], shutdown: &mut ShutdownSignal) -> bool {
    for frame in chunks {
        if shutdown.is_shutdown() {
            return false;
        }
        if sender.send(frame.clone()).await.is_err() {
            return false;
        }
        shutdown.wait_or_shutdown(INTER_CHUNK_PAUSE).await;
        if shutdown.is_shutdown() {
            return false;
        }
    }
    true
}

/// Runs one polling group's cadenced loop until shutdown. `group_index`
/// controls the initial stagger; `sender` carries outbound Read frames to
/// whatever owns the device-bus transport.
pub async fn run_group(
    repository: std::sync::Arc<Repository>,
    group: PollingGroup,
    group_index: usize,
    sender: mpsc::Sender<Frame>,
    mut shutdown: ShutdownSignal,
) {
    shutdown.wait_or_shutdown(STAGGER_UNIT * group_index as u32).await;

    let chunks = build_chunks(&repository, &group.variable_names);
    if chunks.is_empty() {
        warn!(group = %group.name, "polling group has no resolvable variables, exiting");
        return;
    }

    loop {
        if shutdown.is_shutdown() {
            debug!(group = %group.name, "polling group shutting down");
            return;
        }

        let started = Instant::now();
        if !run_pass(&sender, &chunks, &mut shutdown).await {
            return;
        }
        let elapsed = started.elapsed();

        let remaining = group.cadence.saturating_sub(elapsed);
        debug!(group = %group.name, elapsed_ms = elapsed.as_millis(), sleep_ms = remaining.as_millis(), "poll pass complete");
        shutdown.wait_or_shutdown(remaining).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::fixtures::{sample_repository_with_settings_group, settings_group_names};

    #[test]
    fn chunking_splits_twenty_three_variables_into_three_frames() {
        let repository = sample_repository_with_settings_group();
        let names = settings_group_names();
        let chunks = build_chunks(&repository, &names);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].messages.len(), 10);
        assert_eq!(chunks[1].messages.len(), 10);
        assert_eq!(chunks[2].messages.len(), 3);
    }

    #[test]
    fn unknown_variable_names_are_skipped_not_fatal() {
        let repository = sample_repository_with_settings_group();
        let names = vec!["DOES_NOT_EXIST".to_owned()];
        let chunks = build_chunks(&repository, &names);
        assert!(chunks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn group_stops_promptly_on_shutdown_during_stagger() {
        let repository = std::sync::Arc::new(sample_repository_with_settings_group());
        let (tx, _rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let group = PollingGroup {
            name: "settings".to_owned(),
            cadence: Duration::from_secs(60),
            variable_names: settings_group_names(),
        };

        let handle = tokio::spawn(run_group(repository, group, 3, tx, ShutdownSignal::new(shutdown_rx)));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("group task should exit promptly after shutdown")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn group_with_no_resolvable_variables_exits_without_sending() {
        let repository = std::sync::Arc::new(sample_repository_with_settings_group());
        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let group = PollingGroup {
            name: "empty".to_owned(),
            cadence: Duration::from_secs(60),
            variable_names: vec!["NOPE".to_owned()],
        };

        run_group(repository, group, 0, tx, ShutdownSignal::new(shutdown_rx)).await;
        assert!(rx.try_recv().is_err());
    }
}
