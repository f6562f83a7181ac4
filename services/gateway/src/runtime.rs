//! Gateway runtime (C10, `spec.md` §4.10): owns every long-running task —
//! the device-bus connection and its reconnect policy, the three polling
//! groups, control ingress, and publication — behind one shutdown signal.
//!
//! Grounded on the teacher's single-ownership worker model (`workers/*` are
//! constructed once by a top-level driver and handed their channels; no
//! task reaches back into a global) generalized to a transport that can be
//! lost and must reconnect, which the teacher's in-process worker model
//! never had to do.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bus_core::Frame;
use repository::Repository;
use test_support::SystemClock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use transport::{FrameEvent, Transport};

use crate::config::{GatewayConfig, TransportConfig};
use crate::control::ControlIngress;
use crate::publish::{AggregateInputNames, Publication};
use crate::pubsub::{self, ControlSource, MqttControlSource, MqttPublisher};
use crate::quality::{self, Classification, QualityMonitor};
use crate::scheduler::{self, PollingGroup, ShutdownSignal};

/// Reconnect backoff schedule (`spec.md` §4.10): 1s, 5s, 30s, capped.
const BACKOFF_SCHEDULE_SECS: [u64; 3] = [1, 5, 30];

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to load repository: {0}")]
    Repository(#[from] repository::RepositoryError),
    #[error("pub/sub connection failed: {0}")]
    PubSub(#[from] pubsub::PubSubError),
}

/// `--dump <path>` / `--dry-run` (`spec.md` §6): independent of the TOML
/// config, since they're session-scoped CLI concerns rather than deployment
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    /// Append every raw byte read off the live bus here.
    pub dump_path: Option<String>,
    /// Replay a previously recorded dump file instead of opening the
    /// configured transport.
    pub dry_run_path: Option<String>,
}

pub struct Runtime {
    config: GatewayConfig,
    trace: TraceOptions,
}

impl Runtime {
    pub fn new(config: GatewayConfig) -> Self {
        Runtime {
            config,
            trace: TraceOptions::default(),
        }
    }

    pub fn with_trace_options(config: GatewayConfig, trace: TraceOptions) -> Self {
        Runtime { config, trace }
    }

    /// Run the gateway until `shutdown_rx` fires. Every subsystem task is
    /// owned here; when this function returns, every task it spawned has
    /// been asked to stop (though some may still be unwinding in the
    /// background — callers that need a hard join should await the
    /// returned `JoinSet` themselves in a future extension).
    pub async fn run(self, mut external_shutdown: watch::Receiver<bool>) -> Result<(), RuntimeError> {
        let repository = Arc::new(Repository::load_from_path(Path::new(&self.config.repository_path))?);

        let quality = Arc::new(QualityMonitor::new(
            SystemClock,
            self.config.quality.alert_threshold,
            self.config.quality.report_threshold,
            self.config.quality.snapshot_path.clone(),
        ));

        let (client, eventloop) = pubsub::connect(
            &self.config.pubsub.client_id,
            &self.config.pubsub.broker_host,
            self.config.pubsub.broker_port,
            &self.config.pubsub.prefix,
        )
        .await?;

        let publication = Arc::new(Publication::new(
            MqttPublisher::new(client),
            self.config.pubsub.prefix.clone(),
            self.config.pubsub.discovery_root.clone(),
            self.config.pubsub.platform.clone(),
            self.config.pubsub.device_id.clone(),
            AggregateInputNames::default(),
        ));

        let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = JoinSet::new();

        for (i, group_cfg) in self.config.polling_groups.iter().enumerate() {
            let group = PollingGroup {
                name: group_cfg.name.clone(),
                cadence: Duration::from_secs(group_cfg.cadence_seconds),
                variable_names: group_cfg.variables.clone(),
            };
            let repository = repository.clone();
            let sender = outbound_tx.clone();
            let shutdown = ShutdownSignal::new(shutdown_rx.clone());
            tasks.spawn(async move {
                scheduler::run_group(repository, group, i, sender, shutdown).await;
            });
        }

        tasks.spawn(quality::run_hourly_report_loop(quality.clone(), shutdown_rx.clone()));
        tasks.spawn(quality::run_daily_report_loop(quality.clone(), shutdown_rx.clone()));
        tasks.spawn(quality::run_weekly_report_loop(quality.clone(), shutdown_rx.clone()));

        tasks.spawn(run_control_loop(
            repository.clone(),
            MqttControlSource::new(eventloop, &self.config.pubsub.prefix),
            outbound_tx.clone(),
            Duration::from_secs(self.config.control.command_timeout_secs),
            shutdown_rx.clone(),
        ));

        tasks.spawn(run_transport_loop(
            self.config.transport.clone(),
            self.trace.clone(),
            repository.clone(),
            quality.clone(),
            publication.clone(),
            outbound_rx,
            shutdown_rx.clone(),
        ));

        // Wait for whichever comes first: an external shutdown request, or
        // every owned task ending on its own (which would indicate a bug —
        // none of these loops are supposed to return while running).
        tokio::select! {
            _ = external_shutdown.changed() => {
                info!("shutdown requested");
            }
            _ = async {
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = %e, "gateway subsystem task panicked");
                    }
                }
            } => {
                warn!("all gateway subsystem tasks exited unexpectedly");
            }
        }

        let _ = shutdown_tx.send(true);
        tasks.shutdown().await;
        Ok(())
    }
}

/// Consumes inbound control commands from the pub/sub bus and periodically
/// sweeps for due read-back follow-ups (`spec.md` §4.8).
async fn run_control_loop(
    repository: Arc<Repository>,
    mut control_source: impl ControlSource,
    outbound: mpsc::Sender<Frame>,
    command_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ingress = ControlIngress::new(repository, outbound.clone(), command_timeout, SystemClock);
    let mut sweep = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            cmd = control_source.next_command() => {
                match cmd {
                    Some(cmd) => {
                        if let Err(e) = ingress.write(&cmd.variable, &cmd.text, true).await {
                            warn!(variable = %cmd.variable, error = %e, "control command rejected");
                        }
                    }
                    None => {
                        warn!("control source ended; control ingress stopping");
                        return;
                    }
                }
            }
            _ = sweep.tick() => {
                for frame in ingress.due_read_backs() {
                    if outbound.send(frame).await.is_err() {
                        return;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

/// Owns the device-bus connection across its whole lifetime: opens it,
/// drives the framer (reader) and the outbound write queue (writer)
/// concurrently, and on disconnect waits out the backoff schedule before
/// trying again. Never returns except on shutdown.
async fn run_transport_loop(
    transport_config: TransportConfig,
    trace: TraceOptions,
    repository: Arc<Repository>,
    quality: Arc<QualityMonitor<SystemClock>>,
    publication: Arc<Publication<MqttPublisher>>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt = 0usize;

    let mut dump_sink = match &trace.dump_path {
        Some(path) => match transport::DumpSink::create(path).await {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!(error = %e, path = %path, "failed to open dump sink, continuing without tracing");
                None
            }
        },
        None => None,
    };

    loop {
        if *shutdown.borrow() {
            return;
        }

        let transport = match open_transport(&transport_config, &trace).await {
            Ok(t) => {
                info!(kind = t.kind(), "device-bus transport connected");
                attempt = 0;
                t
            }
            Err(e) => {
                let delay = backoff_delay(attempt);
                attempt += 1;
                warn!(error = %e, delay_secs = delay.as_secs(), "failed to open device-bus transport, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = shutdown.changed() => return,
                }
            }
        };

        let (mut read_half, mut write_half) = transport.split();
        let (event_tx, mut event_rx) = mpsc::channel::<FrameEvent>(64);

        let reader = transport::framer::run(&mut read_half, event_tx, dump_sink.as_mut());

        let classify = async {
            while let Some(event) = event_rx.recv().await {
                classify_and_publish(&repository, &quality, &publication, event).await;
            }
        };

        let writer = async {
            loop {
                match outbound_rx.recv().await {
                    Some(frame) => {
                        if let Err(e) = write_half.write_all(&frame.serialize()).await {
                            return Err(e);
                        }
                    }
                    None => return Ok(()),
                }
            }
        };

        tokio::select! {
            result = reader => {
                if let Err(e) = result {
                    warn!(error = %e, "device-bus transport disconnected (reader)");
                }
            }
            _ = classify => {
                warn!("frame event channel closed unexpectedly");
            }
            result = writer => {
                if let Err(e) = result {
                    warn!(error = %e, "device-bus transport disconnected (writer)");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn classify_and_publish(
    repo: &Repository,
    quality: &QualityMonitor<SystemClock>,
    publication: &Publication<MqttPublisher>,
    event: FrameEvent,
) {
    let bytes = match event {
        FrameEvent::Invalid => {
            quality.record(Classification::Invalid);
            return;
        }
        FrameEvent::Candidate(bytes) => bytes,
    };

    match Frame::parse(&bytes) {
        Ok(frame) => {
            quality.record(Classification::Valid);
            for msg in &frame.messages {
                let Some(entry) = repo.by_address(msg.address) else {
                    continue;
                };
                let value = repository::decode_value(repo, msg);
                publication.publish_reading(&entry.name, &value).await;
            }
        }
        Err(e) => {
            quality.record(Classification::Invalid);
            warn!(error = %e, "frame failed to parse after framer accepted it");
        }
    }
}

async fn open_transport(
    config: &TransportConfig,
    trace: &TraceOptions,
) -> Result<Transport, transport::TransportError> {
    if let Some(path) = &trace.dry_run_path {
        return transport::file::open_replay(path).await;
    }
    match config {
        TransportConfig::Serial { path, baud_rate } => transport::serial::open(path, *baud_rate),
        TransportConfig::Tcp { host, port } => transport::tcp::open(host, *port).await,
    }
}

fn backoff_delay(attempt: usize) -> Duration {
    let secs = BACKOFF_SCHEDULE_SECS
        .get(attempt)
        .copied()
        .unwrap_or(*BACKOFF_SCHEDULE_SECS.last().unwrap());
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_ramps_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(5));
        assert_eq!(backoff_delay(2), Duration::from_secs(30));
        assert_eq!(backoff_delay(10), Duration::from_secs(30));
    }
}
