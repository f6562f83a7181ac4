//! Packet-quality monitor (C6, `spec.md` §4.6): per-hour/per-day valid and
//! invalid frame counters, threshold alerts, and bounded rings of
//! hourly/daily/weekly reports, snapshotted to disk so counters survive a
//! restart.
//!
//! Ownership is singular (`spec.md` §9 design note): one `QualityMonitor`,
//! constructed once in `runtime.rs` and shared by reference with the
//! framer/scheduler/control-ingress call sites that classify packets —
//! unlike the original's module-level singleton.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use test_support::Clock;
use tokio::sync::watch;
use tracing::{info, warn};

const HOURLY_RING_CAPACITY: usize = 24;
const DAILY_RING_CAPACITY: usize = 30;
const WEEKLY_RING_CAPACITY: usize = 12;
/// `spec.md` §4.6: "logs a single warning per every 1,000 packets."
const ALERT_CHECK_INTERVAL: u64 = 1000;
const SNAPSHOT_MIN_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Valid,
    Invalid,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Counts {
    pub total: u64,
    pub invalid: u64,
}

impl Counts {
    fn record(&mut self, classification: Classification) {
        self.total += 1;
        if classification == Classification::Invalid {
            self.invalid += 1;
        }
    }

    pub fn invalid_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.invalid as f64 / self.total as f64
        }
    }
}

/// A rendered periodic report, kept in a bounded ring (`spec.md` §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub period: String,
    pub counts: Counts,
    /// Whether this period's invalid rate crossed the report threshold
    /// (`spec.md` §4.6: "report threshold = 0.05 ... used in periodic
    /// reports"), computed once at emission time against the threshold the
    /// monitor was configured with.
    #[serde(default)]
    pub over_report_threshold: bool,
}

impl Report {
    /// Human-readable summary. Log formatting proper belongs to the
    /// out-of-scope UI layer (`spec.md` §1); this is the plain data the
    /// runtime logs at `info` when a report fires.
    pub fn summary(&self) -> String {
        let base = format!(
            "{}: {} packets, {} invalid ({:.2}% invalid rate)",
            self.period,
            self.counts.total,
            self.counts.invalid,
            self.counts.invalid_rate() * 100.0
        );
        if self.over_report_threshold {
            format!("{base} — above report threshold")
        } else {
            base
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QualityState {
    aggregate: Counts,
    hour_buckets: HashMap<String, Counts>,
    day_buckets: HashMap<String, Counts>,
    hourly_reports: VecDeque<Report>,
    daily_reports: VecDeque<Report>,
    weekly_reports: VecDeque<Report>,
    #[serde(skip)]
    last_snapshot_unix: Option<i64>,
}

pub struct QualityMonitor<C: Clock = test_support::SystemClock> {
    clock: C,
    alert_threshold: f64,
    report_threshold: f64,
    snapshot_path: PathBuf,
    state: Mutex<QualityState>,
}

impl<C: Clock> QualityMonitor<C> {
    pub fn new(
        clock: C,
        alert_threshold: f64,
        report_threshold: f64,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        let snapshot_path = snapshot_path.into();
        let state = load_snapshot(&snapshot_path).unwrap_or_default();
        QualityMonitor {
            clock,
            alert_threshold,
            report_threshold,
            snapshot_path,
            state: Mutex::new(state),
        }
    }

    /// Record one framer classification event (`spec.md` §4.6): bumps the
    /// aggregate, the current hour bucket, and the current day bucket.
    pub fn record(&self, classification: Classification) {
        let now = self.clock.now_utc();
        let hour_key = now.format("%Y-%m-%d %H").to_string();
        let day_key = now.format("%Y-%m-%d").to_string();

        let mut state = self.state.lock().expect("quality state lock");
        state.aggregate.record(classification);
        state.hour_buckets.entry(hour_key).or_default().record(classification);
        state.day_buckets.entry(day_key).or_default().record(classification);

        if state.aggregate.total % ALERT_CHECK_INTERVAL == 0
            && state.aggregate.invalid_rate() > self.alert_threshold
        {
            warn!(
                total = state.aggregate.total,
                invalid = state.aggregate.invalid,
                rate = state.aggregate.invalid_rate(),
                threshold = self.alert_threshold,
                "invalid packet rate over alert threshold"
            );
        }

        self.maybe_snapshot(&mut state, now.timestamp());
    }

    /// `spec.md` §8 invariant: `sum(hour.total) == day.total == aggregate.total`.
    pub fn aggregate(&self) -> Counts {
        self.state.lock().expect("quality state lock").aggregate
    }

    /// The monitor's own notion of "now" — wall-clock time, used only for
    /// bucket keys and report alignment (`spec.md` §5).
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    pub fn day_counts(&self, day_key: &str) -> Counts {
        self.state
            .lock()
            .expect("quality state lock")
            .day_buckets
            .get(day_key)
            .copied()
            .unwrap_or_default()
    }

    /// Render and push an hourly report for `hour_key`, evicting the oldest
    /// entry once the ring exceeds 24 (`spec.md` §4.6).
    pub fn emit_hourly_report(&self, hour_key: &str) -> Report {
        let mut state = self.state.lock().expect("quality state lock");
        let counts = state.hour_buckets.get(hour_key).copied().unwrap_or_default();
        let report = Report {
            period: hour_key.to_owned(),
            counts,
            over_report_threshold: counts.invalid_rate() > self.report_threshold,
        };
        push_bounded(&mut state.hourly_reports, report.clone(), HOURLY_RING_CAPACITY);
        report
    }

    /// Render and push a daily report for `day_key`.
    pub fn emit_daily_report(&self, day_key: &str) -> Report {
        let mut state = self.state.lock().expect("quality state lock");
        let counts = state.day_buckets.get(day_key).copied().unwrap_or_default();
        let report = Report {
            period: day_key.to_owned(),
            counts,
            over_report_threshold: counts.invalid_rate() > self.report_threshold,
        };
        push_bounded(&mut state.daily_reports, report.clone(), DAILY_RING_CAPACITY);
        report
    }

    /// Render and push a weekly report, summing the structured daily
    /// reports directly rather than re-parsing rendered text (`spec.md` §9
    /// design note — a deliberate divergence from the Python original).
    pub fn emit_weekly_report(&self, week_label: &str) -> Report {
        let mut state = self.state.lock().expect("quality state lock");
        let counts = state
            .daily_reports
            .iter()
            .rev()
            .take(7)
            .fold(Counts::default(), |mut acc, r| {
                acc.total += r.counts.total;
                acc.invalid += r.counts.invalid;
                acc
            });
        let report = Report {
            period: week_label.to_owned(),
            counts,
            over_report_threshold: counts.invalid_rate() > self.report_threshold,
        };
        push_bounded(&mut state.weekly_reports, report.clone(), WEEKLY_RING_CAPACITY);
        report
    }

    fn maybe_snapshot(&self, state: &mut QualityState, now_unix: i64) {
        let due = match state.last_snapshot_unix {
            Some(last) => now_unix - last >= SNAPSHOT_MIN_INTERVAL_SECS,
            None => true,
        };
        if !due {
            return;
        }
        state.last_snapshot_unix = Some(now_unix);
        if let Err(e) = write_snapshot(&self.snapshot_path, state) {
            warn!(error = %e, path = %self.snapshot_path.display(), "failed to persist quality snapshot");
        }
    }
}

/// How long to sleep from `now` until the start of the next clock hour
/// (`spec.md` §4.6: hourly report "aligned to `:00`").
fn duration_until_next_hour(now: DateTime<Utc>) -> StdDuration {
    let next = (now + chrono::Duration::hours(1))
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    (next - now).to_std().unwrap_or(StdDuration::from_secs(1))
}

/// How long to sleep from `now` until the next local midnight (`spec.md`
/// §4.6: daily report "aligned to `00:00`").
fn duration_until_next_midnight(now: DateTime<Utc>) -> StdDuration {
    let next = (now + chrono::Duration::days(1))
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    (next - now).to_std().unwrap_or(StdDuration::from_secs(1))
}

/// How long to sleep from `now` until the next occurrence of `weekday` at
/// midnight (`spec.md` §4.6: weekly report "aligned to the same
/// day-of-week at `00:00`" — the original implementation uses Sunday).
fn duration_until_next_weekday_midnight(now: DateTime<Utc>, weekday: Weekday) -> StdDuration {
    let today_midnight = now
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let mut days_ahead = (weekday.num_days_from_monday() as i64
        - now.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    if days_ahead == 0 && now > today_midnight {
        days_ahead = 7;
    }
    let next = today_midnight + chrono::Duration::days(days_ahead);
    (next - now).to_std().unwrap_or(StdDuration::from_secs(1))
}

/// Sleep until the next matching alignment point, or return early if
/// `shutdown` fires first. Returns `false` if shutdown won the race.
async fn sleep_or_shutdown(duration: StdDuration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.changed() => false,
    }
}

/// Periodic hourly report task (`spec.md` §4.6). Runs until `shutdown`
/// fires; at every `:00` boundary it renders and persists a report for the
/// hour that just finished.
pub async fn run_hourly_report_loop<C: Clock>(monitor: Arc<QualityMonitor<C>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = monitor.now();
        if !sleep_or_shutdown(duration_until_next_hour(now), &mut shutdown).await {
            return;
        }
        if *shutdown.borrow() {
            return;
        }
        let completed_hour = monitor.now() - chrono::Duration::hours(1);
        let hour_key = completed_hour.format("%Y-%m-%d %H").to_string();
        let report = monitor.emit_hourly_report(&hour_key);
        info!(report = %report.summary(), "hourly packet-quality report");
    }
}

/// Periodic daily report task (`spec.md` §4.6). Runs until `shutdown`
/// fires; at every local midnight it renders and persists a report for the
/// day that just finished.
pub async fn run_daily_report_loop<C: Clock>(monitor: Arc<QualityMonitor<C>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = monitor.now();
        if !sleep_or_shutdown(duration_until_next_midnight(now), &mut shutdown).await {
            return;
        }
        if *shutdown.borrow() {
            return;
        }
        let completed_day = monitor.now() - chrono::Duration::days(1);
        let day_key = completed_day.format("%Y-%m-%d").to_string();
        let report = monitor.emit_daily_report(&day_key);
        info!(report = %report.summary(), "daily packet-quality report");
    }
}

/// Periodic weekly report task (`spec.md` §4.6). Runs until `shutdown`
/// fires; at every Sunday midnight it renders and persists a report summing
/// the last seven daily reports.
pub async fn run_weekly_report_loop<C: Clock>(monitor: Arc<QualityMonitor<C>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = monitor.now();
        if !sleep_or_shutdown(duration_until_next_weekday_midnight(now, Weekday::Sun), &mut shutdown).await {
            return;
        }
        if *shutdown.borrow() {
            return;
        }
        let now = monitor.now();
        let week_label = format!("{}-W{:02}", now.iso_week().year(), now.iso_week().week());
        let report = monitor.emit_weekly_report(&week_label);
        info!(report = %report.summary(), "weekly packet-quality report");
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    ring.push_back(item);
    while ring.len() > capacity {
        ring.pop_front();
    }
}

fn load_snapshot(path: &Path) -> Option<QualityState> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_snapshot(path: &Path, state: &QualityState) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, json)
}
