//! End-to-end coverage of the quality-monitor snapshot persistence described
//! in `spec.md` §4.6: counters survive a process restart by reloading the
//! JSON snapshot written to disk.

use chrono::{TimeZone, Utc};
use gateway::quality::{Classification, QualityMonitor};
use test_support::FixedClock;

#[tokio::test]
async fn counts_recorded_before_restart_are_visible_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("quality.json");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    {
        let monitor = QualityMonitor::new(FixedClock::at(now), 0.15, 0.05, snapshot_path.clone());
        for _ in 0..6 {
            monitor.record(Classification::Valid);
        }
        for _ in 0..2 {
            monitor.record(Classification::Invalid);
        }
        // `record` snapshots unconditionally the first time it's called
        // (`last_snapshot_unix` starts unset), so the file exists once this
        // block ends even though the 60s throttle would otherwise suppress
        // most of these calls.
    }

    assert!(snapshot_path.exists(), "quality monitor should have written a snapshot");

    let reloaded = QualityMonitor::new(FixedClock::at(now), 0.15, 0.05, snapshot_path);
    let counts = reloaded.aggregate();
    assert_eq!(counts.total, 8);
    assert_eq!(counts.invalid, 2);
}
