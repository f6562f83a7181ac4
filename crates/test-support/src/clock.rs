//! An injectable clock, so quality-monitor bucket-key tests don't depend on
//! wall-clock time (`spec.md` §5: "wall-clock time is used only for bucket
//! keys in C6").

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Lets a caller hand an owning struct a clock while keeping its own handle
/// to advance it later, e.g. `Arc<FixedClock>` shared between a test and the
/// `ControlIngress`/`QualityMonitor` it drives.
impl<T: Clock> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        T::now_utc(self)
    }
}

/// The real clock, used by the running gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock fixed (and advanceable) by the test, so hour/day bucket rollover
/// and report-alignment sleeps can be exercised deterministically.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(t: DateTime<Utc>) -> Self {
        FixedClock(Mutex::new(t))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().expect("clock lock");
        *guard += delta;
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.0.lock().expect("clock lock") = t;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}
