//! Wall-clock capability for the gate
//!
//! The gate never reads system time itself. It receives an instant from a
//! [`Clock`] and converts it to a wall-clock time through a [`Zone`], so the
//! evaluator stays a pure function of its inputs.

use chrono::{DateTime, Local, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;
use tracing::warn;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to (for tests and `--at`)
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Hour, minute and second on a wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WallTime {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl WallTime {
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self { hour, minute, second }
    }

    fn of<T: Timelike>(t: &T) -> Self {
        Self::new(t.hour(), t.minute(), t.second())
    }
}

/// Time zone used to read the wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// The zone of the host system
    Local,
    /// A named IANA zone
    Named(Tz),
}

impl Zone {
    /// Resolve an optional IANA name. Unknown names fall back to the local zone.
    pub fn resolve(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Zone::Local;
        };

        match Self::lookup(name) {
            Some(tz) => Zone::Named(tz),
            None => {
                warn!("Unknown time zone '{}', falling back to local time", name);
                Zone::Local
            }
        }
    }

    /// Look up an IANA name without falling back
    pub fn lookup(name: &str) -> Option<Tz> {
        name.parse::<Tz>().ok()
    }

    /// Wall-clock time of `at` in this zone
    pub fn wall_time(&self, at: DateTime<Utc>) -> WallTime {
        match self {
            Zone::Local => WallTime::of(&at.with_timezone(&Local)),
            Zone::Named(tz) => WallTime::of(&at.with_timezone(tz)),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Zone::Local => "local".to_string(),
            Zone::Named(tz) => tz.name().to_string(),
        }
    }
}
