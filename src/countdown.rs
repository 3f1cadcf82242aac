//! Countdown to the next closed/open boundary

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::clock::WallTime;
use crate::gate::ClosedWindow;

pub const SECONDS_PER_HOUR: u32 = 3600;
pub const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

/// Time remaining until the next state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CountdownValue {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl CountdownValue {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self { hours, minutes, seconds }
    }

    pub fn from_secs(total: u32) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn total_secs(&self) -> u32 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.total_secs() as u64)
    }
}

impl fmt::Display for CountdownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Seconds from `at` until the first later hour whose closed state differs
/// from the current one. `None` if the state never changes.
///
/// A reading exactly on a boundary (`hh:00:00`) belongs to the period it
/// starts, so the result is that period's full length rather than zero.
pub fn seconds_until_transition_at(window: ClosedWindow, at: WallTime) -> Option<u32> {
    let current = window.contains(at.hour);
    let elapsed_in_hour = at.minute.min(59) * 60 + at.second.min(59);

    (1..=24u32)
        .find(|offset| window.contains((at.hour + offset) % 24) != current)
        .map(|offset| offset * SECONDS_PER_HOUR - elapsed_in_hour)
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}
