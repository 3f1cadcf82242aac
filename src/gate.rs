//! Closed-hours gate
//!
//! Decides whether a resource is closed at a given instant. The closed window
//! is a daily range of wall-clock hours in a configured time zone; it may wrap
//! past midnight, and a window whose start equals its end is closed all day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::clock::{WallTime, Zone};
use crate::countdown::{self, CountdownValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("{field} must be an hour between 0 and 23, got {value}")]
    HourOutOfRange { field: &'static str, value: u32 },
}

/// Closed-hours configuration as supplied by the content source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedHoursConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl ClosedHoursConfig {
    pub fn new(start_hour: u32, end_hour: u32, time_zone: Option<&str>) -> Self {
        Self {
            start_hour,
            end_hour,
            time_zone: time_zone.map(str::to_string),
        }
    }

    /// Closed window that is the complement of a daily opening window.
    /// Opening 09:00-17:00 is closed from 17:00 to 09:00.
    pub fn from_open_hours(open_hour: u32, close_hour: u32, time_zone: Option<&str>) -> Self {
        Self::new(close_hour, open_hour, time_zone)
    }

    pub fn window(&self) -> Result<ClosedWindow, GateError> {
        ClosedWindow::new(self.start_hour, self.end_hour)
    }
}

/// Validated pair of closed-window hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosedWindow {
    start_hour: u32,
    end_hour: u32,
}

impl ClosedWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, GateError> {
        if start_hour > 23 {
            return Err(GateError::HourOutOfRange {
                field: "startHour",
                value: start_hour,
            });
        }
        if end_hour > 23 {
            return Err(GateError::HourOutOfRange {
                field: "endHour",
                value: end_hour,
            });
        }
        Ok(Self { start_hour, end_hour })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Whether the wall-clock `hour` falls inside the window
    pub fn contains(&self, hour: u32) -> bool {
        is_closed_at(hour, self.start_hour, self.end_hour)
    }

    /// True when the window never opens
    pub fn is_all_day(&self) -> bool {
        self.start_hour == self.end_hour
    }
}

/// Testable core: is `hour` inside the closed window `[start, end)`
pub fn is_closed_at(hour: u32, start_hour: u32, end_hour: u32) -> bool {
    if start_hour < end_hour {
        hour >= start_hour && hour < end_hour
    } else if start_hour > end_hour {
        hour >= start_hour || hour < end_hour
    } else {
        true
    }
}

/// Result of evaluating the gate at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSnapshot {
    pub closed: bool,
    pub remaining: Option<CountdownValue>,
    pub evaluated_at: DateTime<Utc>,
}

/// Closed-hours evaluator bound to a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedHoursGate {
    window: Option<ClosedWindow>,
    zone: Zone,
}

impl ClosedHoursGate {
    /// Build a gate from optional configuration.
    ///
    /// Without configuration the gate never closes. With `zone_aware` off the
    /// configured zone is ignored and local time is used.
    pub fn new(config: Option<&ClosedHoursConfig>, zone_aware: bool) -> Result<Self, GateError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let window = config.window()?;
        let zone = if zone_aware {
            Zone::resolve(config.time_zone.as_deref())
        } else {
            Zone::Local
        };

        Ok(Self {
            window: Some(window),
            zone,
        })
    }

    /// Gate that is never closed
    pub fn disabled() -> Self {
        Self {
            window: None,
            zone: Zone::Local,
        }
    }

    /// Gate over an explicit window and zone
    pub fn with_zone(window: ClosedWindow, zone: Zone) -> Self {
        Self {
            window: Some(window),
            zone,
        }
    }

    pub fn window(&self) -> Option<ClosedWindow> {
        self.window
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn is_enabled(&self) -> bool {
        self.window.is_some()
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.closed_at_wall(self.zone.wall_time(now))
    }

    /// Time until the closed state next flips; `None` when it never does
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<CountdownValue> {
        self.remaining_at_wall(self.zone.wall_time(now))
    }

    /// Closed state and countdown from a single wall-clock reading
    pub fn evaluate(&self, now: DateTime<Utc>) -> GateSnapshot {
        let wall = self.zone.wall_time(now);
        let snapshot = GateSnapshot {
            closed: self.closed_at_wall(wall),
            remaining: self.remaining_at_wall(wall),
            evaluated_at: now,
        };
        debug!(
            "Gate evaluated at {:02}:{:02}:{:02} ({}): closed={}",
            wall.hour,
            wall.minute,
            wall.second,
            self.zone.name(),
            snapshot.closed
        );
        snapshot
    }

    fn closed_at_wall(&self, wall: WallTime) -> bool {
        self.window.is_some_and(|w| w.contains(wall.hour))
    }

    fn remaining_at_wall(&self, wall: WallTime) -> Option<CountdownValue> {
        let window = self.window?;
        countdown::seconds_until_transition_at(window, wall).map(CountdownValue::from_secs)
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn closed_window_matches_definition() {
        let hour: u32 = kani::any();
        kani::assume(hour < 24);
        let start: u32 = kani::any();
        kani::assume(start < 24);
        let end: u32 = kani::any();
        kani::assume(end < 24);

        let result = is_closed_at(hour, start, end);

        let expected = if start == end {
            true
        } else if start < end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        };
        kani::assert(result == expected, "closed-hours check must be consistent");
    }

    #[kani::proof]
    fn window_is_never_empty() {
        let start: u32 = kani::any();
        kani::assume(start < 24);
        let end: u32 = kani::any();
        kani::assume(end < 24);

        // The start hour itself is always closed
        kani::assert(is_closed_at(start, start, end), "start hour must be closed");
    }
}
