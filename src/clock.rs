//! Wall-clock value types shared by the engine, the gateway and the
//! time-source adapter.
//!
//! The engine only ever sees hour/minute granularity plus a "connected"
//! flag; seconds are carried for status display.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Minutes in a day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Accepted fixed timezone offsets, in whole hours.
pub const UTC_OFFSET_RANGE: core::ops::RangeInclusive<i8> = -12..=14;

/// A validated hour/minute pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    /// `None` if `hour > 23` or `minute > 59`.
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            None
        } else {
            Some(Self { hour, minute })
        }
    }

    /// Inverse of [`minute_of_day`](Self::minute_of_day); wraps past midnight.
    pub const fn from_minute_of_day(minutes: u16) -> Self {
        let m = minutes % MINUTES_PER_DAY;
        Self {
            hour: (m / 60) as u8,
            minute: (m % 60) as u8,
        }
    }

    pub const fn hour(self) -> u8 {
        self.hour
    }

    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// `hour * 60 + minute`.
    pub const fn minute_of_day(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

/// Zero-padded `HH:MM`.
impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One reading from the external time source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// The source holds a trusted current time.
    pub connected: bool,
}

impl ClockSample {
    pub const fn connected(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            second: 0,
            connected: true,
        }
    }

    pub const fn disconnected() -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            connected: false,
        }
    }

    pub const fn with_second(mut self, second: u8) -> Self {
        self.second = second;
        self
    }

    /// The trusted time of day, or `None` when the source is disconnected
    /// or reports an impossible value.
    pub fn time_of_day(&self) -> Option<TimeOfDay> {
        if !self.connected {
            return None;
        }
        TimeOfDay::new(self.hour, self.minute)
    }

    /// `HH:MM:SS`, or `--:--:--` while the time is unknown.
    pub fn formatted(&self) -> heapless::String<8> {
        let mut s = heapless::String::new();
        let _ = match self.time_of_day() {
            Some(t) if self.second < 60 => core::fmt::Write::write_fmt(
                &mut s,
                format_args!("{t}:{:02}", self.second),
            ),
            _ => s.push_str("--:--:--").map_err(|_| fmt::Error),
        };
        s
    }
}

/// Split a Unix timestamp into a local [`ClockSample`] using a fixed
/// whole-hour offset.  No daylight-saving rules are applied.
pub fn sample_from_unix(unix_secs: i64, utc_offset_hours: i8) -> ClockSample {
    let local = unix_secs + i64::from(utc_offset_hours) * 3600;
    let secs_of_day = local.rem_euclid(86_400);
    ClockSample {
        hour: (secs_of_day / 3600) as u8,
        minute: (secs_of_day % 3600 / 60) as u8,
        second: (secs_of_day % 60) as u8,
        connected: true,
    }
}
