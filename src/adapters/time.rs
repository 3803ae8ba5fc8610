//! Wall-clock adapter.
//!
//! Implements [`ClockPort`] from the system clock.
//!
//! - **`target_os = "espidf"`**: starts the ESP-IDF SNTP client against
//!   `pool.ntp.org`; the system clock is set once a reply arrives.
//! - **`not(target_os = "espidf")`**: reads the host clock directly.
//!
//! The clock counts as trusted once it reads later than 2020-01-01; an
//! unsynced ESP32 boots at the Unix epoch.  Local time is UTC plus a
//! fixed whole-hour offset, with no daylight-saving rules.

use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::app::ports::ClockPort;
use crate::clock::{ClockSample, sample_from_unix};

/// Anything earlier means the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

/// Local sample for `unix_secs`, or a disconnected one before sync.
pub fn sample_at(unix_secs: i64, utc_offset_hours: i8) -> ClockSample {
    if unix_secs < EPOCH_2020 {
        return ClockSample::disconnected();
    }
    sample_from_unix(unix_secs, utc_offset_hours)
}

pub struct SntpClock {
    utc_offset_hours: i8,
    #[cfg(target_os = "espidf")]
    _sntp: esp_idf_svc::sntp::EspSntp<'static>,
}

impl SntpClock {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, esp_idf_svc::sys::EspError> {
        let sntp = esp_idf_svc::sntp::EspSntp::new_default()?;
        info!("SntpClock: SNTP client started");
        Ok(Self {
            utc_offset_hours: 0,
            _sntp: sntp,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, core::convert::Infallible> {
        info!("SntpClock: host clock backend");
        Ok(Self { utc_offset_hours: 0 })
    }

    pub fn utc_offset_hours(&self) -> i8 {
        self.utc_offset_hours
    }

    fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}

impl ClockPort for SntpClock {
    fn sample(&self) -> ClockSample {
        sample_at(Self::unix_now(), self.utc_offset_hours)
    }

    fn set_utc_offset_hours(&mut self, hours: i8) {
        self.utc_offset_hours = hours;
        info!("SntpClock: UTC offset set to {:+} h", hours);
    }
}
