//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, status display).

use core::net::Ipv4Addr;

use crate::app::ports::{ConnectivityError, StorageError};
use crate::clock::TimeOfDay;
use crate::error::{ActuatorError, CodecError};

/// What asked for a dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseSource {
    Scheduled { index: usize, at: TimeOfDay },
    Manual,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The persisted schedule was loaded and the service is running.
    Started {
        events: usize,
        configured: bool,
        timezone_offset_hours: i8,
    },

    /// A persisted event record could not be restored.
    RecordSkipped(CodecError),

    /// The time source became trusted (`true`) or was lost (`false`).
    ClockSource(bool),

    /// Fired flags were cleared for a new day.
    DayRolledOver(TimeOfDay),

    Dispensed { source: DispenseSource, quantity: u16 },

    /// The mechanism stopped early.  A scheduled event stays fired.
    DispenseFailed {
        source: DispenseSource,
        error: ActuatorError,
    },

    ScheduleReplaced { installed: usize, submitted: usize },

    TimezoneChanged(i8),

    NetworkJoined,
    NetworkFailed(ConnectivityError),

    /// A change was applied in memory but could not be written to flash.
    PersistFailed(StorageError),
}

/// Point-in-time device status for the gateway and the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub configured: bool,
    pub schedule_count: usize,
    pub wifi_connected: bool,
    /// `HH:MM:SS`, or `--:--:--` while the clock is untrusted.
    pub current_time: heapless::String<8>,
    pub next_dispense: Option<TimeOfDay>,
    pub timezone_offset_hours: i8,
    pub ap_ip: Option<Ipv4Addr>,
    pub wifi_ip: Option<Ipv4Addr>,
}
