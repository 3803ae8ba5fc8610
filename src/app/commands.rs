//! Inbound commands to the application service and their replies.
//!
//! The configuration gateway parses HTTP requests into [`AppCommand`]s;
//! the [`AppService`](super::service::AppService) executes them on the
//! control loop and answers with an [`AppResponse`].

use core::fmt;

use crate::error::{DispenseError, ScheduleError};
use crate::schedule::{DispenseEvent, Schedule};

use super::events::DeviceStatus;
use super::ports::ConnectivityError;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Report configured state, event count, connectivity and time.
    GetStatus,

    /// Join a WiFi network and set the fixed timezone offset.
    ConfigureNetwork {
        ssid: String,
        password: String,
        timezone_offset_hours: i32,
    },

    /// Replace the whole schedule.
    SetSchedule(Vec<DispenseEvent>),

    /// Read back the current schedule.
    GetSchedule,

    /// Dispense now, outside the schedule.
    ManualDispense { quantity: u16 },
}

/// Why a command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Schedule(ScheduleError),
    Dispense(DispenseError),
    Connectivity(ConnectivityError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(e) => write!(f, "{e}"),
            Self::Dispense(e) => write!(f, "{e}"),
            Self::Connectivity(e) => write!(f, "{e}"),
        }
    }
}

impl From<ScheduleError> for CommandError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<DispenseError> for CommandError {
    fn from(e: DispenseError) -> Self {
        Self::Dispense(e)
    }
}

impl From<ConnectivityError> for CommandError {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

/// Result of one [`AppCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppResponse {
    Status(DeviceStatus),
    NetworkConfigured,
    ScheduleApplied { installed: usize },
    Schedule(Schedule),
    Dispensed { quantity: u16 },
    Rejected(CommandError),
}
