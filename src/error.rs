//! Unified error types for the pill dispenser firmware.
//!
//! Every subsystem error is a small `Copy` enum with a human-readable
//! `Display`, which the configuration gateway returns verbatim.  None of
//! these errors is fatal: the engine stays usable after any of them.

use core::fmt;

// ---------------------------------------------------------------------------
// Schedule errors
// ---------------------------------------------------------------------------

/// Why a single dispense event failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFault {
    /// Hour outside `0..=23`.
    HourOutOfRange,
    /// Minute outside `0..=59`.
    MinuteOutOfRange,
    /// Quantity of zero or less.
    QuantityNotPositive,
    /// Quantity larger than the actuator counter can represent.
    QuantityTooLarge,
}

impl fmt::Display for EventFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HourOutOfRange => write!(f, "hour must be 0-23"),
            Self::MinuteOutOfRange => write!(f, "minute must be 0-59"),
            Self::QuantityNotPositive => write!(f, "quantity must be at least 1"),
            Self::QuantityTooLarge => write!(f, "quantity too large"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The event at `index` of the submitted list is invalid.  The whole
    /// replacement was rejected and the previous schedule kept.
    InvalidEvent { index: usize, fault: EventFault },
    /// Timezone offset outside `-12..=14` hours.
    InvalidTimezone,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEvent { index, fault } => write!(f, "event {index}: {fault}"),
            Self::InvalidTimezone => write!(f, "timezone offset must be -12..=14 hours"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispense / actuator errors
// ---------------------------------------------------------------------------

/// Low-level reason an actuator sequence stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFault {
    /// The PWM channel rejected a duty-cycle write.
    PwmWriteFailed,
    /// A cancel request arrived between units.
    Cancelled,
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A multi-unit dispense that stopped before all units were delivered.
///
/// Units already delivered stand; `completed` reports how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorError {
    pub completed: u16,
    pub requested: u16,
    pub fault: ActuatorFault,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {}/{} units",
            self.fault, self.completed, self.requested
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseError {
    /// Manual dispense of zero (or a non-positive wire value).
    InvalidQuantity,
    /// The actuator stopped part-way through.
    Actuator(ActuatorError),
}

impl fmt::Display for DispenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantity => write!(f, "quantity must be at least 1"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
        }
    }
}

impl From<ActuatorError> for DispenseError {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Persistence codec errors
// ---------------------------------------------------------------------------

/// What was wrong with a persisted event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFault {
    /// The count says the record exists but the key is absent.
    Missing,
    /// The stored bytes are not a valid record value.
    Undecodable,
    /// The value is not an event triple.
    WrongType,
    /// Legacy text record without exactly three fields.
    WrongFieldCount,
    /// Legacy text record with a non-numeric field.
    NonNumeric,
    /// The fields decode but describe an invalid event.
    Invalid(EventFault),
}

impl fmt::Display for RecordFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Undecodable => write!(f, "undecodable"),
            Self::WrongType => write!(f, "wrong value type"),
            Self::WrongFieldCount => write!(f, "expected 3 fields"),
            Self::NonNumeric => write!(f, "non-numeric field"),
            Self::Invalid(fault) => write!(f, "invalid event ({fault})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The event record at `index` was skipped during load.
    CorruptRecord { index: usize, reason: RecordFault },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptRecord { index, reason } => {
                write!(f, "corrupt record sched_{index}: {reason}")
            }
        }
    }
}
