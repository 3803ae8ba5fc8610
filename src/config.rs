//! Device tunables.
//!
//! Timing and actuator geometry for the dispenser.  Defaults match the
//! stock mechanism; values can be overridden through the NVS-backed
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserConfig {
    // --- Timing ---
    /// Control loop period (milliseconds).
    pub tick_interval_ms: u32,
    /// Status line refresh period (milliseconds).
    pub status_refresh_ms: u32,

    // --- Pulse profile (per unit) ---
    /// How long the gate stays open (milliseconds).
    pub pulse_open_ms: u32,
    /// Settling time after closing, before the next unit (milliseconds).
    pub pulse_close_ms: u32,

    // --- Servo ---
    pub servo_open_degrees: u8,
    pub servo_closed_degrees: u8,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,   // 10 Hz
            status_refresh_ms: 1000, // 1 Hz
            pulse_open_ms: 1000,
            pulse_close_ms: 2000,
            servo_open_degrees: 90,
            servo_closed_degrees: 0,
        }
    }
}

impl DispenserConfig {
    /// Range-check every field.  Out-of-range values are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // One sample per minute is the slowest rate that still sees every
        // minute boundary.
        if !(10..=60_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_ms must be 10-60000",
            ));
        }
        if !(100..=60_000).contains(&self.status_refresh_ms) {
            return Err(ConfigError::ValidationFailed(
                "status_refresh_ms must be 100-60000",
            ));
        }
        if !(50..=10_000).contains(&self.pulse_open_ms) {
            return Err(ConfigError::ValidationFailed(
                "pulse_open_ms must be 50-10000",
            ));
        }
        if !(50..=10_000).contains(&self.pulse_close_ms) {
            return Err(ConfigError::ValidationFailed(
                "pulse_close_ms must be 50-10000",
            ));
        }
        if self.servo_open_degrees > 180 || self.servo_closed_degrees > 180 {
            return Err(ConfigError::ValidationFailed(
                "servo angles must be 0-180",
            ));
        }
        if self.servo_open_degrees == self.servo_closed_degrees {
            return Err(ConfigError::ValidationFailed(
                "servo open and closed angles must differ",
            ));
        }
        Ok(())
    }
}
