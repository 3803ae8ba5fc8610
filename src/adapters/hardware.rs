//! Hardware adapter: bridges the dispensing gate to [`DispenserPort`].
//!
//! Owns the [`ServoDriver`] and a blocking delay.  Each unit is one
//! open/close cycle of the gate:
//!
//! ```text
//!  open ─ pulse_open_ms ─ close ─ pulse_close_ms ─▶ next unit
//! ```
//!
//! A multi-unit dispense blocks the caller for the whole sequence.  The
//! cancel signal is checked before every unit; units already delivered
//! stand.  The signal is cleared when the dispense ends, so a cancel that
//! lands after the last check never reaches the next one.

use core::num::NonZeroU16;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

use crate::app::ports::DispenserPort;
use crate::config::DispenserConfig;
use crate::drivers::servo::ServoDriver;
use crate::error::{ActuatorError, ActuatorFault};

pub type DispenseSignal = Signal<CriticalSectionRawMutex, ()>;

/// Per-unit gate timing and angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseProfile {
    pub open_degrees: u8,
    pub closed_degrees: u8,
    pub open_ms: u32,
    pub close_ms: u32,
}

impl From<&DispenserConfig> for PulseProfile {
    fn from(c: &DispenserConfig) -> Self {
        Self {
            open_degrees: c.servo_open_degrees,
            closed_degrees: c.servo_closed_degrees,
            open_ms: c.pulse_open_ms,
            close_ms: c.pulse_close_ms,
        }
    }
}

/// Concrete adapter that drives the gate servo behind [`DispenserPort`].
pub struct HardwareAdapter<'a, P, D> {
    servo: ServoDriver<P>,
    delay: D,
    profile: PulseProfile,
    /// Raised externally to stop a running dispense.
    cancel: &'a DispenseSignal,
    /// Held raised while a dispense is running.  If it is already raised
    /// on entry, whoever raised it also clears it.
    busy: &'a DispenseSignal,
}

impl<'a, P: SetDutyCycle, D: DelayNs> HardwareAdapter<'a, P, D> {
    pub fn new(
        servo: ServoDriver<P>,
        delay: D,
        profile: PulseProfile,
        cancel: &'a DispenseSignal,
        busy: &'a DispenseSignal,
    ) -> Self {
        Self {
            servo,
            delay,
            profile,
            cancel,
            busy,
        }
    }

    /// Drive the gate closed.  Call once at boot.
    pub fn home(&mut self) -> Result<(), P::Error> {
        self.servo.set_angle(self.profile.closed_degrees)
    }

    pub fn servo(&self) -> &ServoDriver<P> {
        &self.servo
    }

    fn run(&mut self, requested: u16) -> Result<(), ActuatorError> {
        let stop = |completed, fault| ActuatorError {
            completed,
            requested,
            fault,
        };

        for unit in 0..requested {
            if self.cancel.try_take().is_some() {
                warn!("Dispenser: cancelled after {}/{} units", unit, requested);
                return Err(stop(unit, ActuatorFault::Cancelled));
            }

            if self.servo.set_angle(self.profile.open_degrees).is_err() {
                // Best effort: never leave the gate open.
                let _ = self.servo.set_angle(self.profile.closed_degrees);
                return Err(stop(unit, ActuatorFault::PwmWriteFailed));
            }
            self.delay.delay_ms(self.profile.open_ms);

            if self.servo.set_angle(self.profile.closed_degrees).is_err() {
                return Err(stop(unit, ActuatorFault::PwmWriteFailed));
            }
            self.delay.delay_ms(self.profile.close_ms);

            info!("Dispenser: unit {}/{}", unit + 1, requested);
        }
        Ok(())
    }
}

// ── DispenserPort implementation ──────────────────────────────

impl<P: SetDutyCycle, D: DelayNs> DispenserPort for HardwareAdapter<'_, P, D> {
    fn dispense(&mut self, quantity: NonZeroU16) -> Result<(), ActuatorError> {
        let owns_busy = !self.busy.signaled();
        if owns_busy {
            self.busy.signal(());
        }

        let result = self.run(quantity.get());

        if owns_busy {
            self.busy.reset();
        }
        self.cancel.reset();
        match &result {
            Ok(()) => info!("Dispenser: {} units delivered", quantity),
            Err(e) => warn!("Dispenser: {}", e),
        }
        result
    }
}
