//! Hobby servo driver for the dispensing gate.
//!
//! Drives a standard 50 Hz servo over any `embedded-hal` PWM channel.
//! The pulse width maps linearly from 0.5 ms (0°) to 2.5 ms (180°).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: the channel is an `LedcDriver` configured at 50 Hz.
//! On host/test: any [`SetDutyCycle`] mock.

use embedded_hal::pwm::SetDutyCycle;

/// Servo frame period at 50 Hz.
pub const SERVO_PERIOD_US: u16 = 20_000;

const MIN_PULSE_US: u16 = 500;
const MAX_PULSE_US: u16 = 2500;
const MAX_DEGREES: u8 = 180;

/// Pulse width for `degrees`, clamped to 0–180.
pub const fn pulse_width_us(degrees: u8) -> u16 {
    let degrees = if degrees > MAX_DEGREES { MAX_DEGREES } else { degrees };
    // 180 * 2000 does not fit in u16.
    let span = degrees as u32 * (MAX_PULSE_US - MIN_PULSE_US) as u32 / MAX_DEGREES as u32;
    MIN_PULSE_US + span as u16
}

pub struct ServoDriver<P> {
    pwm: P,
}

impl<P: SetDutyCycle> ServoDriver<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    pub fn set_angle(&mut self, degrees: u8) -> Result<(), P::Error> {
        self.pwm
            .set_duty_cycle_fraction(pulse_width_us(degrees), SERVO_PERIOD_US)
    }

    /// The underlying PWM channel.
    pub fn channel(&self) -> &P {
        &self.pwm
    }
}
