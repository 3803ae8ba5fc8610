//! Mock adapters for integration tests.
//!
//! Records every dispense call so tests can assert on the full actuator
//! history without touching real PWM registers.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::num::NonZeroU16;

use pilldispenser::app::events::AppEvent;
use pilldispenser::app::ports::{
    ClockPort, ConnectivityError, ConnectivityPort, DispenserPort, EventSink, StorageError,
    StoragePort,
};
use pilldispenser::clock::ClockSample;
use pilldispenser::error::{ActuatorError, ActuatorFault};
use pilldispenser::persistence::{NAMESPACE, event_key};

// ── MockPwm ───────────────────────────────────────────────────

/// Servo PWM channel that records every duty write.
#[derive(Default)]
pub struct MockPwm {
    pub writes: Vec<u16>,
}

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = core::convert::Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        20_000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.writes.push(duty);
        Ok(())
    }
}

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub now: ClockSample,
    pub utc_offset_hours: i8,
    /// Quantities passed to `dispense`, in call order.
    pub dispensed: Vec<u16>,
    /// Fail every dispense after this many units.
    pub fail_after: Option<u16>,
    pub joined: Option<String>,
    pub reachable: bool,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            now: ClockSample::disconnected(),
            utc_offset_hours: 0,
            dispensed: Vec::new(),
            fail_after: None,
            joined: None,
            reachable: true,
        }
    }

    pub fn at(hour: u8, minute: u8) -> Self {
        let mut board = Self::new();
        board.set_time(hour, minute);
        board
    }

    pub fn set_time(&mut self, hour: u8, minute: u8) {
        self.now = ClockSample::connected(hour, minute);
    }

    pub fn disconnect_clock(&mut self) {
        self.now = ClockSample::disconnected();
    }
}

impl ClockPort for MockBoard {
    fn sample(&self) -> ClockSample {
        self.now
    }

    fn set_utc_offset_hours(&mut self, hours: i8) {
        self.utc_offset_hours = hours;
    }
}

impl DispenserPort for MockBoard {
    fn dispense(&mut self, quantity: NonZeroU16) -> Result<(), ActuatorError> {
        self.dispensed.push(quantity.get());
        match self.fail_after {
            Some(completed) if completed < quantity.get() => Err(ActuatorError {
                completed,
                requested: quantity.get(),
                fault: ActuatorFault::PwmWriteFailed,
            }),
            _ => Ok(()),
        }
    }
}

impl ConnectivityPort for MockBoard {
    fn connect(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        if ssid.is_empty() {
            return Err(ConnectivityError::InvalidSsid);
        }
        if !self.reachable {
            self.joined = None;
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.joined = Some(ssid.to_owned());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.joined.is_some()
    }

    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 4, 1))
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub store: HashMap<String, Vec<u8>>,
    /// Every write fails with `IoError`.
    pub read_only: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    pub fn put_raw(&mut self, namespace: &str, key: &str, data: &[u8]) {
        self.store.insert(Self::key(namespace, key), data.to_vec());
    }

    pub fn exists_event(&self, index: usize) -> bool {
        self.exists(NAMESPACE, &event_key(index))
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&Self::key(namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::IoError);
        }
        self.store.insert(Self::key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::IoError);
        }
        self.store.remove(&Self::key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&Self::key(namespace, key))
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Collects every emitted event.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
