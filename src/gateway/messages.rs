//! JSON request and reply documents for the configuration gateway.
//!
//! Field names follow the companion app: an event's quantity travels as
//! `pills` (`quantity` is accepted too).  Numbers are read as wide
//! integers so out-of-range values reach validation instead of failing
//! to parse.

use serde::{Deserialize, Serialize};

use crate::app::events::DeviceStatus;
use crate::schedule::{DispenseEvent, Schedule};

pub const DEVICE_NAME: &str = "Medicine Dispenser";
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Requests ─────────────────────────────────────────────────

/// `POST /configure_wifi`
#[derive(Debug, Clone, Deserialize)]
pub struct WifiRequest {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    /// Whole hours east of UTC.
    #[serde(default)]
    pub timezone_offset: i64,
}

/// One event as submitted by a client.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireEvent {
    pub hour: i64,
    pub minute: i64,
    #[serde(alias = "quantity")]
    pub pills: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// `POST /configure_schedule`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub schedule: Vec<WireEvent>,
}

/// `POST /dispense`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DispenseRequest {
    #[serde(alias = "quantity")]
    pub pills: i64,
}

// ── Replies ──────────────────────────────────────────────────

/// `{"status": "success" | "error", "message": ...}`
#[derive(Debug, Serialize)]
pub struct StatusReply<'a> {
    pub status: &'static str,
    pub message: &'a str,
}

impl<'a> StatusReply<'a> {
    pub fn success(message: &'a str) -> Self {
        Self {
            status: "success",
            message,
        }
    }

    pub fn error(message: &'a str) -> Self {
        Self {
            status: "error",
            message,
        }
    }
}

/// `GET /info`
#[derive(Debug, Serialize)]
pub struct InfoReply {
    pub device_name: &'static str,
    pub version: &'static str,
    pub configured: bool,
    pub current_time: String,
    pub schedule_count: usize,
    pub wifi_connected: bool,
    pub timezone_offset: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_dispense: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_ip: Option<String>,
}

impl From<&DeviceStatus> for InfoReply {
    fn from(s: &DeviceStatus) -> Self {
        Self {
            device_name: DEVICE_NAME,
            version: FIRMWARE_VERSION,
            configured: s.configured,
            current_time: s.current_time.as_str().into(),
            schedule_count: s.schedule_count,
            wifi_connected: s.wifi_connected,
            timezone_offset: s.timezone_offset_hours,
            next_dispense: s.next_dispense.map(|t| t.to_string()),
            ap_ip: s.ap_ip.map(|ip| ip.to_string()),
            wifi_ip: s.wifi_ip.map(|ip| ip.to_string()),
        }
    }
}

/// One entry of `GET /schedule`.
#[derive(Debug, Serialize)]
pub struct ScheduledEvent {
    pub hour: u8,
    pub minute: u8,
    pub pills: u16,
    pub active: bool,
    pub dispensed_today: bool,
}

/// `GET /schedule`
#[derive(Debug, Serialize)]
pub struct ScheduleReply {
    pub schedule: Vec<ScheduledEvent>,
}

impl From<&Schedule> for ScheduleReply {
    fn from(s: &Schedule) -> Self {
        let schedule = s
            .slots()
            .iter()
            .map(|slot| {
                let DispenseEvent {
                    hour,
                    minute,
                    quantity,
                    active,
                } = slot.event;
                ScheduledEvent {
                    hour,
                    minute,
                    pills: quantity,
                    active,
                    dispensed_today: slot.fired_today(),
                }
            })
            .collect();
        Self { schedule }
    }
}
