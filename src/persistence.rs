//! Persistence codec for the schedule.
//!
//! The schedule is stored as a flat set of key/value records in one NVS
//! namespace:
//!
//! | key              | value                                  |
//! |------------------|----------------------------------------|
//! | `schedule_count` | [`RecordValue::Int`]                   |
//! | `configured`     | [`RecordValue::Bool`]                  |
//! | `timezone`       | [`RecordValue::Int`] (hours)           |
//! | `sched_<i>`      | [`RecordValue::Triple`] per event      |
//!
//! Values are postcard-encoded.  Older firmware wrote event records as
//! plain `"hour,minute,quantity"` text; those are still accepted on load.
//! The `active` flag is not stored, so every loaded event is active.
//!
//! A bad event record never fails the whole load: it is skipped and
//! reported as a [`CodecError::CorruptRecord`].

use core::fmt::Write as _;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::clock::UTC_OFFSET_RANGE;
use crate::error::{CodecError, RecordFault};
use crate::schedule::{DispenseEvent, MAX_EVENTS, Schedule};

pub const NAMESPACE: &str = "med_dispenser";

pub const KEY_COUNT: &str = "schedule_count";
pub const KEY_CONFIGURED: &str = "configured";
pub const KEY_TIMEZONE: &str = "timezone";
pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASSWORD: &str = "wifi_password";

/// Upper bound for one encoded value (postcard or legacy text).
const MAX_VALUE_LEN: usize = 32;

/// NVS keys are at most 15 bytes.
pub type RecordKey = heapless::String<15>;

/// `sched_<index>`.
pub fn event_key(index: usize) -> RecordKey {
    let mut key = RecordKey::new();
    // "sched_" plus at most two digits always fits.
    let _ = write!(key, "sched_{index}");
    key
}

fn key(name: &str) -> RecordKey {
    let mut key = RecordKey::new();
    let _ = key.push_str(name);
    key
}

// ═══════════════════════════════════════════════════════════════
//  Records
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordValue {
    Int(i32),
    Bool(bool),
    Triple { hour: u8, minute: u8, quantity: u16 },
    /// Legacy comma-joined event text.
    Text(heapless::String<16>),
}

impl RecordValue {
    /// Decode stored bytes: postcard first, then legacy text.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordFault> {
        if let Ok(value) = postcard::from_bytes::<Self>(bytes) {
            return Ok(value);
        }
        let text = core::str::from_utf8(bytes).map_err(|_| RecordFault::Undecodable)?;
        let mut owned = heapless::String::new();
        owned
            .push_str(text.trim_end_matches('\0'))
            .map_err(|_| RecordFault::Undecodable)?;
        Ok(Self::Text(owned))
    }

    /// Encode into `buf`, returning the used prefix.
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], StorageError> {
        postcard::to_slice(self, buf).map_err(|_| StorageError::IoError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: RecordKey,
    pub value: RecordValue,
}

impl Record {
    fn new(name: &str, value: RecordValue) -> Self {
        Self {
            key: key(name),
            value,
        }
    }
}

/// Result of loading a schedule: whatever could be recovered, plus one
/// error per skipped event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub schedule: Schedule,
    pub skipped: heapless::Vec<CodecError, MAX_EVENTS>,
}

// ═══════════════════════════════════════════════════════════════
//  Codec
// ═══════════════════════════════════════════════════════════════

/// Flatten a schedule into records: count, configured flag, timezone,
/// then one triple per event in slot order.
pub fn encode(schedule: &Schedule) -> Vec<Record> {
    let mut records = Vec::with_capacity(3 + schedule.len());
    records.push(Record::new(KEY_COUNT, RecordValue::Int(schedule.len() as i32)));
    records.push(Record::new(
        KEY_CONFIGURED,
        RecordValue::Bool(schedule.is_configured()),
    ));
    records.push(Record::new(
        KEY_TIMEZONE,
        RecordValue::Int(i32::from(schedule.timezone_offset_hours())),
    ));
    for (index, event) in schedule.events().enumerate() {
        records.push(Record {
            key: event_key(index),
            value: RecordValue::Triple {
                hour: event.hour,
                minute: event.minute,
                quantity: event.quantity,
            },
        });
    }
    records
}

/// Rebuild a schedule from records.  Missing header records fall back to
/// first-boot values.
pub fn decode(records: &[Record]) -> Decoded {
    decode_with(|name| {
        records
            .iter()
            .find(|r| r.key.as_str() == name)
            .map(|r| Ok(r.value.clone()))
    })
}

/// Parse legacy `"hour,minute,quantity"` text.
pub fn parse_triple(text: &str) -> Result<DispenseEvent, RecordFault> {
    let mut fields = [0i64; 3];
    let mut parts = text.split(',');
    for field in &mut fields {
        let part = parts.next().ok_or(RecordFault::WrongFieldCount)?;
        *field = part.trim().parse().map_err(|_| RecordFault::NonNumeric)?;
    }
    if parts.next().is_some() {
        return Err(RecordFault::WrongFieldCount);
    }
    DispenseEvent::from_wide(fields[0], fields[1], fields[2]).map_err(RecordFault::Invalid)
}

fn event_from_value(value: RecordValue) -> Result<DispenseEvent, RecordFault> {
    match value {
        RecordValue::Triple {
            hour,
            minute,
            quantity,
        } => DispenseEvent::new(hour, minute, quantity).map_err(RecordFault::Invalid),
        RecordValue::Text(text) => parse_triple(&text),
        RecordValue::Int(_) | RecordValue::Bool(_) => Err(RecordFault::WrongType),
    }
}

/// Shared decoder over any record lookup.  `lookup` returns `None` for
/// an absent key and `Some(Err(_))` for bytes that could not be decoded.
fn decode_with<F>(lookup: F) -> Decoded
where
    F: Fn(&str) -> Option<Result<RecordValue, RecordFault>>,
{
    let count = match lookup(KEY_COUNT) {
        Some(Ok(RecordValue::Int(n))) => n.clamp(0, MAX_EVENTS as i32) as usize,
        Some(other) => {
            warn!("Codec: unusable {} record ({:?}), assuming 0", KEY_COUNT, other);
            0
        }
        None => 0,
    };

    let configured = match lookup(KEY_CONFIGURED) {
        Some(Ok(RecordValue::Bool(b))) => b,
        Some(Ok(RecordValue::Int(n))) => n != 0,
        _ => false,
    };

    let timezone = match lookup(KEY_TIMEZONE) {
        Some(Ok(RecordValue::Int(n))) => i8::try_from(n)
            .ok()
            .filter(|h| UTC_OFFSET_RANGE.contains(h))
            .unwrap_or_else(|| {
                warn!("Codec: timezone {} out of range, using 0", n);
                0
            }),
        _ => 0,
    };

    let mut events = heapless::Vec::<DispenseEvent, MAX_EVENTS>::new();
    let mut skipped = heapless::Vec::new();
    for index in 0..count {
        let key = event_key(index);
        let result = match lookup(key.as_str()) {
            None => Err(RecordFault::Missing),
            Some(value) => value.and_then(event_from_value),
        };
        match result {
            Ok(event) => {
                let _ = events.push(event);
            }
            Err(reason) => {
                let err = CodecError::CorruptRecord { index, reason };
                warn!("Codec: {}, skipping", err);
                let _ = skipped.push(err);
            }
        }
    }

    Decoded {
        schedule: Schedule::restore(events, configured, timezone),
        skipped,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Storage glue
// ═══════════════════════════════════════════════════════════════

/// Write every record of `schedule`, then delete event keys past its end
/// so a shorter schedule never resurrects old entries.
pub fn store_schedule<S: StoragePort + ?Sized>(
    storage: &mut S,
    schedule: &Schedule,
) -> Result<(), StorageError> {
    let mut buf = [0u8; MAX_VALUE_LEN];
    for record in encode(schedule) {
        let bytes = record.value.to_bytes(&mut buf)?;
        storage.write(NAMESPACE, &record.key, bytes)?;
    }
    for index in schedule.len()..MAX_EVENTS {
        storage.delete(NAMESPACE, &event_key(index))?;
    }
    info!(
        "Codec: stored {} events (configured={}, tz={})",
        schedule.len(),
        schedule.is_configured(),
        schedule.timezone_offset_hours()
    );
    Ok(())
}

/// Load the persisted schedule.  Never fails: unreadable headers fall
/// back to defaults and unreadable events are skipped.
pub fn load_schedule<S: StoragePort + ?Sized>(storage: &S) -> Decoded {
    let decoded = decode_with(|name| {
        let mut buf = [0u8; MAX_VALUE_LEN];
        match storage.read(NAMESPACE, name, &mut buf) {
            Ok(len) => Some(RecordValue::from_bytes(&buf[..len])),
            Err(StorageError::NotFound) => None,
            Err(_) => Some(Err(RecordFault::Undecodable)),
        }
    });
    info!(
        "Codec: loaded {} events ({} skipped)",
        decoded.schedule.len(),
        decoded.skipped.len()
    );
    decoded
}

// ── WiFi credentials ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

/// Stored as raw UTF-8 next to the schedule.
pub fn store_wifi_credentials<S: StoragePort + ?Sized>(
    storage: &mut S,
    ssid: &str,
    password: &str,
) -> Result<(), StorageError> {
    storage.write(NAMESPACE, KEY_WIFI_SSID, ssid.as_bytes())?;
    storage.write(NAMESPACE, KEY_WIFI_PASSWORD, password.as_bytes())
}

pub fn load_wifi_credentials<S: StoragePort + ?Sized>(storage: &S) -> Option<WifiCredentials> {
    fn read_str<S: StoragePort + ?Sized, const N: usize>(
        storage: &S,
        key: &str,
    ) -> Option<heapless::String<N>> {
        let mut buf = [0u8; 64];
        let len = storage.read(NAMESPACE, key, &mut buf).ok()?;
        let text = core::str::from_utf8(&buf[..len]).ok()?;
        let mut out = heapless::String::new();
        out.push_str(text).ok()?;
        Some(out)
    }

    let ssid: heapless::String<32> = read_str(storage, KEY_WIFI_SSID)?;
    if ssid.is_empty() {
        return None;
    }
    let password = read_str(storage, KEY_WIFI_PASSWORD).unwrap_or_default();
    Some(WifiCredentials { ssid, password })
}
