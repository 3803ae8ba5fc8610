//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  Every line starts
//! with a fixed tag so the serial stream can be filtered.

use log::{info, warn};

use crate::app::events::{AppEvent, DeviceStatus, DispenseSource};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn source_label(source: &DispenseSource) -> heapless::String<24> {
    let mut label = heapless::String::new();
    let _ = match source {
        DispenseSource::Scheduled { index, at } => {
            core::fmt::write(&mut label, format_args!("sched[{index}]@{at}"))
        }
        DispenseSource::Manual => label.push_str("manual").map_err(|_| core::fmt::Error),
    };
    label
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                events,
                configured,
                timezone_offset_hours,
            } => {
                info!(
                    "START | events={} configured={} tz=UTC{:+}",
                    events, configured, timezone_offset_hours
                );
            }
            AppEvent::RecordSkipped(e) => {
                warn!("STORE | skipped record: {}", e);
            }
            AppEvent::ClockSource(true) => info!("CLOCK | time source connected"),
            AppEvent::ClockSource(false) => warn!("CLOCK | time source lost"),
            AppEvent::DayRolledOver(at) => {
                info!("CLOCK | new day at {}, fired flags cleared", at);
            }
            AppEvent::Dispensed { source, quantity } => {
                info!("DISPENSE | {} | {} pill(s)", source_label(source), quantity);
            }
            AppEvent::DispenseFailed { source, error } => {
                warn!("DISPENSE | {} | failed: {}", source_label(source), error);
            }
            AppEvent::ScheduleReplaced {
                installed,
                submitted,
            } => {
                if installed < submitted {
                    warn!(
                        "SCHEDULE | installed {} of {} events (capacity)",
                        installed, submitted
                    );
                } else {
                    info!("SCHEDULE | installed {} events", installed);
                }
            }
            AppEvent::TimezoneChanged(hours) => {
                info!("CLOCK | timezone set to UTC{:+}", hours);
            }
            AppEvent::NetworkJoined => info!("NET | station joined"),
            AppEvent::NetworkFailed(e) => warn!("NET | join failed: {}", e),
            AppEvent::PersistFailed(e) => warn!("STORE | persist failed: {}", e),
        }
    }
}

/// Periodic one-line status report.
pub fn log_status(status: &DeviceStatus) {
    let next = status
        .next_dispense
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".into());
    info!(
        "STATUS | time={} | next={} | events={} | wifi={} | tz=UTC{:+}",
        status.current_time,
        next,
        status.schedule_count,
        if status.wifi_connected { "up" } else { "down" },
        status.timezone_offset_hours,
    );
}
