//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the [`DispenseEngine`] and the device tunables.
//! It exposes a hardware-agnostic API.  All I/O flows through port
//! traits injected at call sites, making the entire service testable
//! with mock adapters.
//!
//! ```text
//!    ClockPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                  │       AppService        │
//! DispenserPort ◀──│ engine · commands · NVS │──▶ StoragePort
//!                  └────────────────────────┘
//! ```
//!
//! Every accepted configuration change is written to storage before the
//! reply goes out.  A failed write is reported but does not undo the
//! in-memory change.

use log::{info, warn};

use crate::persistence;
use crate::scheduler::{DispenseEngine, TickOutcome};

use super::commands::{AppCommand, AppResponse, CommandError};
use super::events::{AppEvent, DeviceStatus, DispenseSource};
use super::ports::{ClockPort, ConnectivityPort, DispenserPort, EventSink, StoragePort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
#[derive(Default)]
pub struct AppService {
    engine: DispenseEngine,
    /// Last reported time-source state, for change events.
    clock_trusted: Option<bool>,
}

impl AppService {
    /// Construct the service with an empty schedule.
    ///
    /// Call [`start`](Self::start) next to restore the persisted one.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted schedule and hand its timezone to the clock.
    pub fn start(
        &mut self,
        storage: &impl StoragePort,
        clock: &mut impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        let decoded = persistence::load_schedule(storage);
        for err in &decoded.skipped {
            sink.emit(&AppEvent::RecordSkipped(*err));
        }

        let schedule = decoded.schedule;
        clock.set_utc_offset_hours(schedule.timezone_offset_hours());
        let started = AppEvent::Started {
            events: schedule.len(),
            configured: schedule.is_configured(),
            timezone_offset_hours: schedule.timezone_offset_hours(),
        };
        self.engine = DispenseEngine::new(schedule);
        sink.emit(&started);
        info!(
            "AppService started ({} events, configured={})",
            self.engine.schedule().len(),
            self.engine.schedule().is_configured()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: sample the clock, then let the engine roll
    /// over and fire due events.
    ///
    /// The `hw` parameter satisfies **both** [`ClockPort`] and
    /// [`DispenserPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl ClockPort + DispenserPort),
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        let sample = hw.sample();

        if self.clock_trusted != Some(sample.connected) {
            if sample.connected {
                info!("Clock source trusted at {}", sample.formatted());
            } else {
                warn!("Clock source unavailable, scheduling suspended");
            }
            self.clock_trusted = Some(sample.connected);
            sink.emit(&AppEvent::ClockSource(sample.connected));
        }

        let outcome = self.engine.tick(sample, hw);

        if let TickOutcome::Evaluated(report) = &outcome {
            if report.rolled_over {
                if let Some(now) = sample.time_of_day() {
                    sink.emit(&AppEvent::DayRolledOver(now));
                }
            }
            for fired in &report.fired {
                let source = DispenseSource::Scheduled {
                    index: fired.index,
                    at: fired.at,
                };
                match fired.result {
                    Ok(()) => sink.emit(&AppEvent::Dispensed {
                        source,
                        quantity: fired.quantity,
                    }),
                    Err(error) => sink.emit(&AppEvent::DispenseFailed { source, error }),
                }
            }
        }
        outcome
    }

    // ── Command handling ──────────────────────────────────────

    /// Execute one gateway command to completion.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut (impl ClockPort + DispenserPort + ConnectivityPort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> AppResponse {
        match cmd {
            AppCommand::GetStatus => AppResponse::Status(self.status(&*hw)),

            AppCommand::ConfigureNetwork {
                ssid,
                password,
                timezone_offset_hours,
            } => {
                match self.engine.set_timezone_offset(timezone_offset_hours) {
                    Ok(true) => {
                        let hours = self.engine.schedule().timezone_offset_hours();
                        hw.set_utc_offset_hours(hours);
                        sink.emit(&AppEvent::TimezoneChanged(hours));
                        self.persist(storage, sink);
                    }
                    Ok(false) => {}
                    Err(e) => return AppResponse::Rejected(e.into()),
                }

                match hw.connect(&ssid, &password) {
                    Ok(()) => {
                        if let Err(e) =
                            persistence::store_wifi_credentials(storage, &ssid, &password)
                        {
                            warn!("WiFi credentials not saved: {}", e);
                            sink.emit(&AppEvent::PersistFailed(e));
                        }
                        sink.emit(&AppEvent::NetworkJoined);
                        AppResponse::NetworkConfigured
                    }
                    Err(e) => {
                        sink.emit(&AppEvent::NetworkFailed(e));
                        AppResponse::Rejected(e.into())
                    }
                }
            }

            AppCommand::SetSchedule(events) => match self.engine.replace_schedule(&events) {
                Ok(installed) => {
                    sink.emit(&AppEvent::ScheduleReplaced {
                        installed,
                        submitted: events.len(),
                    });
                    self.persist(storage, sink);
                    AppResponse::ScheduleApplied { installed }
                }
                Err(e) => {
                    warn!("Schedule rejected: {}", e);
                    AppResponse::Rejected(e.into())
                }
            },

            AppCommand::GetSchedule => AppResponse::Schedule(self.engine.schedule().clone()),

            AppCommand::ManualDispense { quantity } => {
                match self.engine.manual_dispense(quantity, hw) {
                    Ok(()) => {
                        sink.emit(&AppEvent::Dispensed {
                            source: DispenseSource::Manual,
                            quantity,
                        });
                        AppResponse::Dispensed { quantity }
                    }
                    Err(e) => {
                        if let crate::error::DispenseError::Actuator(error) = e {
                            sink.emit(&AppEvent::DispenseFailed {
                                source: DispenseSource::Manual,
                                error,
                            });
                        }
                        AppResponse::Rejected(CommandError::Dispense(e))
                    }
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a status snapshot from the live ports.
    pub fn status(&self, hw: &(impl ClockPort + ConnectivityPort)) -> DeviceStatus {
        let sample = hw.sample();
        let schedule = self.engine.schedule();
        DeviceStatus {
            configured: schedule.is_configured(),
            schedule_count: schedule.len(),
            wifi_connected: hw.is_connected(),
            current_time: sample.formatted(),
            next_dispense: self.engine.next_scheduled(sample),
            timezone_offset_hours: schedule.timezone_offset_hours(),
            ap_ip: hw.access_point_ip(),
            wifi_ip: hw.station_ip(),
        }
    }

    pub fn engine(&self) -> &DispenseEngine {
        &self.engine
    }

    // ── Internal ──────────────────────────────────────────────

    fn persist(&self, storage: &mut impl StoragePort, sink: &mut impl EventSink) {
        if let Err(e) = persistence::store_schedule(storage, self.engine.schedule()) {
            warn!("Schedule not persisted: {}", e);
            sink.emit(&AppEvent::PersistFailed(e));
        }
    }
}
