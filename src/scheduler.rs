//! Daily dispense engine.
//!
//! Owns the [`Schedule`] and turns clock samples into dispense actions.
//! The control loop samples time far more often than once a minute, so
//! every event is gated by its fired-today flag and fires at most once
//! per day.
//!
//! ```text
//!   ClockSample ──▶ ┌──────────────────────────┐ ──▶ DispenserPort
//!                   │      DispenseEngine       │
//!   Gateway ──────▶ │ rollover · trigger · next │
//!                   └────────────┬─────────────┘
//!                                ▼
//!                      Schedule (slots + flags)
//! ```
//!
//! ## Day rollover
//!
//! There is no stored day counter.  Rollover is an edge, evaluated
//! *before* triggers on every connected sample:
//!
//! - the first sample that reads 00:00 (later samples in that same
//!   minute do not reset again, so a 00:00 event fires exactly once), or
//! - a backwards jump of more than twelve hours between two samples,
//!   which means midnight passed while the source was disconnected or a
//!   long dispense held the loop.
//!
//! A timezone change shifts the previous sample by the offset delta.  A
//! shift that carries it past midnight is itself a new day; one that pulls
//! it back before midnight never is.

use core::num::NonZeroU16;

use log::{info, warn};

use crate::app::ports::DispenserPort;
use crate::clock::{ClockSample, MINUTES_PER_DAY, TimeOfDay};
use crate::error::{ActuatorError, DispenseError, ScheduleError};
use crate::schedule::{DispenseEvent, MAX_EVENTS, Schedule};

/// Backwards jumps larger than this count as a day wrap.
const ROLLOVER_JUMP_MINUTES: u16 = 12 * 60;


// ═══════════════════════════════════════════════════════════════
//  Tick results
// ═══════════════════════════════════════════════════════════════

/// One scheduled event that triggered during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredEvent {
    /// Slot index in the schedule.
    pub index: usize,
    pub at: TimeOfDay,
    pub quantity: u16,
    /// The event is marked fired either way; a failed dose is not retried.
    pub result: Result<(), ActuatorError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// All fired flags were cleared at the start of this tick.
    pub rolled_over: bool,
    /// Events that triggered, in slot order.
    pub fired: heapless::Vec<FiredEvent, MAX_EVENTS>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The time source is disconnected; nothing was evaluated.
    SourceUnavailable,
    Evaluated(TickReport),
}

// ═══════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════

/// The scheduling and dispense-state engine.
///
/// Sole owner of the schedule; the gateway and the persistence codec
/// reach it only through the methods below.
#[derive(Debug, Clone, Default)]
pub struct DispenseEngine {
    schedule: Schedule,
    /// Last trusted time seen by [`tick`](Self::tick), in the current
    /// timezone.
    last_observed: Option<TimeOfDay>,
    /// A timezone change moved local time into the next day.
    rollover_pending: bool,
}

impl DispenseEngine {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            last_observed: None,
            rollover_pending: false,
        }
    }

    /// Read-only view for status reporting and persistence.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Replace the whole schedule.  See [`Schedule::replace`].
    pub fn replace_schedule(&mut self, candidates: &[DispenseEvent]) -> Result<usize, ScheduleError> {
        let installed = self.schedule.replace(candidates)?;
        info!(
            "Engine: schedule replaced ({} of {} events installed)",
            installed,
            candidates.len()
        );
        Ok(installed)
    }

    /// Returns `true` if the offset actually changed.
    pub fn set_timezone_offset(&mut self, hours: i32) -> Result<bool, ScheduleError> {
        let before = self.schedule.timezone_offset_hours();
        self.schedule.set_timezone_offset(hours)?;
        let after = self.schedule.timezone_offset_hours();
        let changed = before != after;
        if changed {
            let delta = (i32::from(after) - i32::from(before)) * 60;
            if let Some(prev) = self.last_observed {
                let day = i32::from(MINUTES_PER_DAY);
                let shifted = i32::from(prev.minute_of_day()) + delta;
                if shifted >= day {
                    self.rollover_pending = true;
                }
                self.last_observed = Some(TimeOfDay::from_minute_of_day(
                    shifted.rem_euclid(day) as u16,
                ));
            }
            info!("Engine: timezone offset {} -> {}", before, after);
        }
        Ok(changed)
    }

    /// Evaluate one clock sample: rollover first, then every matching
    /// active event that has not fired today, in slot order.
    pub fn tick(&mut self, sample: ClockSample, dispenser: &mut impl DispenserPort) -> TickOutcome {
        let Some(now) = sample.time_of_day() else {
            return TickOutcome::SourceUnavailable;
        };

        let mut report = TickReport::default();

        if core::mem::take(&mut self.rollover_pending) || is_rollover(self.last_observed, now) {
            self.schedule.reset_all_fired();
            report.rolled_over = true;
            info!("Engine: day rollover at {}", now);
        }
        self.last_observed = Some(now);

        for index in 0..self.schedule.len() {
            let slot = self.schedule.slots()[index];
            let event = slot.event;
            if !event.active || slot.fired_today() || event.time() != Some(now) {
                continue;
            }
            let Some(quantity) = NonZeroU16::new(event.quantity) else {
                continue;
            };

            info!("Engine: event {} due at {} ({} units)", index, now, quantity);
            let result = dispenser.dispense(quantity);
            self.schedule.mark_fired(index);

            if let Err(e) = result {
                warn!("Engine: event {} at {} failed: {}", index, now, e);
            }
            // Capacity matches the slot count, so this cannot overflow.
            let _ = report.fired.push(FiredEvent {
                index,
                at: now,
                quantity: event.quantity,
                result,
            });
        }

        TickOutcome::Evaluated(report)
    }

    /// The next active event time: the earliest one strictly later today,
    /// otherwise the earliest one tomorrow.  `None` when the schedule has
    /// no active events or the time is unknown.
    pub fn next_scheduled(&self, sample: ClockSample) -> Option<TimeOfDay> {
        let now = sample.time_of_day()?;
        let active_times = || {
            self.schedule
                .events()
                .filter(|e| e.active)
                .filter_map(DispenseEvent::time)
        };

        active_times()
            .filter(|t| t.minute_of_day() > now.minute_of_day())
            .min()
            .or_else(|| active_times().min())
    }

    /// Dispense immediately, bypassing the schedule and its fired flags.
    pub fn manual_dispense(
        &mut self,
        quantity: u16,
        dispenser: &mut impl DispenserPort,
    ) -> Result<(), DispenseError> {
        let quantity = NonZeroU16::new(quantity).ok_or(DispenseError::InvalidQuantity)?;
        info!("Engine: manual dispense of {} units", quantity);
        dispenser.dispense(quantity).map_err(|e| {
            warn!("Engine: manual dispense failed: {}", e);
            DispenseError::from(e)
        })
    }
}

fn is_rollover(previous: Option<TimeOfDay>, now: TimeOfDay) -> bool {
    if now == TimeOfDay::MIDNIGHT {
        return previous != Some(TimeOfDay::MIDNIGHT);
    }
    previous.is_some_and(|prev| {
        prev.minute_of_day() > now.minute_of_day() + ROLLOVER_JUMP_MINUTES
    })
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
