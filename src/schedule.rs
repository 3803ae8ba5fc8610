//! Schedule store: the configured daily dispense events and their
//! per-day fired flags.
//!
//! Pure data plus invariants, no I/O.  Each slot carries its own fired
//! flag, so the flag count always matches the event count.
//!
//! Replacement is always whole-schedule: [`Schedule::replace`] validates
//! every candidate first and only then swaps the contents, so a rejected
//! request leaves the previous schedule untouched.

use serde::{Deserialize, Serialize};

use crate::clock::{TimeOfDay, UTC_OFFSET_RANGE};
use crate::error::{EventFault, ScheduleError};

/// Maximum number of daily dispense events.
pub const MAX_EVENTS: usize = 10;

// ═══════════════════════════════════════════════════════════════
//  DispenseEvent
// ═══════════════════════════════════════════════════════════════

/// One configured daily dispensing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseEvent {
    pub hour: u8,
    pub minute: u8,
    /// Units to dispense when the event triggers.
    pub quantity: u16,
    /// Inactive events are kept but never trigger.
    pub active: bool,
}

impl DispenseEvent {
    /// Build an active event, validating every field.
    pub fn new(hour: u8, minute: u8, quantity: u16) -> Result<Self, EventFault> {
        let event = Self {
            hour,
            minute,
            quantity,
            active: true,
        };
        event.validate()?;
        Ok(event)
    }

    /// Build an active event from wide integers (wire or legacy records).
    pub fn from_wide(hour: i64, minute: i64, quantity: i64) -> Result<Self, EventFault> {
        let hour = u8::try_from(hour).map_err(|_| EventFault::HourOutOfRange)?;
        let minute = u8::try_from(minute).map_err(|_| EventFault::MinuteOutOfRange)?;
        if quantity < 1 {
            return Err(EventFault::QuantityNotPositive);
        }
        let quantity = u16::try_from(quantity).map_err(|_| EventFault::QuantityTooLarge)?;
        Self::new(hour, minute, quantity)
    }

    pub fn validate(&self) -> Result<(), EventFault> {
        if self.hour > 23 {
            return Err(EventFault::HourOutOfRange);
        }
        if self.minute > 59 {
            return Err(EventFault::MinuteOutOfRange);
        }
        if self.quantity == 0 {
            return Err(EventFault::QuantityNotPositive);
        }
        Ok(())
    }

    /// The trigger time.  Always `Some` for a validated event.
    pub fn time(&self) -> Option<TimeOfDay> {
        TimeOfDay::new(self.hour, self.minute)
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedule
// ═══════════════════════════════════════════════════════════════

/// A configured event together with its fired-today flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub event: DispenseEvent,
    fired_today: bool,
}

impl ScheduleSlot {
    const fn new(event: DispenseEvent) -> Self {
        Self {
            event,
            fired_today: false,
        }
    }

    pub fn fired_today(&self) -> bool {
        self.fired_today
    }
}

/// The schedule store's content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    slots: heapless::Vec<ScheduleSlot, MAX_EVENTS>,
    configured: bool,
    timezone_offset_hours: i8,
}

impl Schedule {
    /// Empty, unconfigured schedule (first boot).
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a schedule from persisted parts.  Invalid events and events
    /// beyond capacity are dropped; all fired flags start cleared.
    pub(crate) fn restore(
        events: impl IntoIterator<Item = DispenseEvent>,
        configured: bool,
        timezone_offset_hours: i8,
    ) -> Self {
        let slots = events
            .into_iter()
            .filter(|e| e.validate().is_ok())
            .take(MAX_EVENTS)
            .map(ScheduleSlot::new)
            .collect();
        Self {
            slots,
            configured,
            timezone_offset_hours,
        }
    }

    /// Validate every candidate, then atomically install the first
    /// [`MAX_EVENTS`] of them, clear all fired flags and mark the schedule
    /// configured.  Returns the number of installed events.
    ///
    /// Any invalid candidate, including one past capacity, rejects the
    /// whole replacement without mutation.
    pub fn replace(&mut self, candidates: &[DispenseEvent]) -> Result<usize, ScheduleError> {
        for (index, event) in candidates.iter().enumerate() {
            event
                .validate()
                .map_err(|fault| ScheduleError::InvalidEvent { index, fault })?;
        }

        self.slots = candidates
            .iter()
            .take(MAX_EVENTS)
            .copied()
            .map(ScheduleSlot::new)
            .collect();
        self.configured = true;
        Ok(self.slots.len())
    }

    pub fn set_timezone_offset(&mut self, hours: i32) -> Result<(), ScheduleError> {
        let hours = i8::try_from(hours)
            .ok()
            .filter(|h| UTC_OFFSET_RANGE.contains(h))
            .ok_or(ScheduleError::InvalidTimezone)?;
        self.timezone_offset_hours = hours;
        Ok(())
    }

    // ── Fired-flag mutators (engine only) ────────────────────

    pub(crate) fn mark_fired(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.fired_today = true;
        }
    }

    pub(crate) fn reset_all_fired(&mut self) {
        for slot in &mut self.slots {
            slot.fired_today = false;
        }
    }

    // ── Queries ──────────────────────────────────────────────

    /// `false` for indices past the event count.
    pub fn is_fired(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.fired_today)
    }

    pub fn slots(&self) -> &[ScheduleSlot] {
        &self.slots
    }

    pub fn events(&self) -> impl Iterator<Item = &DispenseEvent> + '_ {
        self.slots.iter().map(|s| &s.event)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn timezone_offset_hours(&self) -> i8 {
        self.timezone_offset_hours
    }
}
