//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the dispense engine to the outside world: command
//! handling for the configuration gateway, persistence on change and
//! structured events.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
