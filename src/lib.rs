//! PillDispenser firmware library.
//!
//! Exposes the pure-logic modules for integration testing and the
//! firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod schedule;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
