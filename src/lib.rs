//! DoorTag firmware library.
//!
//! Exposes the pure-logic modules (frame encoder, state machine, task
//! queue, timers, persistence) and the hardware adapters for integration
//! testing on the host.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod frame;
pub mod fsm;
pub mod persist;
pub mod pins;
pub mod tasks;
pub mod timers;

// Adapters and drivers carry their own cfg-gated simulation backends, so
// the crate compiles and tests on the host.
pub mod adapters;
pub mod drivers;
pub mod sensors;
