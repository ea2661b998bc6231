//! DoorTag Firmware — Main Entry Point
//!
//! Hexagonal architecture driven by a deferred task queue.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter       BleBroadcaster   NvsRecordStore         │
//! │  (Sensor+Pin+LED+NFC   (BroadcastPort)  (RecordStore)          │
//! │   +Timer+System)       LogEventSink     uptime_ms              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Beacon (pure logic)                       │    │
//! │  │  FSM · frame encoder · polarity persistence            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  GPIO ISRs · esp_timer · GAP callback ──▶ TASKS ──▶ main loop  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{info, warn};

use doortag::adapters::hardware::HardwareAdapter;
use doortag::adapters::log_sink::LogEventSink;
use doortag::adapters::nvs::NvsRecordStore;
use doortag::adapters::radio::BleBroadcaster;
use doortag::adapters::time::uptime_ms;
use doortag::app::service::Beacon;
use doortag::config::BeaconConfig;
use doortag::drivers::hw_init;
use doortag::drivers::hw_timer::HwTimers;
use doortag::drivers::watchdog::Watchdog;
use doortag::error::{InitFailure, InitStatus, SensorError};
use doortag::sensors::{Absent, Accelerometer, EnvironmentSensor};
use doortag::tasks::{Drained, TASKS};

/// Main loop poll period while the queue is empty.
const IDLE_POLL_MS: u32 = 10;

// ── Boot helpers ──────────────────────────────────────────────

/// A part the board does not carry is not a failure.
fn probe_sensor(status: &mut InitStatus, failure: InitFailure, result: Result<(), SensorError>) {
    match result {
        Err(SensorError::NotFitted) => info!("{}: not fitted", failure),
        other => {
            let _ = status.check(failure, other);
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  DoorTag v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = BeaconConfig::default();
    config.validate()?;

    // ── 2. Peripherals ────────────────────────────────────────
    let mut init = InitStatus::new();

    if let Err(e) = hw_init::init_gpio() {
        warn!("GPIO init failed: {}", e);
        init.record(InitFailure::ButtonInterrupt);
        init.record(InitFailure::SwitchInterrupt);
    }
    if let Err(e) = hw_init::init_adc() {
        warn!("ADC init failed ({}), battery reads as 0 mV", e);
    }
    if let Err(e) = hw_init::init_chip_temperature() {
        warn!("Chip temperature sensor unavailable: {}", e);
    }

    let mut environment = Absent;
    let mut accelerometer = Absent;
    probe_sensor(
        &mut init,
        InitFailure::EnvironmentSensor,
        EnvironmentSensor::init(&mut environment),
    );
    probe_sensor(
        &mut init,
        InitFailure::Accelerometer,
        Accelerometer::init(&mut accelerometer),
    );

    // ── 3. Storage, radio, timers ─────────────────────────────
    let mut store = init
        .check(InitFailure::Storage, NvsRecordStore::new())
        .unwrap_or_else(NvsRecordStore::unavailable);

    let radio = init
        .check(
            InitFailure::Radio,
            BleBroadcaster::new(config.tx_power_dbm, config.fast_advertising_interval_ms),
        )
        .unwrap_or_else(|| BleBroadcaster::offline(config.fast_advertising_interval_ms));

    let timers = init
        .check(InitFailure::Timer, HwTimers::start(config.sample_interval_ms))
        .unwrap_or_else(|| {
            warn!("esp_timer unavailable, timers fall back to the main loop");
            HwTimers::software(config.sample_interval_ms, uptime_ms())
        });

    // ── 4. Interrupts ─────────────────────────────────────────
    match hw_init::install_isr_service() {
        Ok(()) => {
            let _ = init.check(InitFailure::ButtonInterrupt, hw_init::attach_button_isr());
            let _ = init.check(InitFailure::SwitchInterrupt, hw_init::attach_switch_isr());
            let _ = init.check(
                InitFailure::AccelerometerInterrupt,
                hw_init::attach_accel_isr(),
            );
        }
        Err(e) => {
            warn!("ISR service install failed ({}), edges fall back to polling", e);
            init.record(InitFailure::ButtonInterrupt);
            init.record(InitFailure::SwitchInterrupt);
            init.record(InitFailure::AccelerometerInterrupt);
        }
    }

    let watchdog = Watchdog::new(config.watchdog_reload_ms);

    // ── 5. Application service ────────────────────────────────
    let mut hw = HardwareAdapter::new(environment, accelerometer, radio, timers);
    let mut sink = LogEventSink::new();
    let mut beacon = Beacon::new(config, init);

    beacon.start(uptime_ms(), &mut hw, &mut store, &mut sink);
    beacon.announce_init_status(&mut hw, &mut FreeRtos);

    info!("System ready. Entering task loop.");

    // ── 6. Task loop ──────────────────────────────────────────
    let mut reported_drops = 0;
    loop {
        hw.tick_timers(uptime_ms(), &TASKS);

        while TASKS.drain_one(|task| {
            beacon.handle(task, uptime_ms(), &mut hw, &mut store, &TASKS, &mut sink)
        }) == Drained::Ran
        {}

        watchdog.feed();

        let dropped = TASKS.dropped();
        if dropped != reported_drops {
            warn!(
                "{} task(s) dropped from interrupt context ({} since boot)",
                dropped.wrapping_sub(reported_drops),
                dropped
            );
            reported_drops = dropped;
        }

        beacon.before_idle(&mut hw);
        FreeRtos::delay_ms(IDLE_POLL_MS);
    }
}
