//! Mock board for integration tests.
//!
//! Implements every port the beacon drives and records each call, so tests
//! can assert on LEDs, payloads, intervals and resets without touching
//! GPIO or the radio.  The reboot timer runs on [`SoftTimers`] against a
//! test-controlled clock.

use doortag::app::events::AppEvent;
use doortag::app::ports::{
    BroadcastPort, EventSink, IndicatorPort, NfcPort, PinPort, SensorPort, SystemPort, TimerPort,
};
use doortag::error::SensorError;
use doortag::frame::Frame;
use doortag::fsm::PinLevel;
use doortag::sensors::{Acceleration, Environment};
use doortag::timers::SoftTimers;
use embedded_hal::delay::DelayNs;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    // Inputs
    pub button: PinLevel,
    pub switch: PinLevel,
    pub environment: Result<Environment, SensorError>,
    pub acceleration: Result<Acceleration, SensorError>,
    pub chip_temperature: Option<i32>,
    pub battery_mv: u16,
    pub mac: Option<[u8; 6]>,

    // Recorded outputs
    pub red: bool,
    pub green: bool,
    pub red_switch_ons: u32,
    pub battery_reads: u32,
    pub payloads: Vec<Frame>,
    pub intervals: Vec<u32>,
    pub nfc_text: Option<String>,
    pub nfc_reinits: u32,
    pub resets: u32,

    // Reboot timer
    pub timers: SoftTimers,
    pub now_ms: u32,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            button: PinLevel::High,
            switch: PinLevel::High,
            environment: Err(SensorError::NotFitted),
            acceleration: Err(SensorError::NotFitted),
            chip_temperature: Some(100),
            battery_mv: 3_000,
            mac: None,
            red: false,
            green: false,
            red_switch_ons: 0,
            battery_reads: 0,
            payloads: Vec::new(),
            intervals: Vec::new(),
            nfc_text: None,
            nfc_reinits: 0,
            resets: 0,
            timers: SoftTimers::new(),
            now_ms: 0,
        }
    }

    pub fn last_payload(&self) -> &[u8] {
        self.payloads
            .last()
            .map(Frame::as_bytes)
            .expect("no frame broadcast yet")
    }

    pub fn last_interval(&self) -> Option<u32> {
        self.intervals.last().copied()
    }

    pub fn leds(&self) -> (bool, bool) {
        (self.red, self.green)
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockBoard {
    fn read_environment(&mut self) -> Result<Environment, SensorError> {
        self.environment
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        self.acceleration
    }

    fn read_chip_temperature(&mut self) -> Option<i32> {
        self.chip_temperature
    }

    fn measure_battery_mv(&mut self) -> u16 {
        self.battery_reads += 1;
        self.battery_mv
    }
}

impl PinPort for MockBoard {
    fn button_level(&mut self) -> PinLevel {
        self.button
    }

    fn switch_level(&mut self) -> PinLevel {
        self.switch
    }
}

impl IndicatorPort for MockBoard {
    fn set_red(&mut self, on: bool) {
        if on && !self.red {
            self.red_switch_ons += 1;
        }
        self.red = on;
    }

    fn set_green(&mut self, on: bool) {
        self.green = on;
    }
}

impl BroadcastPort for MockBoard {
    fn set_payload(&mut self, frame: &Frame) {
        self.payloads.push(*frame);
    }

    fn set_advertising_interval(&mut self, interval_ms: u32) {
        self.intervals.push(interval_ms);
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        self.mac
    }
}

impl NfcPort for MockBoard {
    fn set_status_text(&mut self, text: &str) {
        self.nfc_text = Some(text.to_owned());
    }

    fn reinit(&mut self) {
        self.nfc_reinits += 1;
    }
}

impl TimerPort for MockBoard {
    fn start_reboot_timer(&mut self, delay_ms: u32) {
        self.timers.start_reboot(delay_ms, self.now_ms);
    }

    fn cancel_reboot_timer(&mut self) {
        self.timers.cancel_reboot();
    }
}

impl SystemPort for MockBoard {
    fn reset(&mut self) {
        self.resets += 1;
    }
}

// ── VecSink ───────────────────────────────────────────────────

pub struct VecSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── CountingDelay ─────────────────────────────────────────────

/// Returns immediately, adding up how long it was asked to wait.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ms: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
