//! Application service: the hexagonal core.
//!
//! [`Beacon`] owns the [`DeviceState`] and the configuration.  Every unit
//! of work arrives as a [`Task`] from the queue; the service runs the
//! matching transition function and applies the resulting [`Effects`]
//! through the port traits injected at the call site.
//!
//! ```text
//!  TaskQueue ──▶ ┌──────────────────────────┐ ──▶ BroadcastPort (frame)
//!                │          Beacon          │ ──▶ IndicatorPort / TimerPort
//!  SensorPort ──▶│  fsm::states · encoder   │ ──▶ RecordStore (polarity)
//!                └──────────────────────────┘ ──▶ EventSink
//! ```

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::BeaconConfig;
use crate::error::{InitFailure, InitStatus, SensorError};
use crate::frame::{self, BroadcastFields};
use crate::fsm::states;
use crate::fsm::{DeviceState, DoorState, Effect, Effects, Indication, PinLevel};
use crate::persist::{self, StoreOutcome};
use crate::sensors::SensorReading;
use crate::tasks::{QueueFull, Task, TaskQueue};

use super::events::{AppEvent, RebootCause};
use super::ports::{Board, EventSink, IndicatorPort, NfcPort, PinPort, RecordStore};

/// Red LED blinks used to report a failed boot.
const ERROR_BLINK_COUNT: u32 = 13;
const ERROR_BLINK_HALF_PERIOD_MS: u32 = 500;

// ───────────────────────────────────────────────────────────────
// Beacon
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct Beacon {
    config: BeaconConfig,
    state: DeviceState,
    init: InitStatus,
}

impl Beacon {
    /// Construct the service from a validated configuration and the
    /// failures collected while bringing the hardware up.
    ///
    /// Does **not** touch any port; call [`start`](Self::start) next.
    pub fn new(config: BeaconConfig, init: InitStatus) -> Self {
        Self {
            config,
            state: DeviceState::new(0),
            init,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the polarity, take the first switch and battery readings and
    /// start advertising at the fast interval.
    pub fn start(
        &mut self,
        now_ms: u32,
        hw: &mut impl Board,
        store: &mut impl RecordStore,
        sink: &mut impl EventSink,
    ) {
        let threshold = self.compaction_threshold();
        self.state.polarity = match persist::load_at_boot(store, threshold) {
            Ok(p) => p,
            Err(e) => {
                warn!("Polarity load failed ({}), using default", e);
                self.init.record(InitFailure::Storage);
                Default::default()
            }
        };

        self.state.door = states::recompute_door_state(hw.switch_level(), self.state.polarity);
        self.state.last_switch_check_ms = now_ms;

        let mv = hw.measure_battery_mv();
        self.state.battery.update(mv, now_ms);
        if mv < self.config.battery_min_mv {
            warn!("Battery at {} mV, below {} mV", mv, self.config.battery_min_mv);
            self.init.record(InitFailure::BatteryLow);
        }

        hw.set_advertising_interval(self.config.advertising_interval_ms(self.state.mode));

        sink.emit(&AppEvent::Started {
            polarity: self.state.polarity,
            door: self.state.door,
            init: self.init,
        });
        info!(
            "Beacon started: polarity={:?} door={:?} init=0x{:X}",
            self.state.polarity, self.state.door, self.init
        );
    }

    /// Show the boot result: green when clean, otherwise the failure mask on
    /// the NFC tag and a burst of red blinks.  Blocks for the blink sequence.
    pub fn announce_init_status(
        &self,
        hw: &mut (impl NfcPort + IndicatorPort),
        delay: &mut impl DelayNs,
    ) {
        if self.init.is_clean() {
            hw.set_red(false);
            hw.set_green(true);
            return;
        }

        for failure in self.init.failures() {
            warn!("init failure: {}", failure);
        }

        let mut text: heapless::String<16> = heapless::String::new();
        if write!(text, "Error: {:X}", self.init).is_ok() {
            hw.set_status_text(&text);
        }

        hw.set_green(false);
        for _ in 0..ERROR_BLINK_COUNT {
            hw.set_red(true);
            delay.delay_ms(ERROR_BLINK_HALF_PERIOD_MS);
            hw.set_red(false);
            delay.delay_ms(ERROR_BLINK_HALF_PERIOD_MS);
        }
    }

    // ── Task dispatch ─────────────────────────────────────────

    /// Run one task to completion.
    ///
    /// `now_ms` is the main loop's clock; edge and radio tasks carry their
    /// own capture time, which wins.  The reboot expiry carries the button
    /// level read when the timer fired.
    pub fn handle<const N: usize>(
        &mut self,
        task: Task,
        now_ms: u32,
        hw: &mut impl Board,
        store: &mut impl RecordStore,
        tasks: &TaskQueue<N>,
        sink: &mut impl EventSink,
    ) {
        let effects = match task {
            Task::Sample => {
                self.sample(now_ms, hw, tasks, sink);
                return;
            }
            Task::ButtonEdge { level, at_ms } => {
                states::on_button_edge(&mut self.state, level, at_ms, &self.config)
            }
            Task::SwitchEdge { level, at_ms } => {
                states::on_switch_edge(&mut self.state, level, at_ms, &self.config)
            }
            Task::RebootTimerExpired { button_level } => {
                let cause = if self.state.is_button_pressed() {
                    RebootCause::ButtonHold
                } else {
                    RebootCause::NfcField
                };
                let fx = states::on_reboot_timer(&mut self.state, button_level);
                if fx.contains(&Effect::Reset) {
                    sink.emit(&AppEvent::Rebooting(cause));
                }
                fx
            }
            Task::AccelerationEvent => {
                states::on_acceleration_event(&mut self.state);
                return;
            }
            Task::RadioIdle { at_ms } => {
                self.refresh_battery(at_ms, hw);
                return;
            }
            Task::NfcField { present } => states::on_nfc_field(present, &self.config),
            Task::PersistPolarity => {
                self.persist_polarity(store, sink);
                return;
            }
            Task::EnterFastAdvertising => states::enter_fast_advertising(&mut self.state, now_ms),
            Task::ReinitNfc => {
                hw.reinit();
                return;
            }
        };
        self.apply(&effects, hw, tasks, sink);
    }

    /// Turn the LEDs off before the main loop idles, unless the button is
    /// being held.
    pub fn before_idle(&self, hw: &mut (impl PinPort + IndicatorPort)) {
        if hw.button_level() != PinLevel::Low {
            hw.set_red(false);
            hw.set_green(false);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn init_status(&self) -> InitStatus {
        self.init
    }

    // ── Internal ──────────────────────────────────────────────

    /// The periodic sample: read sensors, re-check the door, encode and
    /// publish one frame.
    fn sample<const N: usize>(
        &mut self,
        now_ms: u32,
        hw: &mut impl Board,
        tasks: &TaskQueue<N>,
        sink: &mut impl EventSink,
    ) {
        let fx = states::update_advertising_mode(&mut self.state, now_ms, &self.config);
        self.apply(&fx, hw, tasks, sink);

        let mut reading = SensorReading::unavailable(self.state.battery.millivolts());
        match hw.read_environment() {
            Ok(env) => reading.apply_environment(env),
            Err(SensorError::NotFitted) => {
                if let Some(q) = hw.read_chip_temperature() {
                    reading.apply_chip_temperature(q);
                }
            }
            Err(e) => debug!("Environment read failed: {}", e),
        }
        match hw.read_acceleration() {
            Ok(acc) => reading.apply_acceleration(acc),
            Err(SensorError::NotFitted) => {}
            Err(e) => debug!("Acceleration read failed: {}", e),
        }

        let level = hw.switch_level();
        let fx = states::poll_switch(&mut self.state, level, now_ms, &self.config);
        self.apply(&fx, hw, tasks, sink);

        if !self.state.is_button_pressed() {
            Self::indicate(hw, Indication::Door(self.state.door));
        }

        let format = self.config.frame_format.with_door(self.state.door);
        let sequence = self.state.next_sequence();
        let fields = BroadcastFields {
            acceleration_events: self.state.acceleration_events,
            tx_power_dbm: self.config.tx_power_dbm,
            sequence,
            mac: hw.mac_address(),
        };
        let frame = frame::encode(format, &reading, &fields);
        hw.set_payload(&frame);
        sink.emit(&AppEvent::FrameBroadcast {
            kind: format.kind(),
            sequence,
        });
    }

    /// Measure the battery if the cached value is stale.  Only called once
    /// the radio has gone quiet, so the reading is not pulled down by TX.
    fn refresh_battery(&mut self, at_ms: u32, hw: &mut impl Board) {
        if !self
            .state
            .battery
            .is_due(at_ms, self.config.battery_recheck_interval_ms)
        {
            return;
        }
        let mv = hw.measure_battery_mv();
        debug!("Battery {} mV", mv);
        self.state.battery.update(mv, at_ms);
    }

    fn persist_polarity(&mut self, store: &mut impl RecordStore, sink: &mut impl EventSink) {
        let threshold = self.compaction_threshold();
        match persist::store_polarity(store, self.state.polarity, threshold) {
            Ok(outcome) => sink.emit(&AppEvent::PolarityPersisted {
                compacted: outcome == StoreOutcome::WrittenAndCompacted,
            }),
            Err(e) => sink.emit(&AppEvent::PersistFailed(e)),
        }
    }

    fn compaction_threshold(&self) -> usize {
        self.config.flash_compaction_threshold_bytes as usize
    }

    /// Translate transition effects into port calls.
    fn apply<const N: usize>(
        &mut self,
        effects: &Effects,
        hw: &mut impl Board,
        tasks: &TaskQueue<N>,
        sink: &mut impl EventSink,
    ) {
        for effect in effects {
            match *effect {
                Effect::StartRebootTimer(ms) => hw.start_reboot_timer(ms),
                Effect::CancelRebootTimer => hw.cancel_reboot_timer(),
                Effect::Indicate(ind) => Self::indicate(hw, ind),
                Effect::Post(task) => {
                    if let Err(QueueFull(t)) = tasks.post(task) {
                        warn!("Task queue full, dropped {:?}", t);
                        sink.emit(&AppEvent::TaskDropped(t));
                    }
                }
                Effect::SetAdvertising(mode) => {
                    hw.set_advertising_interval(self.config.advertising_interval_ms(mode));
                    sink.emit(&AppEvent::ModeChanged(mode));
                }
                Effect::DoorChanged(door) => sink.emit(&AppEvent::DoorChanged(door)),
                Effect::PolarityChanged(polarity) => {
                    sink.emit(&AppEvent::PolarityChanged(polarity));
                    // Same contact level, new meaning.
                    let level = hw.switch_level();
                    let fx = states::refresh_door(&mut self.state, level);
                    self.apply(&fx, hw, tasks, sink);
                }
                Effect::Reset => hw.reset(),
            }
        }
    }

    fn indicate(hw: &mut impl IndicatorPort, indication: Indication) {
        let (red, green) = match indication {
            Indication::ButtonHeld => (true, true),
            Indication::Clear => (false, false),
            Indication::Door(DoorState::Open) => (true, false),
            Indication::Door(DoorState::Closed) => (false, true),
        };
        hw.set_red(red);
        hw.set_green(green);
    }
}
