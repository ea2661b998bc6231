//! End-to-end tests for the Beacon → FSM → encoder → ports pipeline.
//!
//! A [`Rig`] owns the beacon, a mock board, a simulated record store and a
//! private task queue.  Time only moves when a test calls
//! [`Rig::advance_to`], which fires the soft timers and drains the queue
//! exactly as the firmware main loop would.

use doortag::adapters::hardware::HardwareAdapter;
use doortag::adapters::nvs::{NvsRecordStore, SIM_CAPACITY_BYTES};
use doortag::adapters::radio::BleBroadcaster;
use doortag::app::events::{AppEvent, RebootCause};
use doortag::app::ports::RecordStore;
use doortag::app::service::Beacon;
use doortag::config::BeaconConfig;
use doortag::drivers::hw_timer::HwTimers;
use doortag::error::{InitFailure, InitStatus, SensorError};
use doortag::frame::{FrameKind, FrameLayout};
use doortag::fsm::{ButtonState, DeviceMode, DoorState, PinLevel, SwitchPolarity};
use doortag::persist::{self, POLARITY_FILE_ID, POLARITY_RECORD_ID};
use doortag::sensors::Absent;
use doortag::tasks::{Drained, Task, TaskQueue};

use crate::mock_hw::{CountingDelay, MockBoard, VecSink};

/// Milliseconds the rig advances per main-loop pass.
const STEP_MS: u32 = 100;

// ── Rig ───────────────────────────────────────────────────────

struct Rig {
    beacon: Beacon,
    board: MockBoard,
    store: NvsRecordStore,
    queue: TaskQueue<16>,
    sink: VecSink,
}

impl Rig {
    fn new(config: BeaconConfig) -> Self {
        Self::with_store(config, NvsRecordStore::with_capacity(SIM_CAPACITY_BYTES))
    }

    fn with_store(config: BeaconConfig, store: NvsRecordStore) -> Self {
        Self {
            beacon: Beacon::new(config, InitStatus::new()),
            board: MockBoard::new(),
            store,
            queue: TaskQueue::new(),
            sink: VecSink::new(),
        }
    }

    /// Start the beacon at t = 0 and arm the periodic sample timer.
    fn boot(&mut self) {
        self.board.now_ms = 0;
        self.beacon
            .start(0, &mut self.board, &mut self.store, &mut self.sink);
        let period = self.beacon.config().sample_interval_ms;
        self.board.timers.start_sample(period, 0);
    }

    /// Drain the queue at the current time.
    fn run(&mut self) {
        let now = self.board.now_ms;
        while self.queue.drain_one(|task| {
            self.beacon.handle(
                task,
                now,
                &mut self.board,
                &mut self.store,
                &self.queue,
                &mut self.sink,
            )
        }) == Drained::Ran
        {}
    }

    /// Post whatever timers are due at the current time, without draining.
    /// The button is read at this instant, as the timer callback would.
    fn fire_timers(&mut self) {
        let now = self.board.now_ms;
        let button = self.board.button;
        self.board.timers.tick(now, || button, &self.queue);
    }

    /// Move the clock forward in main-loop steps, firing timers on the way.
    fn advance_to(&mut self, t_ms: u32) {
        while self.board.now_ms < t_ms {
            self.board.now_ms = (self.board.now_ms + STEP_MS).min(t_ms);
            self.fire_timers();
            self.run();
        }
    }

    /// Post a task as an interrupt would, then let the main loop run.
    fn post(&mut self, task: Task) {
        self.queue.post(task).expect("queue full");
        self.run();
    }

    fn press(&mut self, at_ms: u32) {
        self.advance_to(at_ms);
        self.board.button = PinLevel::Low;
        self.post(Task::ButtonEdge {
            level: PinLevel::Low,
            at_ms,
        });
    }

    fn release(&mut self, at_ms: u32) {
        self.advance_to(at_ms);
        self.board.button = PinLevel::High;
        self.post(Task::ButtonEdge {
            level: PinLevel::High,
            at_ms,
        });
    }

    fn last_sequence(&self) -> u16 {
        let p = self.board.last_payload();
        u16::from_be_bytes([p[16], p[17]])
    }
}

fn booted() -> Rig {
    let mut rig = Rig::new(BeaconConfig::default());
    rig.boot();
    rig
}

// ── Boot & first frame ────────────────────────────────────────

#[test]
fn boot_reports_restored_state_and_starts_fast() {
    let rig = booted();
    assert!(rig.sink.contains(&AppEvent::Started {
        polarity: SwitchPolarity::NormallyOpen,
        door: DoorState::Open,
        init: InitStatus::new(),
    }));
    assert_eq!(rig.board.intervals, vec![211]);
    assert_eq!(rig.board.battery_reads, 1);
    assert!(rig.board.payloads.is_empty(), "nothing is sent before the first sample");
}

#[test]
fn first_sample_broadcasts_extended_open_frame() {
    let mut rig = booted();
    rig.advance_to(1_000);

    assert_eq!(rig.board.payloads.len(), 1);
    let p = rig.board.last_payload();
    assert_eq!(p.len(), 24);
    assert_eq!(p[0], 0x16, "door open discriminant");
    // 100 quarter-degrees = 25.00 °C = 5000 × 0.005 °C
    assert_eq!(&p[1..3], &[0x13, 0x88]);
    assert_eq!(&p[3..5], &[0xFF, 0xFF], "no humidity");
    assert_eq!(&p[5..7], &[0xFF, 0xFF], "no pressure");
    assert_eq!(&p[7..13], &[0x80, 0x00, 0x80, 0x00, 0x80, 0x00]);
    // (3000 − 1600) << 5 | (4 + 40) / 2
    assert_eq!(&p[13..15], &0xAF16u16.to_be_bytes());
    assert_eq!(p[15], 0);
    assert_eq!(&p[16..18], &[0, 0]);
    assert_eq!(&p[18..24], &[0xFF; 6], "MAC not reported yet");

    assert_eq!(rig.board.leds(), (true, false), "red shows the open door");
    assert!(rig.sink.contains(&AppEvent::FrameBroadcast {
        kind: FrameKind::ExtendedDoorOpen,
        sequence: 0,
    }));
}

#[test]
fn sequence_advances_and_mac_is_carried() {
    let mut rig = booted();
    rig.board.mac = Some([0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22]);
    rig.advance_to(3_000);

    assert_eq!(rig.board.payloads.len(), 3);
    assert_eq!(rig.last_sequence(), 2);
    assert_eq!(
        &rig.board.last_payload()[18..24],
        &[0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22]
    );
}

#[test]
fn legacy_layout_sends_short_frame_with_zeroed_fields() {
    let config = BeaconConfig {
        frame_format: FrameLayout::Legacy,
        ..BeaconConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.boot();
    rig.board.chip_temperature = None;
    rig.advance_to(1_000);

    let p = rig.board.last_payload();
    assert_eq!(p.len(), 14);
    assert_eq!(p[0], 0x03);
    assert_eq!(&p[1..12], &[0u8; 11]);
    assert_eq!(&p[12..14], &3_000u16.to_be_bytes());
}

#[test]
fn failed_environment_read_sends_sentinel_without_chip_fallback() {
    let mut rig = booted();
    rig.board.environment = Err(SensorError::BusFailed);
    rig.advance_to(1_000);

    let p = rig.board.last_payload();
    assert_eq!(&p[1..3], &[0x80, 0x00], "chip temperature only stands in for a missing part");
    assert_eq!(&p[3..7], &[0xFF; 4]);
}

#[test]
fn acceleration_events_are_counted_into_the_frame() {
    let mut rig = booted();
    for _ in 0..3 {
        rig.post(Task::AccelerationEvent);
    }
    rig.advance_to(1_000);
    assert_eq!(rig.board.last_payload()[15], 3);
}

// ── Reed switch ───────────────────────────────────────────────

#[test]
fn switch_edge_flips_door_and_discriminant() {
    let mut rig = booted();
    rig.advance_to(1_000);
    assert_eq!(rig.board.last_payload()[0], 0x16);

    rig.advance_to(1_500);
    rig.board.switch = PinLevel::Low;
    rig.post(Task::SwitchEdge {
        level: PinLevel::Low,
        at_ms: 1_500,
    });

    assert_eq!(rig.beacon.state().door, DoorState::Closed);
    assert!(rig.sink.contains(&AppEvent::DoorChanged(DoorState::Closed)));
    assert_eq!(rig.board.leds(), (true, false), "LEDs wait for the next sample");

    rig.advance_to(2_000);
    assert_eq!(rig.board.last_payload()[0], 0x15);
    assert_eq!(rig.board.leds(), (false, true), "green shows the closed door");
}

#[test]
fn bounced_switch_edge_is_recovered_by_periodic_poll() {
    let mut rig = booted();
    rig.advance_to(1_500);
    rig.board.switch = PinLevel::Low;
    rig.post(Task::SwitchEdge {
        level: PinLevel::Low,
        at_ms: 1_500,
    });
    assert_eq!(rig.beacon.state().door, DoorState::Closed);

    // Door swings back 50 ms later: inside the debounce window.
    rig.board.switch = PinLevel::High;
    rig.post(Task::SwitchEdge {
        level: PinLevel::High,
        at_ms: 1_550,
    });
    assert_eq!(rig.beacon.state().door, DoorState::Closed, "bounce rejected");

    // Nothing changes until the poll interval has passed since that edge.
    rig.advance_to(11_000);
    assert_eq!(rig.beacon.state().door, DoorState::Closed);
    rig.advance_to(12_000);
    assert_eq!(rig.beacon.state().door, DoorState::Open);
    assert_eq!(rig.board.last_payload()[0], 0x16);
}

// ── Button ────────────────────────────────────────────────────

#[test]
fn short_press_toggles_polarity_and_persists_it() {
    let mut rig = booted();
    rig.press(5_000);
    assert!(rig.board.timers.reboot_armed());
    assert_eq!(rig.board.leds(), (true, true), "both LEDs while held");

    rig.release(5_400);
    assert!(!rig.board.timers.reboot_armed());
    assert_eq!(rig.board.leds(), (false, false), "release clears the LEDs");
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyClosed);
    assert!(rig
        .sink
        .contains(&AppEvent::PolarityChanged(SwitchPolarity::NormallyClosed)));
    // Same contact level, new polarity: the door now reads closed.
    assert_eq!(rig.beacon.state().door, DoorState::Closed);
    assert!(rig.sink.contains(&AppEvent::DoorChanged(DoorState::Closed)));
    assert!(rig
        .sink
        .contains(&AppEvent::PolarityPersisted { compacted: false }));
    assert_eq!(
        persist::load_polarity(&rig.store),
        Ok(SwitchPolarity::NormallyClosed)
    );

    rig.advance_to(10_000);
    assert_eq!(rig.board.resets, 0);
    assert_eq!(rig.board.last_payload()[0], 0x15);
}

#[test]
fn two_short_presses_restore_original_polarity() {
    let mut rig = booted();
    rig.press(2_000);
    rig.release(2_300);
    rig.press(4_000);
    rig.release(4_300);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyOpen);
    assert_eq!(
        persist::load_polarity(&rig.store),
        Ok(SwitchPolarity::NormallyOpen)
    );
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::PolarityPersisted { .. })),
        2
    );
}

#[test]
fn button_bounce_does_not_toggle() {
    let mut rig = booted();
    rig.press(2_000);
    // Contact chatter 20 ms after the press.
    rig.board.button = PinLevel::High;
    rig.post(Task::ButtonEdge {
        level: PinLevel::High,
        at_ms: 2_020,
    });
    assert_eq!(rig.beacon.state().button, ButtonState::Pressed);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyOpen);
}

#[test]
fn long_press_reboots() {
    let mut rig = booted();
    rig.press(5_000);
    rig.advance_to(7_900);
    assert_eq!(rig.board.resets, 0);

    rig.advance_to(8_000);
    assert_eq!(rig.board.resets, 1);
    assert!(rig.sink.contains(&AppEvent::Rebooting(RebootCause::ButtonHold)));
    assert_eq!(rig.beacon.state().button, ButtonState::Rebooting);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyOpen);
}

#[test]
fn release_queued_behind_reboot_expiry_still_reboots() {
    let mut rig = booted();
    rig.press(5_000);
    rig.advance_to(7_900);

    // The hold timer fires with the button still down...
    rig.board.now_ms = 8_000;
    rig.fire_timers();
    // ...and the release lands before the main loop reaches the expiry.
    rig.board.button = PinLevel::High;
    rig.queue
        .post(Task::ButtonEdge {
            level: PinLevel::High,
            at_ms: 8_005,
        })
        .unwrap();
    rig.run();

    assert_eq!(rig.board.resets, 1);
    assert!(rig.sink.contains(&AppEvent::Rebooting(RebootCause::ButtonHold)));
    assert_eq!(rig.beacon.state().button, ButtonState::Rebooting);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyOpen);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::PolarityPersisted { .. })),
        0
    );
}

#[test]
fn release_just_before_hold_time_toggles_without_reboot() {
    let mut rig = booted();
    rig.press(5_000);
    rig.release(7_900);
    rig.advance_to(9_000);

    assert_eq!(rig.board.resets, 0);
    assert_eq!(rig.beacon.state().button, ButtonState::Idle);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyClosed);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::PolarityChanged(_))),
        1
    );
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::PolarityPersisted { .. })),
        1
    );
}

#[test]
fn missed_release_edge_does_not_reboot() {
    let mut rig = booted();
    rig.press(5_000);
    // Released, but the edge never reached the queue.
    rig.board.button = PinLevel::High;
    rig.advance_to(8_500);
    assert_eq!(rig.board.resets, 0);
    assert_eq!(rig.beacon.state().button, ButtonState::Idle);
}

#[test]
fn leds_stay_lit_while_the_button_is_held() {
    let mut rig = booted();
    rig.press(1_500);
    rig.advance_to(2_000);
    // The sample does not paint the door colour over the held indication.
    assert_eq!(rig.board.leds(), (true, true));
    rig.beacon.before_idle(&mut rig.board);
    assert_eq!(rig.board.leds(), (true, true));
}

#[test]
fn leds_turn_off_before_idle() {
    let mut rig = booted();
    rig.advance_to(1_000);
    assert_eq!(rig.board.leds(), (true, false));
    rig.beacon.before_idle(&mut rig.board);
    assert_eq!(rig.board.leds(), (false, false));
}

// ── NFC ───────────────────────────────────────────────────────

#[test]
fn nfc_field_starts_reset_countdown() {
    let mut rig = booted();
    rig.advance_to(2_000);
    rig.post(Task::NfcField { present: true });
    assert!(rig.board.timers.reboot_armed());

    rig.advance_to(11_900);
    assert_eq!(rig.board.resets, 0);
    rig.advance_to(12_000);
    assert_eq!(rig.board.resets, 1);
    assert!(rig.sink.contains(&AppEvent::Rebooting(RebootCause::NfcField)));
}

#[test]
fn nfc_field_loss_reinitialises_tag() {
    let mut rig = booted();
    rig.post(Task::NfcField { present: false });
    assert_eq!(rig.board.nfc_reinits, 1);
    assert!(!rig.board.timers.reboot_armed());
    assert_eq!(rig.beacon.state().mode, DeviceMode::StartupFast);
}

// ── Advertising mode ──────────────────────────────────────────

#[test]
fn fast_window_closes_after_thirty_seconds_of_samples() {
    let mut rig = booted();
    rig.advance_to(30_000);
    assert_eq!(rig.beacon.state().mode, DeviceMode::StartupFast);
    assert_eq!(rig.board.last_interval(), Some(211));

    // Window opened at the first sample (t = 1 s).
    rig.advance_to(31_000);
    assert_eq!(rig.beacon.state().mode, DeviceMode::NormalSlow);
    assert_eq!(rig.board.last_interval(), Some(1_285));
    assert!(rig.sink.contains(&AppEvent::ModeChanged(DeviceMode::NormalSlow)));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::ModeChanged(DeviceMode::NormalSlow))),
        1
    );

    rig.advance_to(60_000);
    assert_eq!(rig.board.intervals, vec![211, 1_285]);
}

#[test]
fn release_rearms_fast_advertising_when_enabled() {
    let config = BeaconConfig {
        rearm_fast_on_release: true,
        ..BeaconConfig::default()
    };
    let mut rig = Rig::new(config);
    rig.boot();
    rig.advance_to(31_000);
    assert_eq!(rig.beacon.state().mode, DeviceMode::NormalSlow);

    rig.press(35_000);
    rig.release(35_300);
    assert_eq!(rig.beacon.state().mode, DeviceMode::StartupFast);
    assert_eq!(rig.board.last_interval(), Some(211));

    // A fresh 30 s window from the re-arm, checked on the next sample.
    rig.advance_to(65_000);
    assert_eq!(rig.beacon.state().mode, DeviceMode::StartupFast);
    rig.advance_to(66_000);
    assert_eq!(rig.beacon.state().mode, DeviceMode::NormalSlow);
}

#[test]
fn release_keeps_slow_mode_by_default() {
    let mut rig = booted();
    rig.advance_to(31_000);
    rig.press(35_000);
    rig.release(35_300);
    assert_eq!(rig.beacon.state().mode, DeviceMode::NormalSlow);
}

// ── Battery ───────────────────────────────────────────────────

#[test]
fn battery_is_remeasured_only_when_radio_idle_and_stale() {
    let mut rig = booted();
    rig.board.battery_mv = 2_600;

    rig.post(Task::RadioIdle { at_ms: 5_000 });
    assert_eq!(rig.board.battery_reads, 1, "boot reading is still fresh");

    rig.post(Task::RadioIdle { at_ms: 10_000 });
    assert_eq!(rig.board.battery_reads, 2);

    rig.post(Task::RadioIdle { at_ms: 12_000 });
    assert_eq!(rig.board.battery_reads, 2);

    rig.advance_to(1_000);
    // (2600 − 1600) << 5 | 22
    assert_eq!(
        &rig.board.last_payload()[13..15],
        &((1_000u16 << 5) | 22).to_be_bytes()
    );
}

#[test]
fn samples_alone_never_measure_the_battery() {
    let mut rig = booted();
    rig.advance_to(20_000);
    assert_eq!(rig.board.battery_reads, 1);
}

#[test]
fn low_battery_at_boot_is_flagged() {
    let mut rig = Rig::new(BeaconConfig::default());
    rig.board.battery_mv = 1_900;
    rig.boot();
    assert!(rig.beacon.init_status().has(InitFailure::BatteryLow));
}

// ── Persistence across reboots ────────────────────────────────

#[test]
fn stored_polarity_is_restored_at_boot() {
    let mut store = NvsRecordStore::with_capacity(SIM_CAPACITY_BYTES);
    store
        .set(POLARITY_FILE_ID, POLARITY_RECORD_ID, &1u32.to_le_bytes())
        .unwrap();

    let mut rig = Rig::with_store(BeaconConfig::default(), store);
    rig.boot();
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyClosed);
    // Contact reads high, normally closed: the door is shut.
    assert_eq!(rig.beacon.state().door, DoorState::Closed);
}

#[test]
fn corrupt_record_falls_back_to_default() {
    let mut store = NvsRecordStore::with_capacity(SIM_CAPACITY_BYTES);
    store
        .set(POLARITY_FILE_ID, POLARITY_RECORD_ID, &[0xAA; 8])
        .unwrap();

    let mut rig = Rig::with_store(BeaconConfig::default(), store);
    rig.boot();
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyOpen);
    assert!(rig.beacon.init_status().is_clean());
}

#[test]
fn full_store_reports_failure_but_keeps_toggle() {
    let mut rig = Rig::with_store(BeaconConfig::default(), NvsRecordStore::with_capacity(0));
    rig.boot();
    rig.press(2_000);
    rig.release(2_300);
    assert_eq!(rig.beacon.state().polarity, SwitchPolarity::NormallyClosed);
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::PersistFailed(_))));
}

// ── Queue overflow ────────────────────────────────────────────

#[test]
fn full_queue_drops_newest_and_reports_it() {
    let mut beacon = Beacon::new(BeaconConfig::default(), InitStatus::new());
    let mut board = MockBoard::new();
    let mut store = NvsRecordStore::with_capacity(SIM_CAPACITY_BYTES);
    let mut sink = VecSink::new();
    let queue: TaskQueue<1> = TaskQueue::new();

    beacon.start(0, &mut board, &mut store, &mut sink);
    queue.post(Task::AccelerationEvent).unwrap();

    board.button = PinLevel::Low;
    let press = Task::ButtonEdge {
        level: PinLevel::Low,
        at_ms: 1_000,
    };
    beacon.handle(press, 1_000, &mut board, &mut store, &queue, &mut sink);
    board.button = PinLevel::High;
    let release = Task::ButtonEdge {
        level: PinLevel::High,
        at_ms: 1_300,
    };
    beacon.handle(release, 1_300, &mut board, &mut store, &queue, &mut sink);

    assert!(sink.contains(&AppEvent::TaskDropped(Task::PersistPolarity)));
    assert_eq!(queue.dropped(), 1);
    // The queued task survived.
    let mut kept = None;
    assert_eq!(queue.drain_one(|t| kept = Some(t)), Drained::Ran);
    assert_eq!(kept, Some(Task::AccelerationEvent));
}

// ── Timer fallback ────────────────────────────────────────────

#[test]
fn failed_timer_init_still_samples_from_the_main_loop() {
    let config = BeaconConfig::default();
    let mut init = InitStatus::new();
    init.record(InitFailure::Timer);

    let mut hw = HardwareAdapter::new(
        Absent,
        Absent,
        BleBroadcaster::new(config.tx_power_dbm, config.fast_advertising_interval_ms).unwrap(),
        HwTimers::software(config.sample_interval_ms, 0),
    );
    let mut store = NvsRecordStore::with_capacity(SIM_CAPACITY_BYTES);
    let mut sink = VecSink::new();
    let queue: TaskQueue<8> = TaskQueue::new();
    let mut beacon = Beacon::new(config, init);
    beacon.start(0, &mut hw, &mut store, &mut sink);

    for now in (0..=3_000u32).step_by(10) {
        hw.tick_timers(now, &queue);
        while queue.drain_one(|task| {
            beacon.handle(task, now, &mut hw, &mut store, &queue, &mut sink)
        }) == Drained::Ran
        {}
    }

    assert_eq!(hw.radio().payload_updates(), 3);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::FrameBroadcast { .. })),
        3
    );
    assert!(beacon.init_status().has(InitFailure::Timer));
}

// ── Boot status announcement ──────────────────────────────────

#[test]
fn clean_boot_shows_green() {
    let beacon = Beacon::new(BeaconConfig::default(), InitStatus::new());
    let mut board = MockBoard::new();
    let mut delay = CountingDelay::default();
    beacon.announce_init_status(&mut board, &mut delay);
    assert_eq!(board.leds(), (false, true));
    assert_eq!(board.nfc_text, None);
    assert_eq!(delay.total_ms, 0);
}

#[test]
fn failed_boot_writes_mask_and_blinks_red() {
    let mut init = InitStatus::new();
    init.record(InitFailure::Storage);
    init.record(InitFailure::Radio);
    let beacon = Beacon::new(BeaconConfig::default(), init);
    let mut board = MockBoard::new();
    let mut delay = CountingDelay::default();

    beacon.announce_init_status(&mut board, &mut delay);

    assert_eq!(board.nfc_text.as_deref(), Some("Error: 11"));
    assert_eq!(board.red_switch_ons, 13);
    assert_eq!(board.leds(), (false, false));
    assert_eq!(delay.total_ms, 13_000);
}
