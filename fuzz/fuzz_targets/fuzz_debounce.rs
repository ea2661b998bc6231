//! Fuzz target: button / switch transition functions
//!
//! Interprets the input as a stream of edges, timer expiries and NFC
//! events with arbitrary timestamps (including clock wrap) and checks the
//! state machine never panics and never overflows its effect list.
//!
//! cargo fuzz run fuzz_debounce

#![no_main]

use doortag::config::BeaconConfig;
use doortag::fsm::states;
use doortag::fsm::{DeviceState, PinLevel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cfg = BeaconConfig {
        rearm_fast_on_release: data.first().is_some_and(|b| b & 1 == 1),
        ..BeaconConfig::default()
    };
    let mut state = DeviceState::new(3_000);
    let mut now = u32::MAX - 5_000;

    for chunk in data.chunks_exact(3) {
        now = now.wrapping_add(u32::from(u16::from_le_bytes([chunk[1], chunk[2]])));
        let level = PinLevel::from_high(chunk[0] & 0x80 != 0);
        let _ = match chunk[0] & 0x07 {
            0 => states::on_button_edge(&mut state, level, now, &cfg),
            1 => states::on_switch_edge(&mut state, level, now, &cfg),
            2 => states::poll_switch(&mut state, level, now, &cfg),
            3 => states::on_reboot_timer(&mut state, level),
            4 => states::update_advertising_mode(&mut state, now, &cfg),
            5 => states::enter_fast_advertising(&mut state, now),
            6 => states::on_nfc_field(level == PinLevel::High, &cfg),
            _ => {
                states::on_acceleration_event(&mut state);
                Default::default()
            }
        };
        assert_ne!(state.next_sequence(), 0xFFFF);
    }
});
