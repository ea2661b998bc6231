//! Fuzz target: `frame::encode`
//!
//! Builds a sensor reading and broadcast counters from raw bytes and checks
//! that every format encodes without panicking, with the right length and
//! discriminant, and that the advertising data always fits one PDU.
//!
//! cargo fuzz run fuzz_frame_encoder

#![no_main]

use doortag::adapters::radio::{MAX_ADV_DATA, build_adv_data};
use doortag::frame::{BroadcastFields, FrameFormat, encode};
use doortag::fsm::DoorState;
use doortag::sensors::SensorReading;
use libfuzzer_sys::fuzz_target;

fn take<const N: usize>(data: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = data.len().min(N);
    out[..n].copy_from_slice(&data[..n]);
    *data = &data[n..];
    out
}

fuzz_target!(|data: &[u8]| {
    let mut rest = data;
    let reading = SensorReading {
        temperature: i32::from_le_bytes(take(&mut rest)),
        humidity: u32::from_le_bytes(take(&mut rest)),
        pressure: u32::from_le_bytes(take(&mut rest)),
        acceleration_x: i16::from_le_bytes(take(&mut rest)),
        acceleration_y: i16::from_le_bytes(take(&mut rest)),
        acceleration_z: i16::from_le_bytes(take(&mut rest)),
        battery_mv: u16::from_le_bytes(take(&mut rest)),
    };
    let [events_lo, events_hi, tx, seq_lo, seq_hi, has_mac] = take(&mut rest);
    let mac: [u8; 6] = take(&mut rest);
    let fields = BroadcastFields {
        acceleration_events: u16::from_le_bytes([events_lo, events_hi]),
        tx_power_dbm: tx as i8,
        sequence: u16::from_le_bytes([seq_lo, seq_hi]),
        mac: (has_mac & 1 == 1).then_some(mac),
    };

    for format in [
        FrameFormat::Legacy,
        FrameFormat::Extended,
        FrameFormat::ExtendedWithSwitch(DoorState::Closed),
        FrameFormat::ExtendedWithSwitch(DoorState::Open),
    ] {
        let frame = encode(format, &reading, &fields);
        let kind = format.kind();
        assert_eq!(frame.len(), kind.len());
        assert_eq!(frame.as_bytes()[0], kind.discriminant());
        assert!(build_adv_data(&frame).len() <= MAX_ADV_DATA);
    }
});
