//! Legacy 14-byte frame (discriminant `0x03`).
//!
//! | byte  | content                                           |
//! |-------|---------------------------------------------------|
//! | 0     | `0x03`                                            |
//! | 1     | humidity, 0.5 % per lsb                           |
//! | 2     | temperature whole degrees, bit 7 = sign           |
//! | 3     | temperature hundredths                            |
//! | 4–5   | pressure − 50 000 Pa                              |
//! | 6–11  | acceleration X / Y / Z, i16 mg                    |
//! | 12–13 | battery mV                                        |
//!
//! The format has no sentinel encoding; unavailable inputs are written as 0.

use super::{LEGACY_DISCRIMINANT, LEGACY_LEN};
use crate::sensors::{ACCELERATION_INVALID, SensorReading};

/// Largest temperature magnitude the sign-magnitude byte pair can carry,
/// in 1/100 °C.
const TEMPERATURE_MAX_ABS: u32 = 127 * 100 + 99;

pub(super) fn encode(r: &SensorReading) -> [u8; LEGACY_LEN] {
    let mut out = [0u8; LEGACY_LEN];
    out[0] = LEGACY_DISCRIMINANT;
    out[1] = humidity(r);
    let [whole, hundredths] = temperature(r);
    out[2] = whole;
    out[3] = hundredths;
    out[4..6].copy_from_slice(&pressure(r).to_be_bytes());
    out[6..8].copy_from_slice(&axis(r.acceleration_x).to_be_bytes());
    out[8..10].copy_from_slice(&axis(r.acceleration_y).to_be_bytes());
    out[10..12].copy_from_slice(&axis(r.acceleration_z).to_be_bytes());
    out[12..14].copy_from_slice(&r.battery_mv.to_be_bytes());
    out
}

fn humidity(r: &SensorReading) -> u8 {
    if !r.has_humidity() {
        return 0;
    }
    (r.humidity / 512).min(u32::from(u8::MAX)) as u8
}

fn temperature(r: &SensorReading) -> [u8; 2] {
    if !r.has_temperature() {
        return [0, 0];
    }
    let magnitude = r.temperature.unsigned_abs().min(TEMPERATURE_MAX_ABS);
    let mut whole = (magnitude / 100) as u8;
    if r.temperature < 0 {
        whole |= 0x80;
    }
    [whole, (magnitude % 100) as u8]
}

fn pressure(r: &SensorReading) -> u16 {
    if !r.has_pressure() {
        return 0;
    }
    let pascals = r.pressure >> 8;
    pascals.saturating_sub(50_000).min(u32::from(u16::MAX)) as u16
}

fn axis(value: i16) -> i16 {
    if value == ACCELERATION_INVALID { 0 } else { value }
}
