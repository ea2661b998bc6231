//! Extended 24-byte frame (discriminant `0x05`, or `0x15` / `0x16` when
//! the door state rides in the discriminant).
//!
//! | byte  | content                                            | sentinel |
//! |-------|----------------------------------------------------|----------|
//! | 0     | discriminant                                       |          |
//! | 1–2   | temperature, 0.005 °C per lsb, i16                 | `0x8000` |
//! | 3–4   | humidity, 0.0025 % per lsb                         | `0xFFFF` |
//! | 5–6   | pressure, 1 Pa per lsb, offset −50 000 Pa          | `0xFFFF` |
//! | 7–12  | acceleration X / Y / Z, i16 mg                     | `0x8000` |
//! | 13–14 | battery (11 bits, mV − 1600) · tx power (5 bits)   |          |
//! | 15    | movement counter                                   |          |
//! | 16–17 | measurement sequence                               |          |
//! | 18–23 | MAC address                                        | `FF × 6` |
//!
//! Valid values saturate one step short of the sentinel so a real reading
//! is never mistaken for a missing one.

use super::{BroadcastFields, EXTENDED_LEN};
use crate::sensors::SensorReading;

const TEMPERATURE_SENTINEL: i16 = i16::MIN;
const U16_SENTINEL: u16 = 0xFFFF;
const U16_MAX_VALID: u32 = 0xFFFE;
const PRESSURE_OFFSET_PA: u32 = 50_000;

const BATTERY_OFFSET_MV: u16 = 1600;
const BATTERY_MAX_FIELD: u16 = 2046;
const TX_POWER_OFFSET_DBM: i16 = 40;
const TX_POWER_MAX_FIELD: i16 = 30;

pub(super) fn encode(
    discriminant: u8,
    r: &SensorReading,
    fields: &BroadcastFields,
) -> [u8; EXTENDED_LEN] {
    let mut out = [0u8; EXTENDED_LEN];
    out[0] = discriminant;
    out[1..3].copy_from_slice(&temperature(r).to_be_bytes());
    out[3..5].copy_from_slice(&humidity(r).to_be_bytes());
    out[5..7].copy_from_slice(&pressure(r).to_be_bytes());
    out[7..9].copy_from_slice(&r.acceleration_x.to_be_bytes());
    out[9..11].copy_from_slice(&r.acceleration_y.to_be_bytes());
    out[11..13].copy_from_slice(&r.acceleration_z.to_be_bytes());
    out[13..15].copy_from_slice(&power_info(r.battery_mv, fields.tx_power_dbm).to_be_bytes());
    out[15] = (fields.acceleration_events % 256) as u8;
    out[16..18].copy_from_slice(&fields.sequence.to_be_bytes());
    out[18..24].copy_from_slice(&fields.mac.unwrap_or([0xFF; 6]));
    out
}

fn temperature(r: &SensorReading) -> i16 {
    if !r.has_temperature() {
        return TEMPERATURE_SENTINEL;
    }
    let max = i32::from(i16::MAX);
    r.temperature.saturating_mul(2).clamp(-max, max) as i16
}

fn humidity(r: &SensorReading) -> u16 {
    if !r.has_humidity() {
        return U16_SENTINEL;
    }
    (u64::from(r.humidity) * 400 / 1024).min(u64::from(U16_MAX_VALID)) as u16
}

fn pressure(r: &SensorReading) -> u16 {
    if !r.has_pressure() {
        return U16_SENTINEL;
    }
    let pascals = r.pressure >> 8;
    pascals.saturating_sub(PRESSURE_OFFSET_PA).min(U16_MAX_VALID) as u16
}

/// Pack battery voltage into the upper 11 bits and transmit power into the
/// lower 5.
fn power_info(battery_mv: u16, tx_power_dbm: i8) -> u16 {
    let battery = battery_mv
        .saturating_sub(BATTERY_OFFSET_MV)
        .min(BATTERY_MAX_FIELD);
    let tx = ((i16::from(tx_power_dbm) + TX_POWER_OFFSET_DBM) / 2).clamp(0, TX_POWER_MAX_FIELD);
    (battery << 5) | tx as u16
}
