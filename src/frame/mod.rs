//! Broadcast frame encoder.
//!
//! Turns a [`SensorReading`] plus a few broadcast counters into the compact
//! big-endian payload carried in the manufacturer-specific advertising
//! field.  Pure and integer-only: the same inputs always give the same
//! bytes, and no input makes it fail.
//!
//! ```text
//!  byte 0            discriminant
//!  ┌──────┬─────────────────────────────────────────────────┐
//!  │ 0x03 │ legacy, 14 bytes                                │
//!  │ 0x05 │ extended, 24 bytes                              │
//!  │ 0x15 │ extended + reed switch, door closed, 24 bytes   │
//!  │ 0x16 │ extended + reed switch, door open, 24 bytes     │
//!  └──────┴─────────────────────────────────────────────────┘
//! ```
//!
//! Unavailable sub-fields are marked per format: legacy writes zero,
//! extended writes the format's sentinel.  See [`legacy`] and [`extended`]
//! for the field tables.

pub mod extended;
pub mod legacy;

use serde::{Deserialize, Serialize};

use crate::fsm::context::DoorState;
use crate::sensors::SensorReading;

/// Bluetooth SIG company identifier prefixed to every frame on air.
pub const MANUFACTURER_ID: u16 = 0x0499;

pub const LEGACY_DISCRIMINANT: u8 = 0x03;
pub const EXTENDED_DISCRIMINANT: u8 = 0x05;
pub const DOOR_CLOSED_DISCRIMINANT: u8 = 0x15;
pub const DOOR_OPEN_DISCRIMINANT: u8 = 0x16;

pub const LEGACY_LEN: usize = 14;
pub const EXTENDED_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Format selection
// ---------------------------------------------------------------------------

/// Which frame to produce.  The switch variant carries the door state it
/// reports in the discriminant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Legacy,
    Extended,
    ExtendedWithSwitch(DoorState),
}

impl FrameFormat {
    pub fn kind(self) -> FrameKind {
        match self {
            Self::Legacy => FrameKind::Legacy,
            Self::Extended => FrameKind::Extended,
            Self::ExtendedWithSwitch(DoorState::Closed) => FrameKind::ExtendedDoorClosed,
            Self::ExtendedWithSwitch(DoorState::Open) => FrameKind::ExtendedDoorOpen,
        }
    }
}

/// Configured frame layout, before the live door state is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameLayout {
    Legacy,
    Extended,
    ExtendedWithSwitch,
}

impl FrameLayout {
    /// Resolve to a concrete format for the current door state.
    pub fn with_door(self, door: DoorState) -> FrameFormat {
        match self {
            Self::Legacy => FrameFormat::Legacy,
            Self::Extended => FrameFormat::Extended,
            Self::ExtendedWithSwitch => FrameFormat::ExtendedWithSwitch(door),
        }
    }
}

/// Decoded discriminant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Legacy,
    Extended,
    ExtendedDoorClosed,
    ExtendedDoorOpen,
}

impl FrameKind {
    pub fn from_discriminant(byte: u8) -> Option<Self> {
        match byte {
            LEGACY_DISCRIMINANT => Some(Self::Legacy),
            EXTENDED_DISCRIMINANT => Some(Self::Extended),
            DOOR_CLOSED_DISCRIMINANT => Some(Self::ExtendedDoorClosed),
            DOOR_OPEN_DISCRIMINANT => Some(Self::ExtendedDoorOpen),
            _ => None,
        }
    }

    pub const fn discriminant(self) -> u8 {
        match self {
            Self::Legacy => LEGACY_DISCRIMINANT,
            Self::Extended => EXTENDED_DISCRIMINANT,
            Self::ExtendedDoorClosed => DOOR_CLOSED_DISCRIMINANT,
            Self::ExtendedDoorOpen => DOOR_OPEN_DISCRIMINANT,
        }
    }

    /// Encoded length of frames of this kind.
    pub const fn len(self) -> usize {
        match self {
            Self::Legacy => LEGACY_LEN,
            _ => EXTENDED_LEN,
        }
    }

    /// Door state reported by the discriminant, if the kind carries one.
    pub fn door(self) -> Option<DoorState> {
        match self {
            Self::ExtendedDoorClosed => Some(DoorState::Closed),
            Self::ExtendedDoorOpen => Some(DoorState::Open),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder inputs / output
// ---------------------------------------------------------------------------

/// Per-frame counters and radio parameters that are not sensor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastFields {
    /// Motion interrupts since boot (wrapping).
    pub acceleration_events: u16,
    /// Transmit power in dBm.
    pub tx_power_dbm: i8,
    /// Measurement sequence number.
    pub sequence: u16,
    /// Device address, if the radio stack reported one.
    pub mac: Option<[u8; 6]>,
}

/// A finished, immutable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Legacy([u8; LEGACY_LEN]),
    Extended([u8; EXTENDED_LEN]),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Legacy(b) => b,
            Self::Extended(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Decode the discriminant byte.
    pub fn format(&self) -> Option<FrameKind> {
        FrameKind::from_discriminant(self.as_bytes()[0])
    }
}

/// Encode one frame.
pub fn encode(format: FrameFormat, reading: &SensorReading, fields: &BroadcastFields) -> Frame {
    match format {
        FrameFormat::Legacy => Frame::Legacy(legacy::encode(reading)),
        other => Frame::Extended(extended::encode(other.kind().discriminant(), reading, fields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [FrameKind; 4] = [
        FrameKind::Legacy,
        FrameKind::Extended,
        FrameKind::ExtendedDoorClosed,
        FrameKind::ExtendedDoorOpen,
    ];

    fn fields() -> BroadcastFields {
        BroadcastFields {
            acceleration_events: 0,
            tx_power_dbm: 4,
            sequence: 0,
            mac: None,
        }
    }

    #[test]
    fn discriminant_round_trip() {
        for kind in KINDS {
            assert_eq!(FrameKind::from_discriminant(kind.discriminant()), Some(kind));
        }
        assert_eq!(FrameKind::from_discriminant(0x04), None);
        assert_eq!(FrameKind::from_discriminant(0x00), None);
    }

    #[test]
    fn encoded_frame_reports_its_format() {
        let reading = SensorReading::unavailable(3000);
        for format in [
            FrameFormat::Legacy,
            FrameFormat::Extended,
            FrameFormat::ExtendedWithSwitch(DoorState::Closed),
            FrameFormat::ExtendedWithSwitch(DoorState::Open),
        ] {
            let frame = encode(format, &reading, &fields());
            assert_eq!(frame.format(), Some(format.kind()));
            assert_eq!(frame.len(), format.kind().len());
        }
    }

    #[test]
    fn switch_kinds_carry_door_state() {
        assert_eq!(FrameKind::ExtendedDoorOpen.door(), Some(DoorState::Open));
        assert_eq!(FrameKind::ExtendedDoorClosed.door(), Some(DoorState::Closed));
        assert_eq!(FrameKind::Extended.door(), None);
    }

    #[test]
    fn layout_resolves_with_live_door_state() {
        assert_eq!(
            FrameLayout::ExtendedWithSwitch.with_door(DoorState::Open),
            FrameFormat::ExtendedWithSwitch(DoorState::Open)
        );
        assert_eq!(FrameLayout::Legacy.with_door(DoorState::Open), FrameFormat::Legacy);
    }

    #[test]
    fn door_state_only_changes_discriminant() {
        let reading = SensorReading::unavailable(3000);
        let open = encode(FrameFormat::ExtendedWithSwitch(DoorState::Open), &reading, &fields());
        let closed = encode(FrameFormat::ExtendedWithSwitch(DoorState::Closed), &reading, &fields());
        assert_eq!(open.as_bytes()[0], DOOR_OPEN_DISCRIMINANT);
        assert_eq!(closed.as_bytes()[0], DOOR_CLOSED_DISCRIMINANT);
        assert_eq!(open.as_bytes()[1..], closed.as_bytes()[1..]);
    }
}
