//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Beacon (domain)
//! ```
//!
//! Driven adapters (sensors, pins, LEDs, radio, NFC, timers, storage,
//! event sinks) implement these traits.  The [`Beacon`](super::service::Beacon)
//! consumes them via generics, so the domain core never touches hardware
//! directly and every path runs against mocks on the host.

use crate::error::SensorError;
use crate::fsm::context::PinLevel;
use crate::frame::Frame;
use crate::sensors::{Acceleration, Environment};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    fn read_environment(&mut self) -> Result<Environment, SensorError>;

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError>;

    /// SoC die temperature in quarter degrees, if the chip has a sensor.
    fn read_chip_temperature(&mut self) -> Option<i32>;

    /// Measure the supply now.  Only called while the radio is idle.
    fn measure_battery_mv(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Pin port
// ───────────────────────────────────────────────────────────────

/// Current levels of the user inputs, for polls and timer expiries.
pub trait PinPort {
    fn button_level(&mut self) -> PinLevel;

    fn switch_level(&mut self) -> PinLevel;
}

// ───────────────────────────────────────────────────────────────
// Indicator port
// ───────────────────────────────────────────────────────────────

/// Red / green indicator LEDs.
pub trait IndicatorPort {
    fn set_red(&mut self, on: bool);

    fn set_green(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Broadcast port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Advertising payload and cadence.
pub trait BroadcastPort {
    /// Replace the advertised payload with a finished frame.
    fn set_payload(&mut self, frame: &Frame);

    /// Change the advertising interval.
    fn set_advertising_interval(&mut self, interval_ms: u32);

    /// Device address, once the stack has reported it.
    fn mac_address(&self) -> Option<[u8; 6]>;
}

// ───────────────────────────────────────────────────────────────
// NFC port
// ───────────────────────────────────────────────────────────────

/// NFC tag content.  Building the NDEF records is the adapter's job.
pub trait NfcPort {
    /// Replace the human-readable status record.
    fn set_status_text(&mut self, text: &str);

    /// Re-emulate the tag after a reader walked away.
    fn reinit(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Timer port
// ───────────────────────────────────────────────────────────────

/// The single-shot reboot timer.  Expiry arrives as
/// [`Task::RebootTimerExpired`](crate::tasks::Task::RebootTimerExpired),
/// carrying the button level sampled when the timer fired.
pub trait TimerPort {
    /// Arm (or re-arm) the timer.
    fn start_reboot_timer(&mut self, delay_ms: u32);

    /// Disarm.  No effect if it already fired.
    fn cancel_reboot_timer(&mut self);
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Reset the device.  Does not return on target.
    fn reset(&mut self);
}

/// Everything the beacon drives on the board, bundled so one `&mut`
/// satisfies every port.
pub trait Board:
    SensorPort + PinPort + IndicatorPort + BroadcastPort + NfcPort + TimerPort + SystemPort
{
}

impl<T> Board for T where
    T: SensorPort + PinPort + IndicatorPort + BroadcastPort + NfcPort + TimerPort + SystemPort
{
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Record store port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Small fixed records addressed by `(file, record)`.
///
/// Writes must be atomic: after a power loss a record holds either the old
/// or the new value.
pub trait RecordStore {
    /// Read a record.  Returns the number of bytes written to `buf`.
    fn get(&self, file: u16, record: u16, buf: &mut [u8]) -> Result<usize, RecordError>;

    /// Write a record, replacing any previous value.
    fn set(&mut self, file: u16, record: u16, data: &[u8]) -> Result<(), RecordError>;

    /// Bytes still writable before compaction is needed.
    fn free_space(&self) -> usize;

    /// Reclaim space held by superseded records.
    fn compact(&mut self) -> Result<(), RecordError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RecordStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// No record at that address (first boot).
    NotFound,
    /// Storage is full even after compaction.
    Full,
    /// Stored value has the wrong size.
    Corrupted,
    /// Generic I/O error from the storage backend.
    Io,
}

impl core::fmt::Display for RecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Full => write!(f, "storage full"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}
