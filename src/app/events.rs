//! Outbound application events.
//!
//! The [`Beacon`](super::service::Beacon) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count them in a test,
//! mirror them onto the NFC tag.

use crate::app::ports::RecordError;
use crate::error::InitStatus;
use crate::frame::FrameKind;
use crate::fsm::{DeviceMode, DoorState, SwitchPolarity};
use crate::tasks::Task;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot finished (carries the restored polarity, first door reading
    /// and accumulated init failures).
    Started {
        polarity: SwitchPolarity,
        door: DoorState,
        init: InitStatus,
    },

    /// Advertising cadence changed.
    ModeChanged(DeviceMode),

    /// The button toggled the switch polarity.
    PolarityChanged(SwitchPolarity),

    DoorChanged(DoorState),

    /// Polarity written to flash.
    PolarityPersisted { compacted: bool },

    /// Polarity write failed; the in-memory value stays authoritative.
    PersistFailed(RecordError),

    /// A new frame went on air.
    FrameBroadcast { kind: FrameKind, sequence: u16 },

    /// A follow-up task was rejected by a full queue.
    TaskDropped(Task),

    /// About to reset.
    Rebooting(RebootCause),
}

/// Why the reboot timer reset the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootCause {
    /// Button held past the reboot threshold.
    ButtonHold,
    /// NFC field countdown ran out.
    NfcField,
}
