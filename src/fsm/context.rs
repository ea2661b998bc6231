//! Device state threaded through every transition function.
//!
//! `DeviceState` is the single struct the transition functions in
//! [`states`](super::states) read from and write to: advertising mode,
//! switch polarity, derived door state, button gesture progress,
//! debounce timestamps and the broadcast counters.  Only tasks running on
//! the main loop touch it; interrupt handlers reach it exclusively through
//! the task queue.

use crate::sensors::battery::BatteryCache;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Advertising cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Short interval right after boot (or re-arm) so the tag is found fast.
    StartupFast,
    /// Long interval for battery life.
    NormalSlow,
}

/// How the reed switch is mounted.  Persisted; flipped by a press/release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchPolarity {
    #[default]
    NormallyOpen,
    NormallyClosed,
}

impl SwitchPolarity {
    pub fn toggled(self) -> Self {
        match self {
            Self::NormallyOpen => Self::NormallyClosed,
            Self::NormallyClosed => Self::NormallyOpen,
        }
    }
}

/// Door state derived from the switch level and polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
}

/// Electrical level of an input pin.  Inputs are pulled up, so an
/// unpressed button and an open reed contact read `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn from_high(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Progress of the press / hold / release gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Pressed,
    /// Reset has been requested; nothing else happens until it takes effect.
    Rebooting,
}

// ---------------------------------------------------------------------------
// DeviceState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub mode: DeviceMode,
    /// When the current fast-advertising window opened.  `None` until the
    /// first sample runs.
    pub fast_since_ms: Option<u32>,

    pub polarity: SwitchPolarity,
    pub door: DoorState,

    pub button: ButtonState,
    pub last_button_edge_ms: Option<u32>,
    pub last_switch_edge_ms: Option<u32>,
    /// Last time the switch level was looked at, by edge or by poll.
    pub last_switch_check_ms: u32,

    /// Motion interrupts since boot (wrapping).
    pub acceleration_events: u16,
    /// Measurement sequence (wraps 65534 → 0).
    pub sequence: u16,

    pub battery: BatteryCache,
}

impl DeviceState {
    /// Boot state: fast advertising, default polarity, door derived later
    /// from the first switch read.
    pub fn new(battery_mv: u16) -> Self {
        Self {
            mode: DeviceMode::StartupFast,
            fast_since_ms: None,
            polarity: SwitchPolarity::NormallyOpen,
            door: DoorState::Closed,
            button: ButtonState::Idle,
            last_button_edge_ms: None,
            last_switch_edge_ms: None,
            last_switch_check_ms: 0,
            acceleration_events: 0,
            sequence: 0,
            battery: BatteryCache::new(battery_mv),
        }
    }

    /// Take the current sequence number and advance it.  `0xFFFF` is never
    /// handed out.
    pub fn next_sequence(&mut self) -> u16 {
        let current = self.sequence;
        self.sequence = if current >= 0xFFFE { 0 } else { current + 1 };
        current
    }

    pub fn is_button_pressed(&self) -> bool {
        self.button == ButtonState::Pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_fast_and_normally_open() {
        let s = DeviceState::new(3000);
        assert_eq!(s.mode, DeviceMode::StartupFast);
        assert_eq!(s.polarity, SwitchPolarity::NormallyOpen);
        assert_eq!(s.button, ButtonState::Idle);
        assert_eq!(s.battery.millivolts(), 3000);
    }

    #[test]
    fn sequence_wraps_before_ffff() {
        let mut s = DeviceState::new(3000);
        s.sequence = 0xFFFD;
        assert_eq!(s.next_sequence(), 0xFFFD);
        assert_eq!(s.next_sequence(), 0xFFFE);
        assert_eq!(s.next_sequence(), 0);
        assert_eq!(s.next_sequence(), 1);
    }

    #[test]
    fn polarity_toggle_is_an_involution() {
        let p = SwitchPolarity::NormallyOpen;
        assert_eq!(p.toggled(), SwitchPolarity::NormallyClosed);
        assert_eq!(p.toggled().toggled(), p);
    }
}
