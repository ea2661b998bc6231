//! Mode and debounce state machine.
//!
//! Transition functions in [`states`] take the [`DeviceState`] plus one
//! input (an edge, a timer expiry, a poll) and return the [`Effects`] the
//! application service must carry out.  They never touch hardware, so every
//! path is testable on the host.
//!
//! ```text
//!  Button
//!  ┌──────┐  falling edge, debounced   ┌─────────┐  hold timer, low at expiry  ┌───────────┐
//!  │ Idle │ ─────────────────────────▶ │ Pressed │ ──────────────────────────▶ │ Rebooting │
//!  └──────┘ ◀───────────────────────── └─────────┘                             └───────────┘
//!             rising edge: toggle polarity, persist, cancel hold timer
//!
//!  Advertising
//!  StartupFast ──[window elapsed]──▶ NormalSlow ──[NFC field lost / re-arm]──▶ StartupFast
//!
//!  Door
//!  switch edge (debounced) ─┐
//!                           ├──▶ recompute_door_state(level, polarity)
//!  periodic poll ───────────┘
//! ```

pub mod context;
pub mod states;

pub use context::{ButtonState, DeviceMode, DeviceState, DoorState, PinLevel, SwitchPolarity};

use crate::tasks::Task;

/// Visual feedback requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    /// Both LEDs on while the button is held.
    ButtonHeld,
    /// Both LEDs off.
    Clear,
    /// Red for open, green for closed.
    Door(DoorState),
}

/// A side effect the application service applies after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Arm (or re-arm) the single-shot reboot timer.
    StartRebootTimer(u32),
    CancelRebootTimer,
    Indicate(Indication),
    /// Defer follow-up work to the task queue.
    Post(Task),
    /// Switch the advertising cadence.
    SetAdvertising(DeviceMode),
    /// Door state changed.
    DoorChanged(DoorState),
    /// Switch polarity changed.
    PolarityChanged(SwitchPolarity),
    /// Reset the device now.
    Reset,
}

/// Effects produced by a single transition.
pub type Effects = heapless::Vec<Effect, 6>;

/// Append an effect.  Capacity covers the largest transition.
pub(crate) fn emit(effects: &mut Effects, effect: Effect) {
    if effects.push(effect).is_err() {
        debug_assert!(false, "effect list overflow: {effect:?}");
        log::error!("fsm: effect dropped: {:?}", effect);
    }
}
