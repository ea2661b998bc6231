//! Transition functions.
//!
//! Each function takes the current [`DeviceState`], applies one input and
//! returns the [`Effects`] to carry out.  Timestamps are milliseconds since
//! boot, compared with wrapping arithmetic so the ~49-day roll-over of a
//! `u32` clock does not wedge the debounce logic.

use log::{debug, info};

use super::context::{ButtonState, DeviceMode, DeviceState, DoorState, PinLevel, SwitchPolarity};
use super::{Effect, Effects, Indication, emit};
use crate::config::BeaconConfig;
use crate::tasks::Task;

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

/// `true` if an edge at `now_ms` is far enough from the previous edge.
/// The very first edge is always accepted.
pub fn debounced(last_edge_ms: Option<u32>, now_ms: u32, interval_ms: u32) -> bool {
    last_edge_ms.is_none_or(|last| now_ms.wrapping_sub(last) >= interval_ms)
}

/// Map the reed switch level and mounting polarity to a door state.
///
/// A normally-open contact reads `High` (pulled up) when the magnet is
/// away, i.e. the door is open; a normally-closed contact is the inverse.
pub fn recompute_door_state(level: PinLevel, polarity: SwitchPolarity) -> DoorState {
    let high = level == PinLevel::High;
    let normally_closed = polarity == SwitchPolarity::NormallyClosed;
    if high ^ normally_closed {
        DoorState::Open
    } else {
        DoorState::Closed
    }
}

/// Re-derive the door state from a fresh switch level, emitting a change
/// only when the result differs from the stored state.  The LEDs follow on
/// the next sample.
pub fn refresh_door(state: &mut DeviceState, level: PinLevel) -> Effects {
    let mut effects = Effects::new();
    let door = recompute_door_state(level, state.polarity);
    if door != state.door {
        info!("Door {:?} -> {:?}", state.door, door);
        state.door = door;
        emit(&mut effects, Effect::DoorChanged(door));
    }
    effects
}

// ═══════════════════════════════════════════════════════════════════════════
//  Button
// ═══════════════════════════════════════════════════════════════════════════

/// Handle one button edge.
///
/// The button is active-low: `Low` is a press, `High` a release.  Every
/// edge moves the debounce timestamp, including rejected ones, so a burst
/// of contact bounce can never add up to an accepted press.
pub fn on_button_edge(
    state: &mut DeviceState,
    level: PinLevel,
    now_ms: u32,
    cfg: &BeaconConfig,
) -> Effects {
    let mut effects = Effects::new();
    let accepted = debounced(state.last_button_edge_ms, now_ms, cfg.debounce_ms);
    state.last_button_edge_ms = Some(now_ms);

    if !accepted {
        debug!("Button edge {:?} at {} ms rejected (bounce)", level, now_ms);
        return effects;
    }

    match (level, state.button) {
        (PinLevel::Low, ButtonState::Idle) => {
            info!("Button pressed");
            state.button = ButtonState::Pressed;
            emit(&mut effects, Effect::StartRebootTimer(cfg.button_hold_reboot_ms));
            emit(&mut effects, Effect::Indicate(Indication::ButtonHeld));
        }
        (PinLevel::High, ButtonState::Pressed) => {
            state.button = ButtonState::Idle;
            state.polarity = state.polarity.toggled();
            info!("Button released, polarity now {:?}", state.polarity);
            emit(&mut effects, Effect::CancelRebootTimer);
            emit(&mut effects, Effect::Indicate(Indication::Clear));
            emit(&mut effects, Effect::PolarityChanged(state.polarity));
            emit(&mut effects, Effect::Post(Task::PersistPolarity));
            if cfg.rearm_fast_on_release {
                emit(&mut effects, Effect::Post(Task::EnterFastAdvertising));
            }
        }
        _ => {}
    }
    effects
}

/// The single-shot reboot timer expired.
///
/// `button_level` is the level read when the timer fired, not when the
/// task runs, so a release queued behind the expiry cannot cancel it.
/// Resets unless the button was already up at expiry without the release
/// edge being seen.  An expiry while the button is idle comes from the NFC
/// countdown and always resets.
pub fn on_reboot_timer(state: &mut DeviceState, button_level: PinLevel) -> Effects {
    let mut effects = Effects::new();
    match (state.button, button_level) {
        (ButtonState::Rebooting, _) => {}
        (ButtonState::Pressed, PinLevel::High) => {
            info!("Reboot timer expired after release, ignoring");
            state.button = ButtonState::Idle;
        }
        _ => {
            state.button = ButtonState::Rebooting;
            emit(&mut effects, Effect::Reset);
        }
    }
    effects
}

// ═══════════════════════════════════════════════════════════════════════════
//  Reed switch
// ═══════════════════════════════════════════════════════════════════════════

/// Handle a reed switch edge.  The timestamps move on every edge.
pub fn on_switch_edge(
    state: &mut DeviceState,
    level: PinLevel,
    now_ms: u32,
    cfg: &BeaconConfig,
) -> Effects {
    let accepted = debounced(state.last_switch_edge_ms, now_ms, cfg.debounce_ms);
    state.last_switch_edge_ms = Some(now_ms);
    state.last_switch_check_ms = now_ms;
    if accepted {
        refresh_door(state, level)
    } else {
        debug!("Switch edge at {} ms rejected (bounce)", now_ms);
        Effects::new()
    }
}

/// Periodic fallback against missed switch edges.
pub fn poll_switch(
    state: &mut DeviceState,
    level: PinLevel,
    now_ms: u32,
    cfg: &BeaconConfig,
) -> Effects {
    if now_ms.wrapping_sub(state.last_switch_check_ms) < cfg.switch_poll_interval_ms {
        return Effects::new();
    }
    state.last_switch_check_ms = now_ms;
    refresh_door(state, level)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Advertising mode
// ═══════════════════════════════════════════════════════════════════════════

/// Called on every sample.  The first call opens the fast window; once it
/// has elapsed the beacon drops to the slow interval.
pub fn update_advertising_mode(state: &mut DeviceState, now_ms: u32, cfg: &BeaconConfig) -> Effects {
    let mut effects = Effects::new();
    match state.fast_since_ms {
        None => state.fast_since_ms = Some(now_ms),
        Some(since)
            if state.mode == DeviceMode::StartupFast
                && now_ms.wrapping_sub(since) >= cfg.startup_fast_window_ms =>
        {
            info!("Fast advertising window over, switching to slow");
            state.mode = DeviceMode::NormalSlow;
            emit(&mut effects, Effect::SetAdvertising(DeviceMode::NormalSlow));
        }
        Some(_) => {}
    }
    effects
}

/// Re-open the fast advertising window.
pub fn enter_fast_advertising(state: &mut DeviceState, now_ms: u32) -> Effects {
    let mut effects = Effects::new();
    state.mode = DeviceMode::StartupFast;
    state.fast_since_ms = Some(now_ms);
    emit(&mut effects, Effect::SetAdvertising(DeviceMode::StartupFast));
    effects
}

// ═══════════════════════════════════════════════════════════════════════════
//  Motion / NFC
// ═══════════════════════════════════════════════════════════════════════════

pub fn on_acceleration_event(state: &mut DeviceState) {
    state.acceleration_events = state.acceleration_events.wrapping_add(1);
}

/// NFC reader field appeared or vanished.
///
/// Field on arms the reboot countdown (the tag can hang after a read).
/// Field off re-initialises the tag content and optionally re-arms fast
/// advertising so a phone that just tapped can find the beacon.
pub fn on_nfc_field(present: bool, cfg: &BeaconConfig) -> Effects {
    let mut effects = Effects::new();
    if present {
        info!("NFC field detected");
        emit(
            &mut effects,
            Effect::StartRebootTimer(cfg.nfc_field_loss_reset_delay_ms),
        );
    } else {
        info!("NFC field lost");
        emit(&mut effects, Effect::Post(Task::ReinitNfc));
        if cfg.rearm_fast_on_release {
            emit(&mut effects, Effect::Post(Task::EnterFastAdvertising));
        }
    }
    effects
}
