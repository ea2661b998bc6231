//! GPIO interrupt handlers.
//!
//! Each handler samples the pin level and the clock, wraps them in a
//! [`Task`] and posts it.  Nothing else happens in interrupt context:
//! debounce, door recompute and LED feedback all run later on the main
//! loop.
//!
//! | Pin              | Edge     | Task                      |
//! |------------------|----------|---------------------------|
//! | `BUTTON_GPIO`    | any      | `ButtonEdge { level, at }`|
//! | `SWITCH_GPIO`    | any      | `SwitchEdge { level, at }`|
//! | `ACCEL_INT_GPIO` | rising   | `AccelerationEvent`       |

use crate::fsm::PinLevel;
use crate::tasks::Task;

#[cfg(target_os = "espidf")]
use crate::{adapters::time::uptime_ms, pins, tasks::post_from_isr};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::gpio_get_level;

// ── Task builders (shared with host tests) ────────────────────

pub fn button_edge(high: bool, at_ms: u32) -> Task {
    Task::ButtonEdge {
        level: PinLevel::from_high(high),
        at_ms,
    }
}

pub fn switch_edge(high: bool, at_ms: u32) -> Task {
    Task::SwitchEdge {
        level: PinLevel::from_high(high),
        at_ms,
    }
}

pub fn nfc_field(present: bool) -> Task {
    Task::NfcField { present }
}

// ── ISR entry points ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub(crate) unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: gpio_get_level and esp_timer_get_time are register reads;
    // safe in ISR context.
    let high = unsafe { gpio_get_level(pins::BUTTON_GPIO) } != 0;
    post_from_isr(button_edge(high, uptime_ms()));
}

#[cfg(target_os = "espidf")]
pub(crate) unsafe extern "C" fn switch_gpio_isr(_arg: *mut core::ffi::c_void) {
    let high = unsafe { gpio_get_level(pins::SWITCH_GPIO) } != 0;
    post_from_isr(switch_edge(high, uptime_ms()));
}

#[cfg(target_os = "espidf")]
pub(crate) unsafe extern "C" fn accel_gpio_isr(_arg: *mut core::ffi::c_void) {
    post_from_isr(Task::AccelerationEvent);
}

/// Entry point for an NFC driver's field-detect callback.
#[cfg(target_os = "espidf")]
pub fn nfc_field_isr(present: bool) {
    post_from_isr(nfc_field(present));
}
