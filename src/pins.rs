//! GPIO / peripheral pin assignments for the door tag board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// User inputs (active-low, internal pull-ups)
// ---------------------------------------------------------------------------

/// Momentary push-button.  LOW = pressed.
pub const BUTTON_GPIO: i32 = 0;

/// Reed switch contact.  Level meaning depends on the mounting polarity.
pub const SWITCH_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Accelerometer
// ---------------------------------------------------------------------------

/// Motion interrupt from the accelerometer.  Rising edge = motion.
pub const ACCEL_INT_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Indicator LEDs (active-low: sink current to light)
// ---------------------------------------------------------------------------

pub const LED_RED_GPIO: i32 = 17;
pub const LED_GREEN_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Battery sense (ADC1)
// ---------------------------------------------------------------------------

/// Battery divider midpoint.  ADC1 channel 0 (GPIO 1 on ESP32-S3).
pub const BATTERY_ADC_GPIO: i32 = 1;
/// ADC1 channel number for [`BATTERY_ADC_GPIO`].
pub const BATTERY_ADC_CHANNEL: u32 = 0;
