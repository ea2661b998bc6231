//! Beacon configuration parameters
//!
//! All tunable timings and radio settings for the door tag.  `Default`
//! holds the build-time values; a config is validated once at boot before
//! anything uses it.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::FrameLayout;

/// Core beacon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    // --- Debounce / polling ---
    /// Minimum spacing between accepted button or switch edges (ms)
    pub debounce_ms: u32,
    /// Fallback reed switch poll interval (ms)
    pub switch_poll_interval_ms: u32,
    /// Minimum spacing between battery measurements (ms)
    pub battery_recheck_interval_ms: u32,

    // --- Reboot paths ---
    /// Button hold time that reboots the tag (ms)
    pub button_hold_reboot_ms: u32,
    /// Delay from NFC field detection to reset (ms)
    pub nfc_field_loss_reset_delay_ms: u32,
    /// Task watchdog reload (ms); long enough for a firmware update to finish
    pub watchdog_reload_ms: u32,

    // --- Advertising ---
    /// How long fast advertising lasts after the first sample (ms)
    pub startup_fast_window_ms: u32,
    /// Advertising interval while in startup-fast mode (ms)
    pub fast_advertising_interval_ms: u32,
    /// Advertising interval in normal mode (ms)
    pub slow_advertising_interval_ms: u32,
    /// Radio transmit power (dBm)
    pub tx_power_dbm: i8,
    /// Frame layout to broadcast
    pub frame_format: FrameLayout,
    /// Re-open the fast window on button release and NFC field loss
    pub rearm_fast_on_release: bool,

    // --- Sampling ---
    /// Sensor sample / frame update period (ms)
    pub sample_interval_ms: u32,

    // --- Storage ---
    /// Compact flash when free space drops below this (bytes)
    pub flash_compaction_threshold_bytes: u32,

    // --- Power ---
    /// Boot-time battery voltage below which a failure is flagged (mV)
    pub battery_min_mv: u16,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            switch_poll_interval_ms: 10_000,
            battery_recheck_interval_ms: 10_000,

            button_hold_reboot_ms: 3_000,
            nfc_field_loss_reset_delay_ms: 10_000,
            watchdog_reload_ms: 360_000, // 6 min

            startup_fast_window_ms: 30_000,
            fast_advertising_interval_ms: 211,
            slow_advertising_interval_ms: 1_285,
            tx_power_dbm: 4,
            frame_format: FrameLayout::ExtendedWithSwitch,
            rearm_fast_on_release: false,

            sample_interval_ms: 1_000, // 1 Hz

            flash_compaction_threshold_bytes: 4_000,

            battery_min_mv: 2_000,
        }
    }
}

/// A configuration field is out of range.  The message names the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigError(pub &'static str);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config: {}", self.0)
    }
}

impl core::error::Error for ConfigError {}

/// BLE advertising intervals must sit between 20 ms and 10.24 s.
const ADV_INTERVAL_RANGE_MS: core::ops::RangeInclusive<u32> = 20..=10_240;

impl BeaconConfig {
    /// Reject values that cannot work together.  Never clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError("debounce_ms must be > 0"));
        }
        if self.debounce_ms >= self.button_hold_reboot_ms {
            return Err(ConfigError("debounce_ms must be < button_hold_reboot_ms"));
        }
        if self.switch_poll_interval_ms == 0 {
            return Err(ConfigError("switch_poll_interval_ms must be > 0"));
        }
        if self.battery_recheck_interval_ms == 0 {
            return Err(ConfigError("battery_recheck_interval_ms must be > 0"));
        }
        if self.nfc_field_loss_reset_delay_ms == 0 {
            return Err(ConfigError("nfc_field_loss_reset_delay_ms must be > 0"));
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError("sample_interval_ms must be > 0"));
        }
        if self.watchdog_reload_ms <= self.sample_interval_ms {
            return Err(ConfigError("watchdog_reload_ms must exceed sample_interval_ms"));
        }
        if !ADV_INTERVAL_RANGE_MS.contains(&self.fast_advertising_interval_ms) {
            return Err(ConfigError("fast_advertising_interval_ms must be 20–10240"));
        }
        if !ADV_INTERVAL_RANGE_MS.contains(&self.slow_advertising_interval_ms) {
            return Err(ConfigError("slow_advertising_interval_ms must be 20–10240"));
        }
        if !(-40..=20).contains(&self.tx_power_dbm) {
            return Err(ConfigError("tx_power_dbm must be -40–20"));
        }
        Ok(())
    }

    /// Advertising interval for the given mode.
    pub fn advertising_interval_ms(&self, mode: crate::fsm::DeviceMode) -> u32 {
        match mode {
            crate::fsm::DeviceMode::StartupFast => self.fast_advertising_interval_ms,
            crate::fsm::DeviceMode::NormalSlow => self.slow_advertising_interval_ms,
        }
    }
}
