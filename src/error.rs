//! Error and degraded-mode types shared across the firmware.
//!
//! Initialisation problems are never fatal.  Each failing subsystem sets a
//! bit in [`InitStatus`]; the beacon keeps running with whatever still
//! works and reports the accumulated mask once at boot.  Runtime sensor
//! failures surface as [`SensorError`] and turn into sentinel fields.

use core::fmt;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The board does not carry this part, or it never answered at boot.
    NotFitted,
    /// Bus transaction failed.
    BusFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFitted => write!(f, "sensor not fitted"),
            Self::BusFailed => write!(f, "bus transaction failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialisation failures
// ---------------------------------------------------------------------------

/// One subsystem that failed to come up at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InitFailure {
    Storage = 0x0001,
    Accelerometer = 0x0002,
    EnvironmentSensor = 0x0004,
    Nfc = 0x0008,
    Radio = 0x0010,
    Timer = 0x0020,
    ButtonInterrupt = 0x0040,
    SwitchInterrupt = 0x0080,
    AccelerometerInterrupt = 0x0100,
    BatteryLow = 0x0200,
}

impl InitFailure {
    pub const ALL: [Self; 10] = [
        Self::Storage,
        Self::Accelerometer,
        Self::EnvironmentSensor,
        Self::Nfc,
        Self::Radio,
        Self::Timer,
        Self::ButtonInterrupt,
        Self::SwitchInterrupt,
        Self::AccelerometerInterrupt,
        Self::BatteryLow,
    ];

    /// Return the bitmask for this failure.
    pub const fn mask(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Accelerometer => write!(f, "accelerometer"),
            Self::EnvironmentSensor => write!(f, "environment sensor"),
            Self::Nfc => write!(f, "NFC"),
            Self::Radio => write!(f, "radio"),
            Self::Timer => write!(f, "timer"),
            Self::ButtonInterrupt => write!(f, "button interrupt"),
            Self::SwitchInterrupt => write!(f, "switch interrupt"),
            Self::AccelerometerInterrupt => write!(f, "accelerometer interrupt"),
            Self::BatteryLow => write!(f, "battery low"),
        }
    }
}

/// Accumulated boot failures.  Zero means a clean start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitStatus(u16);

impl InitStatus {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn record(&mut self, failure: InitFailure) {
        self.0 |= failure.mask();
    }

    /// Record `failure` if `result` is an error, passing the result through.
    pub fn check<T, E: fmt::Display>(
        &mut self,
        failure: InitFailure,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("init: {} failed ({})", failure, e);
                self.record(failure);
                None
            }
        }
    }

    pub fn has(&self, failure: InitFailure) -> bool {
        self.0 & failure.mask() != 0
    }

    pub fn is_clean(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Iterate over the recorded failures in bit order.
    pub fn failures(&self) -> impl Iterator<Item = InitFailure> + '_ {
        InitFailure::ALL.into_iter().filter(|f| self.has(*f))
    }
}

impl fmt::UpperHex for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}
