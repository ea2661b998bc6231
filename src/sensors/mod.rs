//! Sensor reading model and the driver seams the beacon samples through.
//!
//! Every field of a [`SensorReading`] starts at its "unavailable" sentinel
//! and is overwritten only when the matching sensor actually produced a
//! value.  The frame encoder relies on this: it never guesses whether a
//! sensor is fitted, it only looks at the sentinels.
//!
//! ```text
//!  EnvironmentSensor ──▶ temperature / humidity / pressure ─┐
//!  Accelerometer     ──▶ acceleration x / y / z ────────────┼──▶ SensorReading
//!  battery cache     ──▶ battery_mv ────────────────────────┘
//! ```
//!
//! Bus-level drivers live outside this crate; they plug in by implementing
//! [`EnvironmentSensor`] or [`Accelerometer`].  Boards without a given part
//! use [`Absent`].

pub mod battery;

use crate::error::SensorError;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Temperature not available (1/100 °C units).
pub const TEMPERATURE_INVALID: i32 = -0x8000;
/// Humidity not available (1/1024 % units).
pub const HUMIDITY_INVALID: u32 = 0xFFFF;
/// Pressure not available (Pa/256 units).
pub const PRESSURE_INVALID: u32 = 0xFFFF;
/// Acceleration axis not available (mg).
pub const ACCELERATION_INVALID: i16 = i16::MIN;

// ---------------------------------------------------------------------------
// Reading model
// ---------------------------------------------------------------------------

/// One sampling pass worth of sensor data, in the units the encoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    /// 1/100 °C.
    pub temperature: i32,
    /// 1/1024 % relative humidity.
    pub humidity: u32,
    /// Pa × 256 (Q24.8 pascals).
    pub pressure: u32,
    /// mg.
    pub acceleration_x: i16,
    pub acceleration_y: i16,
    pub acceleration_z: i16,
    pub battery_mv: u16,
}

impl SensorReading {
    /// A reading with every sensor field at its sentinel.
    pub const fn unavailable(battery_mv: u16) -> Self {
        Self {
            temperature: TEMPERATURE_INVALID,
            humidity: HUMIDITY_INVALID,
            pressure: PRESSURE_INVALID,
            acceleration_x: ACCELERATION_INVALID,
            acceleration_y: ACCELERATION_INVALID,
            acceleration_z: ACCELERATION_INVALID,
            battery_mv,
        }
    }

    pub fn has_temperature(&self) -> bool {
        self.temperature != TEMPERATURE_INVALID
    }

    pub fn has_humidity(&self) -> bool {
        self.humidity != HUMIDITY_INVALID
    }

    pub fn has_pressure(&self) -> bool {
        self.pressure != PRESSURE_INVALID
    }

    /// Overwrite the environmental fields from a successful read.
    pub fn apply_environment(&mut self, env: Environment) {
        self.temperature = env.temperature;
        self.humidity = env.humidity;
        self.pressure = env.pressure;
    }

    /// Overwrite the acceleration fields from a successful read.
    pub fn apply_acceleration(&mut self, acc: Acceleration) {
        self.acceleration_x = acc.x;
        self.acceleration_y = acc.y;
        self.acceleration_z = acc.z;
    }

    /// Fall back to the SoC die temperature (quarter degrees) when no
    /// environmental sensor answered.
    pub fn apply_chip_temperature(&mut self, quarter_degrees: i32) {
        self.temperature = quarter_degrees.saturating_mul(25);
    }
}

/// Output of an environmental (temperature / humidity / pressure) sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// 1/100 °C.
    pub temperature: i32,
    /// 1/1024 %.
    pub humidity: u32,
    /// Pa × 256.
    pub pressure: u32,
}

/// Output of a 3-axis accelerometer, in mg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acceleration {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

// ---------------------------------------------------------------------------
// Driver seams
// ---------------------------------------------------------------------------

/// Combined temperature / humidity / pressure sensor.
pub trait EnvironmentSensor {
    /// Probe and configure the part.  Called once at boot.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Take one measurement.
    fn read(&mut self) -> Result<Environment, SensorError>;
}

/// Accelerometer with a motion interrupt line.
pub trait Accelerometer {
    /// Probe the part and arm its motion interrupt.  Called once at boot.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Read the latest sample.
    fn read(&mut self) -> Result<Acceleration, SensorError>;
}

/// Placeholder for a part the board does not carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl EnvironmentSensor for Absent {
    fn init(&mut self) -> Result<(), SensorError> {
        Err(SensorError::NotFitted)
    }

    fn read(&mut self) -> Result<Environment, SensorError> {
        Err(SensorError::NotFitted)
    }
}

impl Accelerometer for Absent {
    fn init(&mut self) -> Result<(), SensorError> {
        Err(SensorError::NotFitted)
    }

    fn read(&mut self) -> Result<Acceleration, SensorError> {
        Err(SensorError::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_reading_has_every_sentinel() {
        let r = SensorReading::unavailable(2980);
        assert!(!r.has_temperature());
        assert!(!r.has_humidity());
        assert!(!r.has_pressure());
        assert_eq!(r.acceleration_x, ACCELERATION_INVALID);
        assert_eq!(r.acceleration_y, ACCELERATION_INVALID);
        assert_eq!(r.acceleration_z, ACCELERATION_INVALID);
        assert_eq!(r.battery_mv, 2980);
    }

    #[test]
    fn chip_temperature_is_scaled_from_quarter_degrees() {
        let mut r = SensorReading::unavailable(3000);
        r.apply_chip_temperature(86); // 21.5 °C
        assert_eq!(r.temperature, 2150);
        assert!(!r.has_humidity(), "fallback must only touch temperature");
    }

    #[test]
    fn absent_part_reports_not_fitted() {
        let mut env = Absent;
        assert_eq!(EnvironmentSensor::init(&mut env), Err(SensorError::NotFitted));
        let mut acc = Absent;
        assert_eq!(Accelerometer::read(&mut acc), Err(SensorError::NotFitted));
    }
}
