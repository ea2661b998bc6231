//! Battery voltage: ADC conversion and the radio-gated measurement cache.
//!
//! Measuring the supply while the radio transmits reads low, so the beacon
//! only samples the battery after a radio-idle notification, and at most
//! once per recheck interval.  Every frame in between reuses the cached
//! value.

/// Linear ADC → millivolt conversion with a fixed pre-scaler and the
/// forward drop of the reverse-protection diode in series with the supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcScale {
    /// ADC full-scale reference (mV).
    pub reference_mv: u32,
    /// Counts at full scale (1024 for 10-bit, 4096 for 12-bit).
    pub full_scale: u32,
    /// Input pre-scaling compensation factor.
    pub prescale: u32,
    /// Diode forward drop added back (mV).
    pub diode_drop_mv: u16,
}

impl AdcScale {
    /// 12-bit oneshot ADC at 12 dB attenuation behind a 1:2 resistor divider.
    pub const DIVIDER_HALF_12BIT: Self = Self {
        reference_mv: 3100,
        full_scale: 4096,
        prescale: 2,
        diode_drop_mv: 1,
    };

    /// Convert a raw sample.  Integer-only; the division happens before the
    /// pre-scaler multiply, matching the fixed-point order of the reference
    /// conversion.
    pub fn millivolts(&self, raw: u16) -> u16 {
        let mv = u32::from(raw) * self.reference_mv / self.full_scale * self.prescale
            + u32::from(self.diode_drop_mv);
        mv.min(u32::from(u16::MAX)) as u16
    }
}

/// Last known battery voltage and when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryCache {
    millivolts: u16,
    measured_at_ms: Option<u32>,
}

impl BatteryCache {
    /// Cache seeded with the boot-time measurement.
    pub const fn new(millivolts: u16) -> Self {
        Self {
            millivolts,
            measured_at_ms: None,
        }
    }

    pub fn millivolts(&self) -> u16 {
        self.millivolts
    }

    /// `true` if a radio-idle notification at `now_ms` should trigger a
    /// fresh measurement.
    pub fn is_due(&self, now_ms: u32, recheck_interval_ms: u32) -> bool {
        self.measured_at_ms
            .is_none_or(|at| now_ms.wrapping_sub(at) >= recheck_interval_ms)
    }

    pub fn update(&mut self, millivolts: u16, now_ms: u32) {
        self.millivolts = millivolts;
        self.measured_at_ms = Some(now_ms);
    }
}
