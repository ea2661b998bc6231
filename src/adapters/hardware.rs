//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the sensor drivers, the indicator LEDs, the BLE broadcaster and the
//! hardware timers, exposing them through every port the
//! [`Beacon`](crate::app::service::Beacon) needs.  This is the only module
//! in the system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use log::{info, warn};

use crate::app::ports::{
    BroadcastPort, IndicatorPort, NfcPort, PinPort, SensorPort, SystemPort, TimerPort,
};
use crate::drivers::hw_init;
use crate::drivers::hw_timer::HwTimers;
use crate::drivers::indicator::{GpioOut, StatusLeds};
use crate::error::SensorError;
use crate::frame::Frame;
use crate::fsm::PinLevel;
use crate::pins;
use crate::sensors::battery::AdcScale;
use crate::sensors::{Acceleration, Accelerometer, Environment, EnvironmentSensor};
use crate::tasks::TaskQueue;

use super::radio::BleBroadcaster;

/// Longest status text kept for the NFC record.
const NFC_TEXT_CAP: usize = 32;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<E, A> {
    environment: E,
    accelerometer: A,
    leds: StatusLeds<GpioOut, GpioOut>,
    radio: BleBroadcaster,
    timers: HwTimers,
    battery_scale: AdcScale,
    last_battery_mv: u16,
    nfc_text: heapless::String<NFC_TEXT_CAP>,
}

impl<E: EnvironmentSensor, A: Accelerometer> HardwareAdapter<E, A> {
    pub fn new(
        environment: E,
        accelerometer: A,
        radio: BleBroadcaster,
        timers: HwTimers,
    ) -> Self {
        Self {
            environment,
            accelerometer,
            leds: StatusLeds::new(
                GpioOut::new(pins::LED_RED_GPIO),
                GpioOut::new(pins::LED_GREEN_GPIO),
            ),
            radio,
            timers,
            battery_scale: AdcScale::DIVIDER_HALF_12BIT,
            last_battery_mv: 0,
            nfc_text: heapless::String::new(),
        }
    }

    /// Text most recently written to the NFC status record.
    pub fn nfc_text(&self) -> &str {
        &self.nfc_text
    }

    /// Advance software-backed timers from the main loop.
    pub fn tick_timers<const N: usize>(&mut self, now_ms: u32, tasks: &TaskQueue<N>) {
        self.timers.tick(
            now_ms,
            || PinLevel::from_high(hw_init::gpio_read(pins::BUTTON_GPIO)),
            tasks,
        );
    }

    pub fn radio(&self) -> &BleBroadcaster {
        &self.radio
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<E: EnvironmentSensor, A: Accelerometer> SensorPort for HardwareAdapter<E, A> {
    fn read_environment(&mut self) -> Result<Environment, SensorError> {
        self.environment.read()
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        self.accelerometer.read()
    }

    fn read_chip_temperature(&mut self) -> Option<i32> {
        hw_init::chip_temperature_quarter_deg()
    }

    fn measure_battery_mv(&mut self) -> u16 {
        match hw_init::battery_raw() {
            Some(raw) => {
                self.last_battery_mv = self.battery_scale.millivolts(raw);
            }
            None => warn!("battery: ADC read failed, keeping {} mV", self.last_battery_mv),
        }
        self.last_battery_mv
    }
}

// ── PinPort implementation ────────────────────────────────────

impl<E, A> PinPort for HardwareAdapter<E, A> {
    fn button_level(&mut self) -> PinLevel {
        PinLevel::from_high(hw_init::gpio_read(pins::BUTTON_GPIO))
    }

    fn switch_level(&mut self) -> PinLevel {
        PinLevel::from_high(hw_init::gpio_read(pins::SWITCH_GPIO))
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<E, A> IndicatorPort for HardwareAdapter<E, A> {
    fn set_red(&mut self, on: bool) {
        self.leds.set_red(on);
    }

    fn set_green(&mut self, on: bool) {
        self.leds.set_green(on);
    }
}

// ── BroadcastPort implementation ──────────────────────────────

impl<E, A> BroadcastPort for HardwareAdapter<E, A> {
    fn set_payload(&mut self, frame: &Frame) {
        self.radio.set_payload(frame);
    }

    fn set_advertising_interval(&mut self, interval_ms: u32) {
        self.radio.set_advertising_interval(interval_ms);
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        self.radio.mac_address()
    }
}

// ── NfcPort implementation ────────────────────────────────────

/// This board carries no NFC front end: the status text is kept and
/// logged so it still shows up on the console.
impl<E, A> NfcPort for HardwareAdapter<E, A> {
    fn set_status_text(&mut self, text: &str) {
        self.nfc_text.clear();
        for c in text.chars() {
            if self.nfc_text.push(c).is_err() {
                break;
            }
        }
        info!("NFC status: {}", self.nfc_text);
    }

    fn reinit(&mut self) {
        info!("NFC: re-initialised (status '{}')", self.nfc_text);
    }
}

// ── TimerPort implementation ──────────────────────────────────

impl<E, A> TimerPort for HardwareAdapter<E, A> {
    fn start_reboot_timer(&mut self, delay_ms: u32) {
        self.timers.start_reboot_timer(delay_ms);
    }

    fn cancel_reboot_timer(&mut self) {
        self.timers.cancel_reboot_timer();
    }
}

// ── SystemPort implementation ─────────────────────────────────

impl<E, A> SystemPort for HardwareAdapter<E, A> {
    #[cfg(target_os = "espidf")]
    fn reset(&mut self) {
        warn!("System reset");
        // SAFETY: esp_restart never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn reset(&mut self) {
        warn!("System reset requested (sim: ignored)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Absent;

    fn adapter() -> HardwareAdapter<Absent, Absent> {
        HardwareAdapter::new(
            Absent,
            Absent,
            BleBroadcaster::new(4, 211).unwrap(),
            HwTimers::software(1_000, 0),
        )
    }

    #[test]
    fn absent_sensors_report_not_fitted() {
        let mut hw = adapter();
        assert_eq!(hw.read_environment(), Err(SensorError::NotFitted));
        assert_eq!(hw.read_acceleration(), Err(SensorError::NotFitted));
        assert!(hw.read_chip_temperature().is_some());
    }

    #[test]
    fn sim_battery_goes_through_divider_scale() {
        let mut hw = adapter();
        assert_eq!(hw.measure_battery_mv(), 2_875);
    }

    #[test]
    fn sim_inputs_idle_high() {
        let mut hw = adapter();
        assert_eq!(hw.button_level(), PinLevel::High);
        assert_eq!(hw.switch_level(), PinLevel::High);
    }

    #[test]
    fn software_timers_post_from_the_main_loop() {
        let q: TaskQueue<4> = TaskQueue::new();
        let mut hw = adapter();
        hw.tick_timers(1_000, &q);
        let mut got = None;
        q.drain_one(|t| got = Some(t));
        assert_eq!(got, Some(crate::tasks::Task::Sample));
    }

    #[test]
    fn nfc_text_is_truncated_to_capacity() {
        let mut hw = adapter();
        hw.set_status_text("Error: 3FF");
        assert_eq!(hw.nfc_text(), "Error: 3FF");
        hw.set_status_text(&"x".repeat(40));
        assert_eq!(hw.nfc_text().len(), NFC_TEXT_CAP);
    }
}
