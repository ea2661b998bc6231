//! Red / green indicator LEDs.
//!
//! Two discrete LEDs wired active-low (the GPIO sinks current to light
//! them).  [`StatusLeds`] is generic over `embedded_hal` output pins so the
//! same driver runs on raw ESP-IDF GPIOs and on host mocks.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`GpioOut`] drives the pin through `hw_init::gpio_write`.
//! On host/test: `gpio_write` is a no-op and the driver tracks state
//! in-memory only.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::app::ports::IndicatorPort;
use crate::drivers::hw_init;

/// Push-pull output on a GPIO configured by `hw_init::init_gpio`.
pub struct GpioOut {
    gpio: i32,
}

impl GpioOut {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ErrorType for GpioOut {
    type Error = Infallible;
}

impl OutputPin for GpioOut {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true);
        Ok(())
    }
}

pub struct StatusLeds<R, G> {
    red: R,
    green: G,
    current: (bool, bool),
}

impl<R: OutputPin, G: OutputPin> StatusLeds<R, G> {
    /// Take the pins and switch both LEDs off.
    pub fn new(red: R, green: G) -> Self {
        let mut leds = Self {
            red,
            green,
            current: (false, false),
        };
        leds.set_red(false);
        leds.set_green(false);
        leds
    }

    /// `(red, green)` as last commanded.
    pub fn current(&self) -> (bool, bool) {
        self.current
    }

    fn drive<P: OutputPin>(pin: &mut P, on: bool) {
        // Active-low: low lights the LED.
        let result = if on { pin.set_low() } else { pin.set_high() };
        if result.is_err() {
            log::warn!("indicator: pin write failed");
        }
    }
}

impl<R: OutputPin, G: OutputPin> IndicatorPort for StatusLeds<R, G> {
    fn set_red(&mut self, on: bool) {
        Self::drive(&mut self.red, on);
        self.current.0 = on;
    }

    fn set_green(&mut self, on: bool) {
        Self::drive(&mut self.green, on);
        self.current.1 = on;
    }
}
