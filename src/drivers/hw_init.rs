//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the battery ADC channel, the on-die
//! temperature sensor and the GPIO interrupt service using raw ESP-IDF sys
//! calls.  Each step returns its own result so boot can record exactly
//! which part failed and carry on degraded.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    TempSensorFailed(i32),
    IsrInstallFailed(i32),
    IsrAddFailed { gpio: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc)    => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::TempSensorFailed(rc) => write!(f, "temperature sensor init failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrAddFailed { gpio, rc } => {
                write!(f, "GPIO{} ISR registration failed (rc={})", gpio, rc)
            }
        }
    }
}

// ── GPIO ──────────────────────────────────────────────────────

/// Inputs with pull-ups for the button, reed switch and accelerometer
/// interrupt; outputs for the LEDs, driven high (off, active-low).
#[cfg(target_os = "espidf")]
pub fn init_gpio() -> Result<(), HwInitError> {
    let inputs = [
        (pins::BUTTON_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE),
        (pins::SWITCH_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE),
        (pins::ACCEL_INT_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE),
    ];
    for (pin, intr_type) in inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type,
        };
        // SAFETY: called once from main() before the event loop.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    for pin in [pins::LED_RED_GPIO, pins::LED_GREEN_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, 1) };
    }

    info!("hw_init: GPIO configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_gpio() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): GPIO init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: inputs idle high (pulled up, nothing pressed).
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes an already-configured output pin.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: written once by `init_adc()` before the event loop; read only
/// from the main loop afterwards.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
pub fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe {
        adc_oneshot_config_channel(adc1_handle(), pins::BATTERY_ADC_CHANNEL, &chan_cfg)
    };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    info!("hw_init: ADC1 CH{} configured (battery)", pins::BATTERY_ADC_CHANNEL);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_adc() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ADC init skipped");
    Ok(())
}

/// Raw 12-bit sample of the battery divider.  `None` if the ADC is not up
/// or the conversion failed.
#[cfg(target_os = "espidf")]
pub fn battery_raw() -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; null until init_adc() succeeded.
    let handle = unsafe { adc1_handle() };
    if handle.is_null() {
        return None;
    }
    let ret = unsafe { adc_oneshot_read(handle, pins::BATTERY_ADC_CHANNEL, &mut raw) };
    (ret == ESP_OK as i32).then(|| raw.max(0) as u16)
}

/// Simulation: a fresh pair of AAA cells (~2.9 V through the divider).
#[cfg(not(target_os = "espidf"))]
pub fn battery_raw() -> Option<u16> {
    Some(1_900)
}

// ── On-die temperature sensor ─────────────────────────────────

#[cfg(target_os = "espidf")]
static mut TEMP_HANDLE: temperature_sensor_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
pub fn init_chip_temperature() -> Result<(), HwInitError> {
    let cfg = temperature_sensor_config_t {
        range_min: -10,
        range_max: 80,
        ..Default::default()
    };
    // SAFETY: TEMP_HANDLE is only written here, once at boot.
    let ret = unsafe { temperature_sensor_install(&cfg, &raw mut TEMP_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::TempSensorFailed(ret)); }
    let ret = unsafe { temperature_sensor_enable(TEMP_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::TempSensorFailed(ret)); }
    info!("hw_init: chip temperature sensor enabled");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_chip_temperature() -> Result<(), HwInitError> {
    Ok(())
}

/// Die temperature in quarter degrees Celsius.
#[cfg(target_os = "espidf")]
pub fn chip_temperature_quarter_deg() -> Option<i32> {
    // SAFETY: written once by init_chip_temperature(); main loop only.
    let handle = unsafe { TEMP_HANDLE };
    if handle.is_null() {
        return None;
    }
    let mut celsius: f32 = 0.0;
    let ret = unsafe { temperature_sensor_get_celsius(handle, &mut celsius) };
    (ret == ESP_OK as i32).then(|| (celsius * 4.0) as i32)
}

/// Simulation: a steady 22.25 °C.
#[cfg(not(target_os = "espidf"))]
pub fn chip_temperature_quarter_deg() -> Option<i32> {
    Some(89)
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn install_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means it was already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
        return Err(HwInitError::IsrInstallFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn install_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
fn attach_isr(
    gpio: i32,
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
) -> Result<(), HwInitError> {
    // SAFETY: handlers are static functions that only post to the task
    // queue; the pin was configured by init_gpio().
    let ret = unsafe { gpio_isr_handler_add(gpio, Some(handler), core::ptr::null_mut()) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::IsrAddFailed { gpio, rc: ret });
    }
    unsafe { gpio_intr_enable(gpio) };
    info!("hw_init: GPIO{} interrupt attached", gpio);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn attach_button_isr() -> Result<(), HwInitError> {
    attach_isr(pins::BUTTON_GPIO, super::pin_irq::button_gpio_isr)
}

#[cfg(target_os = "espidf")]
pub fn attach_switch_isr() -> Result<(), HwInitError> {
    attach_isr(pins::SWITCH_GPIO, super::pin_irq::switch_gpio_isr)
}

#[cfg(target_os = "espidf")]
pub fn attach_accel_isr() -> Result<(), HwInitError> {
    attach_isr(pins::ACCEL_INT_GPIO, super::pin_irq::accel_gpio_isr)
}

#[cfg(not(target_os = "espidf"))]
pub fn attach_button_isr() -> Result<(), HwInitError> {
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn attach_switch_isr() -> Result<(), HwInitError> {
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn attach_accel_isr() -> Result<(), HwInitError> {
    Ok(())
}
