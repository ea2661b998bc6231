//! Hardware timers using ESP-IDF's esp_timer API.
//!
//! Two timers, both of which only post tasks from their callbacks:
//!
//! - **sample**: periodic, posts [`Task::Sample`](crate::tasks::Task::Sample)
//!   every `sample_interval_ms`.
//! - **reboot**: single-shot, posts
//!   [`Task::RebootTimerExpired`](crate::tasks::Task::RebootTimerExpired) with the
//!   button level read at expiry; armed by a long press or an NFC field.
//!
//! Callbacks execute in the ESP timer task context (not ISR), and only
//! touch the task queue.
//!
//! ```text
//! Backend    driven by                   used when
//! ─────────  ──────────────────────────  ─────────────────────────────
//! esp_timer  ESP timer task callbacks    target, timers created
//! software   HwTimers::tick (main loop)  host, or esp_timer init failed
//! ```

use crate::app::ports::TimerPort;
use crate::fsm::PinLevel;
use crate::tasks::TaskQueue;
use crate::timers::SoftTimers;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use crate::tasks::{Task, post_from_isr};

use crate::adapters::time::uptime_ms;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// esp_timer creation / start failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerError(pub i32);

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "esp_timer failed (rc={})", self.0)
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sample_tick_cb(_arg: *mut core::ffi::c_void) {
    post_from_isr(Task::Sample);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn reboot_expired_cb(_arg: *mut core::ffi::c_void) {
    post_from_isr(Task::RebootTimerExpired {
        button_level: PinLevel::from_high(hw_init::gpio_read(pins::BUTTON_GPIO)),
    });
}

#[cfg(target_os = "espidf")]
fn create_timer(
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    name: &'static [u8],
) -> Result<esp_timer_handle_t, TimerError> {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: true,
    };
    let mut handle: esp_timer_handle_t = core::ptr::null_mut();
    // SAFETY: args and name outlive the call; the handle is owned by HwTimers.
    let ret = unsafe { esp_timer_create(&args, &mut handle) };
    if ret != ESP_OK as i32 {
        return Err(TimerError(ret));
    }
    Ok(handle)
}

enum Backend {
    #[cfg(target_os = "espidf")]
    Esp {
        sample: esp_timer_handle_t,
        reboot: esp_timer_handle_t,
    },
    Soft(SoftTimers),
}

pub struct HwTimers {
    backend: Backend,
}

impl HwTimers {
    /// Create both timers and start the periodic sample tick.
    #[cfg(target_os = "espidf")]
    pub fn start(sample_interval_ms: u32) -> Result<Self, TimerError> {
        let sample = create_timer(sample_tick_cb, b"sample\0")?;
        let reboot = match create_timer(reboot_expired_cb, b"reboot\0") {
            Ok(h) => h,
            Err(e) => {
                // SAFETY: created above, never started.
                unsafe { esp_timer_delete(sample) };
                return Err(e);
            }
        };
        let timers = Self {
            backend: Backend::Esp { sample, reboot },
        };
        // SAFETY: handle freshly created above.
        let ret = unsafe { esp_timer_start_periodic(sample, u64::from(sample_interval_ms) * 1_000) };
        if ret != ESP_OK as i32 {
            log::error!("hw_timer: sample timer start failed (rc={})", ret);
            return Err(TimerError(ret));
        }
        info!("hw_timer: sample every {} ms", sample_interval_ms);
        Ok(timers)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(sample_interval_ms: u32) -> Result<Self, TimerError> {
        Ok(Self::software(sample_interval_ms, uptime_ms()))
    }

    /// Timers run from [`tick`](Self::tick) instead of esp_timer callbacks.
    pub fn software(sample_interval_ms: u32, now_ms: u32) -> Self {
        let mut soft = SoftTimers::new();
        soft.start_sample(sample_interval_ms, now_ms);
        info!("hw_timer(soft): sample every {} ms", sample_interval_ms);
        Self {
            backend: Backend::Soft(soft),
        }
    }

    /// Advance the software backend to `now_ms`, posting expired timers.
    /// The esp_timer backend posts from its own callbacks and ignores this.
    pub fn tick<const N: usize>(
        &mut self,
        now_ms: u32,
        button_level: impl FnOnce() -> PinLevel,
        tasks: &TaskQueue<N>,
    ) {
        match &mut self.backend {
            #[cfg(target_os = "espidf")]
            Backend::Esp { .. } => {}
            Backend::Soft(soft) => {
                soft.tick(now_ms, button_level, tasks);
            }
        }
    }
}

impl TimerPort for HwTimers {
    fn start_reboot_timer(&mut self, delay_ms: u32) {
        match &mut self.backend {
            #[cfg(target_os = "espidf")]
            Backend::Esp { reboot, .. } => {
                // SAFETY: the handle is valid for the life of HwTimers.
                // Stopping an idle timer returns ESP_ERR_INVALID_STATE, which
                // is fine.
                unsafe {
                    esp_timer_stop(*reboot);
                    let ret = esp_timer_start_once(*reboot, u64::from(delay_ms) * 1_000);
                    if ret != ESP_OK as i32 {
                        log::error!("hw_timer: reboot timer start failed (rc={})", ret);
                    }
                }
            }
            Backend::Soft(soft) => soft.start_reboot(delay_ms, uptime_ms()),
        }
    }

    fn cancel_reboot_timer(&mut self) {
        match &mut self.backend {
            // An already-expired single-shot timer is not running: no effect.
            #[cfg(target_os = "espidf")]
            Backend::Esp { reboot, .. } => unsafe {
                esp_timer_stop(*reboot);
            },
            Backend::Soft(soft) => {
                soft.cancel_reboot();
            }
        }
    }
}

#[cfg(target_os = "espidf")]
impl Drop for HwTimers {
    fn drop(&mut self) {
        if let Backend::Esp { sample, reboot } = self.backend {
            // SAFETY: handles were created in start() and are not used after.
            unsafe {
                esp_timer_stop(sample);
                esp_timer_stop(reboot);
                esp_timer_delete(sample);
                esp_timer_delete(reboot);
            }
        }
    }
}
