//! Software timers driven by an explicit clock.
//!
//! The same two timers the firmware runs on `esp_timer`: a repeating
//! sample timer and the single-shot reboot timer.  [`SoftTimers::tick`]
//! is called with the current time and posts a task for every timer that
//! came due, exactly like the hardware callbacks do.  Host builds use this
//! as the timer backend; tests use it to step time deterministically.

use log::debug;

use crate::fsm::PinLevel;
use crate::tasks::{Task, TaskQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Periodic {
    period_ms: u32,
    last_fired_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OneShot {
    armed_at_ms: u32,
    delay_ms: u32,
}

/// Which timers fired during a [`SoftTimers::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fired {
    pub sample: bool,
    pub reboot: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SoftTimers {
    sample: Option<Periodic>,
    reboot: Option<OneShot>,
}

impl SoftTimers {
    pub const fn new() -> Self {
        Self {
            sample: None,
            reboot: None,
        }
    }

    /// Start the repeating sample timer; the first expiry is one period
    /// after `now_ms`.
    pub fn start_sample(&mut self, period_ms: u32, now_ms: u32) {
        self.sample = Some(Periodic {
            period_ms: period_ms.max(1),
            last_fired_ms: now_ms,
        });
    }

    /// Arm the reboot timer, replacing any pending countdown.
    pub fn start_reboot(&mut self, delay_ms: u32, now_ms: u32) {
        self.reboot = Some(OneShot {
            armed_at_ms: now_ms,
            delay_ms,
        });
    }

    /// Disarm the reboot timer.  Returns `false` if it was not armed,
    /// including when it already fired.
    pub fn cancel_reboot(&mut self) -> bool {
        self.reboot.take().is_some()
    }

    pub fn reboot_armed(&self) -> bool {
        self.reboot.is_some()
    }

    /// Advance to `now_ms`, posting a task for each expired timer.
    ///
    /// A late tick fires the sample timer once and re-aligns it to its
    /// period grid instead of posting a burst of catch-up samples.
    /// `button_level` is only read when the reboot timer expires.
    pub fn tick<const N: usize>(
        &mut self,
        now_ms: u32,
        button_level: impl FnOnce() -> PinLevel,
        tasks: &TaskQueue<N>,
    ) -> Fired {
        let mut fired = Fired::default();

        if let Some(p) = self.sample.as_mut() {
            let elapsed = now_ms.wrapping_sub(p.last_fired_ms);
            if elapsed >= p.period_ms {
                p.last_fired_ms = now_ms.wrapping_sub(elapsed % p.period_ms);
                fired.sample = true;
                if tasks.post(Task::Sample).is_err() {
                    debug!("timers: sample tick dropped, queue full");
                }
            }
        }

        if let Some(r) = self.reboot {
            if now_ms.wrapping_sub(r.armed_at_ms) >= r.delay_ms {
                self.reboot = None;
                fired.reboot = true;
                let expired = Task::RebootTimerExpired {
                    button_level: button_level(),
                };
                if tasks.post(expired).is_err() {
                    debug!("timers: reboot expiry dropped, queue full");
                }
            }
        }

        fired
    }
}
