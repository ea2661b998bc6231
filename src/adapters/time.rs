//! Monotonic millisecond clock.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` from the ESP-IDF
//!   high-resolution timer (microsecond precision, monotonic).  Safe to call
//!   from ISRs and the BT task.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` since the first
//!   call, for host-side simulation.
//!
//! The result is truncated to `u32`; every consumer compares timestamps
//! with wrapping arithmetic.

/// Milliseconds since boot, wrapping after ~49 days.
#[cfg(target_os = "espidf")]
pub fn uptime_ms() -> u32 {
    ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
}

/// Milliseconds since the first call, wrapping after ~49 days.
#[cfg(not(target_os = "espidf"))]
pub fn uptime_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u32
}
