//! Deferred task queue.
//!
//! Interrupt handlers, timer callbacks and radio / NFC callbacks never do
//! real work.  They capture what happened (and when) into a small [`Task`]
//! and post it here; the main loop drains the queue one task at a time and
//! runs each to completion.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ GPIO ISR     │────▶│                  │     │              │
//! │ esp_timer    │────▶│  TaskQueue (FIFO │────▶│  Main loop   │
//! │ BLE GAP cb   │────▶│  bounded, CS)    │     │  (consumer)  │
//! │ NFC cb       │────▶│                  │     │              │
//! └──────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Overflow policy: the newest task is rejected and handed back inside
//! [`QueueFull`]; the queue counts every rejection.  Already queued work is
//! never displaced.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TryReceiveError, TrySendError};

use crate::fsm::context::PinLevel;

/// Capacity of the firmware-wide queue.
pub const TASK_QUEUE_CAP: usize = 16;

/// Units of deferred work.  Payloads are small and `Copy`; timestamps are
/// captured in the posting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Periodic sample timer fired.
    Sample,
    ButtonEdge { level: PinLevel, at_ms: u32 },
    SwitchEdge { level: PinLevel, at_ms: u32 },
    /// Single-shot reboot timer fired (long press or NFC countdown).  The
    /// button level is read when the timer fires.
    RebootTimerExpired { button_level: PinLevel },
    /// Accelerometer motion interrupt.
    AccelerationEvent,
    /// The radio finished a transmission window.
    RadioIdle { at_ms: u32 },
    NfcField { present: bool },
    /// Write the current switch polarity to flash.
    PersistPolarity,
    EnterFastAdvertising,
    ReinitNfc,
}

/// The queue was full; the rejected task is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull(pub Task);

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task queue full, rejected {:?}", self.0)
    }
}

/// Outcome of [`TaskQueue::drain_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    Ran,
    Empty,
}

/// Bounded multi-producer, single-consumer FIFO safe to post to from
/// interrupt context.
pub struct TaskQueue<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, Task, N>,
    dropped: AtomicU32,
}

impl<const N: usize> TaskQueue<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue a task.  Safe from any context.
    pub fn post(&self, task: Task) -> Result<(), QueueFull> {
        match self.channel.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(QueueFull(task))
            }
        }
    }

    /// Pop the oldest task and run `handler` on it.
    pub fn drain_one(&self, handler: impl FnOnce(Task)) -> Drained {
        match self.channel.try_receive() {
            Ok(task) => {
                handler(task);
                Drained::Ran
            }
            Err(TryReceiveError::Empty) => Drained::Empty,
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Tasks rejected since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for TaskQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Firmware-wide queue shared by every interrupt source and the main loop.
pub type Tasks = TaskQueue<TASK_QUEUE_CAP>;

pub static TASKS: Tasks = TaskQueue::new();

/// Post from interrupt context.  Nothing can be logged there; a rejection
/// only shows up in [`TaskQueue::dropped`], which the main loop reports.
pub fn post_from_isr(task: Task) {
    let _ = TASKS.post(task);
}
