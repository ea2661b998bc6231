//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                polarity,
                door,
                init,
            } => {
                info!(
                    "START | polarity={:?} | door={:?} | init=0x{:X}",
                    polarity, door, init
                );
            }
            AppEvent::ModeChanged(mode) => {
                info!("MODE  | {:?}", mode);
            }
            AppEvent::PolarityChanged(polarity) => {
                info!("POLAR | {:?}", polarity);
            }
            AppEvent::DoorChanged(door) => {
                info!("DOOR  | {:?}", door);
            }
            AppEvent::PolarityPersisted { compacted } => {
                info!("STORE | polarity saved | compacted={}", compacted);
            }
            AppEvent::PersistFailed(e) => {
                warn!("STORE | polarity save failed: {}", e);
            }
            AppEvent::FrameBroadcast { kind, sequence } => {
                log::debug!("FRAME | {:?} | seq={}", kind, sequence);
            }
            AppEvent::TaskDropped(task) => {
                warn!("QUEUE | dropped {:?}", task);
            }
            AppEvent::Rebooting(cause) => {
                warn!("RESET | cause={:?}", cause);
            }
        }
    }
}
