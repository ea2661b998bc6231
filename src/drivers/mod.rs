//! Peripheral drivers, hardware initialisation and interrupt glue.

pub mod hw_init;
pub mod hw_timer;
pub mod indicator;
pub mod pin_irq;
pub mod watchdog;
