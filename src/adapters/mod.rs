//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to              |
//! |------------|--------------------------------|--------------------------|
//! | `hardware` | SensorPort, PinPort,           | ESP32 ADC, GPIO, drivers |
//! |            | IndicatorPort, NfcPort,        |                          |
//! |            | TimerPort, SystemPort          |                          |
//! | `radio`    | BroadcastPort                  | Bluedroid GAP advertiser |
//! | `log_sink` | EventSink                      | Serial log output        |
//! | `nvs`      | RecordStore                    | NVS / in-memory store    |
//! | `time`     | (clock)                        | ESP32 system timer       |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod radio;
pub mod time;
