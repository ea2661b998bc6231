//! BLE broadcast adapter.
//!
//! Implements [`BroadcastPort`]: wraps each finished [`Frame`] in a
//! manufacturer-specific AD structure and advertises it non-connectable.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GAP via raw `esp_idf_svc::sys`
//!   calls.  The GAP callback runs in the BT task and only posts tasks.
//! - **all other targets**: simulation that records the last payload.
//!
//! ## Advertising data
//!
//! ```text
//!  02 01 06                 flags: LE general discoverable, BR/EDR off
//!  LL FF 99 04 <frame…>     manufacturer data, company id 0x0499 (LE)
//! ```

use core::fmt;

use log::info;

use crate::app::ports::BroadcastPort;
use crate::frame::{Frame, MANUFACTURER_ID};

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

/// Legacy advertising PDUs carry at most 31 bytes of AD data.
pub const MAX_ADV_DATA: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_MANUFACTURER: u8 = 0xFF;
const FLAGS_LE_GENERAL_NO_BREDR: u8 = 0x06;

/// Advertising interval unit is 0.625 ms; the controller accepts
/// 0x0020..=0x4000.
const MIN_INTERVAL_UNITS: u16 = 0x0020;
const MAX_INTERVAL_UNITS: u16 = 0x4000;

pub type AdvData = heapless::Vec<u8, MAX_ADV_DATA>;

// ───────────────────────────────────────────────────────────────
// Error type
// ───────────────────────────────────────────────────────────────

/// The BT controller or Bluedroid failed to come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioError {
    pub step: &'static str,
    pub rc: i32,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BLE {} failed (rc={})", self.step, self.rc)
    }
}

// ───────────────────────────────────────────────────────────────
// Pure helpers
// ───────────────────────────────────────────────────────────────

/// Flags AD followed by the manufacturer AD carrying `frame`.
pub fn build_adv_data(frame: &Frame) -> AdvData {
    let body = frame.as_bytes();
    let mut data = AdvData::new();
    // Both frame sizes fit: 3 + 4 + 24 = 31.
    let _ = data.extend_from_slice(&[0x02, AD_TYPE_FLAGS, FLAGS_LE_GENERAL_NO_BREDR]);
    let _ = data.push((body.len() + 3) as u8);
    let _ = data.push(AD_TYPE_MANUFACTURER);
    let _ = data.extend_from_slice(&MANUFACTURER_ID.to_le_bytes());
    let _ = data.extend_from_slice(body);
    data
}

/// Milliseconds to 0.625 ms controller units, clamped to the legal range.
pub fn interval_units(interval_ms: u32) -> u16 {
    let units = interval_ms.saturating_mul(1_000) / 625;
    units.clamp(MIN_INTERVAL_UNITS as u32, MAX_INTERVAL_UNITS as u32) as u16
}

/// dBm to the ESP32-S3 `esp_power_level_t` index (-24 dBm .. +21 dBm in
/// 3 dB steps).
pub fn power_level(tx_power_dbm: i8) -> u32 {
    ((tx_power_dbm as i32 + 24) / 3).clamp(0, 15) as u32
}

// ───────────────────────────────────────────────────────────────
// Callback state (espidf)
// ───────────────────────────────────────────────────────────────

/// Interval the GAP callback uses when it (re)starts advertising.
#[cfg(target_os = "espidf")]
static ADV_INTERVAL_UNITS: AtomicU16 = AtomicU16::new(MIN_INTERVAL_UNITS);
#[cfg(target_os = "espidf")]
static ADVERTISING: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static RESTART_PENDING: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    let units = ADV_INTERVAL_UNITS.load(Ordering::Relaxed);
    // SAFETY: zeroed is a valid bit pattern for this plain C struct.
    let mut params = esp_ble_adv_params_t {
        adv_int_min: units,
        adv_int_max: units,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_NONCONN_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gap_event_handler(
    event: esp_gap_ble_cb_event_t,
    _param: *mut esp_ble_gap_cb_param_t,
) {
    use crate::tasks::{Task, post_from_isr};

    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_RAW_SET_COMPLETE_EVT => {
            // The controller took the new payload between two advertising
            // events: the radio is quiet right now.
            post_from_isr(Task::RadioIdle {
                at_ms: super::time::uptime_ms(),
            });
            if !ADVERTISING.load(Ordering::Relaxed) {
                unsafe { start_advertising() };
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            ADVERTISING.store(true, Ordering::Relaxed);
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            ADVERTISING.store(false, Ordering::Relaxed);
            if RESTART_PENDING.swap(false, Ordering::Relaxed) {
                unsafe { start_advertising() };
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BleBroadcaster
// ───────────────────────────────────────────────────────────────

pub struct BleBroadcaster {
    mac: Option<[u8; 6]>,
    interval_ms: u32,
    online: bool,
    #[cfg(not(target_os = "espidf"))]
    payload: AdvData,
    #[cfg(not(target_os = "espidf"))]
    updates: u32,
}

impl BleBroadcaster {
    /// Bring up the BT controller and Bluedroid in BLE-only mode.
    #[cfg(target_os = "espidf")]
    pub fn new(tx_power_dbm: i8, interval_ms: u32) -> Result<Self, RadioError> {
        let check = |step: &'static str, rc: esp_err_t| {
            if rc == ESP_OK as esp_err_t {
                Ok(())
            } else {
                Err(RadioError { step, rc })
            }
        };

        ADV_INTERVAL_UNITS.store(interval_units(interval_ms), Ordering::Relaxed);

        let mut mac = [0u8; 6];
        // SAFETY: single-threaded boot path; the callback is registered
        // before anything can trigger it.
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check("controller init", esp_bt_controller_init(&mut bt_cfg))?;
            check(
                "controller enable",
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
            )?;
            check("bluedroid init", esp_bluedroid_init())?;
            check("bluedroid enable", esp_bluedroid_enable())?;
            check(
                "gap callback",
                esp_ble_gap_register_callback(Some(gap_event_handler)),
            )?;
            check(
                "tx power",
                esp_ble_tx_power_set(
                    esp_ble_power_type_t_ESP_BLE_PWR_TYPE_ADV,
                    power_level(tx_power_dbm) as esp_power_level_t,
                ),
            )?;

            let rc = esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT);
            if rc != ESP_OK as esp_err_t {
                log::warn!("BLE: MAC read failed ({}), frames carry FF", rc);
            }
        }

        info!(
            "BLE(espidf): broadcaster ready, {} dBm, {} ms",
            tx_power_dbm, interval_ms
        );
        Ok(Self {
            mac: (mac != [0u8; 6]).then_some(mac),
            interval_ms,
            online: true,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(tx_power_dbm: i8, interval_ms: u32) -> Result<Self, RadioError> {
        info!(
            "BLE(sim): broadcaster, {} dBm, {} ms",
            tx_power_dbm, interval_ms
        );
        Ok(Self {
            mac: None,
            interval_ms,
            online: true,
            payload: AdvData::new(),
            updates: 0,
        })
    }

    /// Placeholder used when the stack failed to start: payload and
    /// interval updates are accepted and go nowhere.
    pub fn offline(interval_ms: u32) -> Self {
        Self {
            mac: None,
            interval_ms,
            online: false,
            #[cfg(not(target_os = "espidf"))]
            payload: AdvData::new(),
            #[cfg(not(target_os = "espidf"))]
            updates: 0,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Last advertising data handed to the (simulated) controller.
    #[cfg(not(target_os = "espidf"))]
    pub fn adv_data(&self) -> &[u8] {
        &self.payload
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn payload_updates(&self) -> u32 {
        self.updates
    }

    /// Pretend the stack reported an address.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_mac(&mut self, mac: [u8; 6]) {
        self.mac = Some(mac);
    }
}

// ───────────────────────────────────────────────────────────────
// BroadcastPort implementation
// ───────────────────────────────────────────────────────────────

impl BroadcastPort for BleBroadcaster {
    #[cfg(target_os = "espidf")]
    fn set_payload(&mut self, frame: &Frame) {
        if !self.online {
            return;
        }
        let mut data = build_adv_data(frame);
        // SAFETY: Bluedroid copies the buffer before returning.
        let rc = unsafe { esp_ble_gap_config_adv_data_raw(data.as_mut_ptr(), data.len() as u32) };
        if rc != ESP_OK as esp_err_t {
            log::warn!("BLE: adv data update failed ({})", rc);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_payload(&mut self, frame: &Frame) {
        if !self.online {
            return;
        }
        self.payload = build_adv_data(frame);
        self.updates = self.updates.wrapping_add(1);
    }

    fn set_advertising_interval(&mut self, interval_ms: u32) {
        if interval_ms == self.interval_ms {
            return;
        }
        info!("BLE: advertising interval {} -> {} ms", self.interval_ms, interval_ms);
        self.interval_ms = interval_ms;

        #[cfg(target_os = "espidf")]
        if self.online {
            ADV_INTERVAL_UNITS.store(interval_units(interval_ms), Ordering::Relaxed);
            if ADVERTISING.load(Ordering::Relaxed) {
                // Restarted from the GAP callback once the stop completes.
                RESTART_PENDING.store(true, Ordering::Relaxed);
                unsafe {
                    esp_ble_gap_stop_advertising();
                }
            }
        }
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        self.mac
    }
}
