//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`RecordStore`] for the door tag.  Each `(file, record)`
//! pair maps to one NVS blob named `f{file}r{record}` in the `doortag`
//! namespace.
//!
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`, so
//!   a power cut leaves either the old or the new record.
//! - Free space: reported from `nvs_get_stats()` free entries.
//! - The simulation backend is a log-structured map with a fixed capacity:
//!   every write consumes space until [`RecordStore::compact`] runs.

use core::fmt::Write as _;

use log::info;

use crate::app::ports::{RecordError, RecordStore};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"doortag\0";

/// NVS entries are 32 bytes each.
#[cfg(target_os = "espidf")]
const NVS_ENTRY_BYTES: usize = 32;

/// Simulated partition size (the default 24 KiB NVS partition).
#[cfg(not(target_os = "espidf"))]
pub const SIM_CAPACITY_BYTES: usize = 0x6000;

/// NUL-terminated NVS key for a record address.
fn record_key(file: u16, record: u16) -> heapless::String<16> {
    let mut key = heapless::String::new();
    // "f65535r65535\0" is 13 bytes: always fits.
    let _ = write!(key, "f{}r{}\0", file, record);
    key
}

pub struct NvsRecordStore {
    #[cfg(not(target_os = "espidf"))]
    records: HashMap<(u16, u16), Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    capacity: usize,
    #[cfg(not(target_os = "espidf"))]
    used: usize,
}

impl NvsRecordStore {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised automatically.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, RecordError> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single main-task context before any other NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
            || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
        {
            warn!("NvsRecordStore: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
                return Err(RecordError::Io);
            }
            if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                return Err(RecordError::Io);
            }
        } else if ret != ESP_OK as esp_err_t {
            return Err(RecordError::Io);
        }
        info!("NvsRecordStore: ESP-IDF NVS initialised");
        Ok(Self {})
    }

    /// Handle used after flash init failed.  Every operation reaches NVS
    /// and fails there, so reads fall back to defaults and writes report
    /// `Io`.
    #[cfg(target_os = "espidf")]
    pub fn unavailable() -> Self {
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, RecordError> {
        Ok(Self::with_capacity(SIM_CAPACITY_BYTES))
    }

    /// Simulation store with an explicit partition size.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_capacity(capacity: usize) -> Self {
        info!("NvsRecordStore: simulation backend ({} bytes)", capacity);
        Self {
            records: HashMap::new(),
            capacity,
            used: 0,
        }
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

#[cfg(target_os = "espidf")]
fn record_error(rc: esp_err_t) -> RecordError {
    if rc == ESP_ERR_NVS_NOT_FOUND as esp_err_t {
        RecordError::NotFound
    } else if rc == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t {
        RecordError::Corrupted
    } else if rc == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t {
        RecordError::Full
    } else {
        RecordError::Io
    }
}

impl RecordStore for NvsRecordStore {
    #[cfg(target_os = "espidf")]
    fn get(&self, file: u16, record: u16, buf: &mut [u8]) -> Result<usize, RecordError> {
        let key = record_key(file, record);
        Self::with_nvs_handle(false, |handle| {
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(size)
        })
        .map_err(record_error)
    }

    #[cfg(not(target_os = "espidf"))]
    fn get(&self, file: u16, record: u16, buf: &mut [u8]) -> Result<usize, RecordError> {
        let data = self
            .records
            .get(&(file, record))
            .ok_or(RecordError::NotFound)?;
        if data.len() > buf.len() {
            return Err(RecordError::Corrupted);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    #[cfg(target_os = "espidf")]
    fn set(&mut self, file: u16, record: u16, data: &[u8]) -> Result<(), RecordError> {
        let key = record_key(file, record);
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|rc| {
            warn!("NvsRecordStore: write {} failed (rc={})", key.trim_end_matches('\0'), rc);
            record_error(rc)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn set(&mut self, file: u16, record: u16, data: &[u8]) -> Result<(), RecordError> {
        if self.used + data.len() > self.capacity {
            return Err(RecordError::Full);
        }
        self.used += data.len();
        self.records.insert((file, record), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn free_space(&self) -> usize {
        let mut stats: nvs_stats_t = Default::default();
        // SAFETY: a null partition name selects the default NVS partition.
        let ret = unsafe { nvs_get_stats(core::ptr::null(), &mut stats) };
        if ret != ESP_OK as esp_err_t {
            warn!("NvsRecordStore: nvs_get_stats failed (rc={})", ret);
            return 0;
        }
        stats.free_entries * NVS_ENTRY_BYTES
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }

    #[cfg(target_os = "espidf")]
    fn compact(&mut self) -> Result<(), RecordError> {
        // NVS reclaims erased entries when it recycles a full page; there is
        // no explicit garbage-collection call.
        info!("NvsRecordStore: {} bytes free, page recycling left to NVS", self.free_space());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn compact(&mut self) -> Result<(), RecordError> {
        let before = self.used;
        self.used = self.records.values().map(Vec::len).sum();
        info!("NvsRecordStore: compacted {} -> {} bytes", before, self.used);
        Ok(())
    }
}
