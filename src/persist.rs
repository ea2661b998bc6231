//! Switch polarity persistence.
//!
//! The polarity lives in a single 4-byte little-endian record
//! (`0` = normally open, `1` = normally closed) at a fixed
//! `(file, record)` address.  Writes happen from the main loop only, via
//! [`Task::PersistPolarity`](crate::tasks::Task::PersistPolarity), so a
//! slow flash never blocks an interrupt.
//!
//! The in-memory polarity is authoritative.  A failed write is reported
//! and left alone; the next toggle writes again.

use log::{info, warn};

use crate::app::ports::{RecordError, RecordStore};
use crate::fsm::context::SwitchPolarity;

pub const POLARITY_FILE_ID: u16 = 1;
pub const POLARITY_RECORD_ID: u16 = 1;
const RECORD_LEN: usize = 4;

/// What a successful store did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// Free space fell below the threshold and the store was compacted.
    WrittenAndCompacted,
}

fn encode(polarity: SwitchPolarity) -> [u8; RECORD_LEN] {
    let raw: u32 = match polarity {
        SwitchPolarity::NormallyOpen => 0,
        SwitchPolarity::NormallyClosed => 1,
    };
    raw.to_le_bytes()
}

/// Read the stored polarity.
///
/// A missing record (first boot) and a corrupt one both yield the default
/// `NormallyOpen`; only storage I/O failures are errors.  A record larger
/// than four bytes is reported by the store as `Corrupted`.
pub fn load_polarity(store: &impl RecordStore) -> Result<SwitchPolarity, RecordError> {
    let mut buf = [0u8; RECORD_LEN];
    match store.get(POLARITY_FILE_ID, POLARITY_RECORD_ID, &mut buf) {
        Ok(RECORD_LEN) => match u32::from_le_bytes(buf) {
            0 => Ok(SwitchPolarity::NormallyOpen),
            1 => Ok(SwitchPolarity::NormallyClosed),
            other => {
                warn!("persist: corrupt polarity value {}, using default", other);
                Ok(SwitchPolarity::default())
            }
        },
        Ok(len) => {
            warn!("persist: polarity record has {} bytes, using default", len);
            Ok(SwitchPolarity::default())
        }
        Err(RecordError::NotFound) => {
            info!("persist: no stored polarity (first boot)");
            Ok(SwitchPolarity::default())
        }
        Err(RecordError::Corrupted) => {
            warn!("persist: polarity record unreadable, using default");
            Ok(SwitchPolarity::default())
        }
        Err(e) => Err(e),
    }
}

/// Write the polarity, then compact if free space fell below `threshold`.
///
/// A compaction failure after a good write is logged but not an error:
/// the value is safely stored.
pub fn store_polarity(
    store: &mut impl RecordStore,
    polarity: SwitchPolarity,
    threshold: usize,
) -> Result<StoreOutcome, RecordError> {
    if let Err(e) = store.set(POLARITY_FILE_ID, POLARITY_RECORD_ID, &encode(polarity)) {
        warn!("persist: polarity write failed: {}", e);
        return Err(e);
    }
    info!("persist: stored {:?}", polarity);

    if store.free_space() >= threshold {
        return Ok(StoreOutcome::Written);
    }
    match store.compact() {
        Ok(()) => {
            info!("persist: compacted, {} bytes free", store.free_space());
            Ok(StoreOutcome::WrittenAndCompacted)
        }
        Err(e) => {
            warn!("persist: compaction failed: {}", e);
            Ok(StoreOutcome::Written)
        }
    }
}

/// Boot-time check: compact first if space is short, then load.
pub fn load_at_boot(
    store: &mut impl RecordStore,
    threshold: usize,
) -> Result<SwitchPolarity, RecordError> {
    let free = store.free_space();
    if free < threshold {
        info!("persist: {} bytes free at boot, compacting", free);
        if let Err(e) = store.compact() {
            warn!("persist: boot compaction failed: {}", e);
        }
    }
    load_polarity(store)
}
