//! Persisting the configuration blob in NOR flash.

use core::ops::Range;

use embassy_embedded_hal::adapter::BlockingAsync;
use embedded_storage::nor_flash::NorFlash;
use embedded_storage_async::nor_flash::{
    NorFlash as AsyncNorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash as AsyncReadNorFlash,
};
use remapper_types::protocol::PERSISTED_CONFIG_SIZE;

use crate::config::StorageConfig;
use crate::persist::{LoadError, decode_and_load, encode_current_state};
use crate::state::DeviceState;

/// Erased NOR flash reads back as all ones
const ERASED_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Flash driver error
    Flash(NorFlashErrorKind),
    /// The stored blob was not accepted
    Rejected(LoadError),
    /// The configured range is not sector aligned, lies outside the flash or cannot hold the blob
    InvalidRange,
}

#[cfg(feature = "defmt")]
impl defmt::Format for StorageError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            StorageError::Flash(kind) => defmt::write!(fmt, "Flash({})", defmt::Debug2Format(kind)),
            StorageError::Rejected(e) => defmt::write!(fmt, "Rejected({})", e),
            StorageError::InvalidRange => defmt::write!(fmt, "InvalidRange"),
        }
    }
}

fn flash_error<E: NorFlashError>(e: E) -> StorageError {
    StorageError::Flash(e.kind())
}

pub fn async_flash_wrapper<F: NorFlash>(flash: F) -> BlockingAsync<F> {
    embassy_embedded_hal::adapter::BlockingAsync::new(flash)
}

pub struct Storage<F: AsyncNorFlash> {
    flash: F,
    storage_range: Range<u32>,
    buffer: [u8; PERSISTED_CONFIG_SIZE],
}

impl<F: AsyncNorFlash> Storage<F> {
    /// Create the storage, erasing it first if `config.clear_storage` is set.
    pub async fn new(flash: F, config: &StorageConfig) -> Result<Self, StorageError> {
        let capacity = flash.capacity();
        let size = config.num_sectors as usize * F::ERASE_SIZE;

        // If config.start_addr == 0, use last `num_sectors` sectors
        let storage_range = if config.start_addr == 0 {
            let start = capacity.checked_sub(size).ok_or(StorageError::InvalidRange)?;
            start as u32..capacity as u32
        } else {
            if F::ERASE_SIZE == 0 || config.start_addr % F::ERASE_SIZE != 0 || config.start_addr + size > capacity {
                error!("Storage start address must be sector aligned and inside the flash");
                return Err(StorageError::InvalidRange);
            }
            config.start_addr as u32..(config.start_addr + size) as u32
        };
        if size < PERSISTED_CONFIG_SIZE {
            error!(
                "Storage of {} sectors is smaller than the {} byte config",
                config.num_sectors, PERSISTED_CONFIG_SIZE
            );
            return Err(StorageError::InvalidRange);
        }

        info!(
            "Flash capacity {} KB, use {} KB({} sectors) starting from 0x{:X} as storage",
            capacity / 1024,
            size / 1024,
            config.num_sectors,
            storage_range.start,
        );

        let mut storage = Self {
            flash,
            storage_range,
            buffer: [0; PERSISTED_CONFIG_SIZE],
        };
        if config.clear_storage {
            debug!("Clearing storage!");
            storage.erase().await?;
        }
        Ok(storage)
    }

    pub fn storage_range(&self) -> Range<u32> {
        self.storage_range.clone()
    }

    /// Load the stored blob into `state`.
    ///
    /// Returns `Ok(false)` if nothing was ever stored.
    pub async fn load(&mut self, state: &mut DeviceState<'_>) -> Result<bool, StorageError> {
        self.flash
            .read(self.storage_range.start, &mut self.buffer)
            .await
            .map_err(flash_error)?;
        if self.buffer.iter().all(|b| *b == ERASED_BYTE) {
            info!("No stored config, using defaults");
            return Ok(false);
        }
        match decode_and_load(state, &self.buffer) {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("Stored config rejected: {:?}", e);
                Err(StorageError::Rejected(e))
            }
        }
    }

    /// Write the current state to flash.
    pub async fn persist(&mut self, state: &DeviceState<'_>) -> Result<(), StorageError> {
        let used = encode_current_state(state, &mut self.buffer).map_err(|e| {
            error!("Encoding config failed: {:?}", e);
            StorageError::Rejected(e.into())
        })?;
        let start = self.storage_range.start;
        let end = start + blob_erase_size::<F>() as u32;
        self.flash.erase(start, end).await.map_err(flash_error)?;
        self.flash.write(start, &self.buffer).await.map_err(flash_error)?;
        info!("Config persisted, {} bytes", used);
        Ok(())
    }

    /// Persist if PERSIST_CONFIG was received since the last call.
    pub async fn persist_if_requested(&mut self, state: &mut DeviceState<'_>) -> Result<bool, StorageError> {
        if !state.take_persist_request() {
            return Ok(false);
        }
        self.persist(state).await?;
        Ok(true)
    }

    /// Erase the whole storage range.
    pub async fn erase(&mut self) -> Result<(), StorageError> {
        self.flash
            .erase(self.storage_range.start, self.storage_range.end)
            .await
            .map_err(flash_error)
    }
}

/// Blob size rounded up to whole sectors
fn blob_erase_size<F: AsyncNorFlash>() -> usize {
    PERSISTED_CONFIG_SIZE.div_ceil(F::ERASE_SIZE) * F::ERASE_SIZE
}
