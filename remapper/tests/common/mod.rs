#![allow(dead_code)]

use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use remapper::DeviceState;
use remapper::RemapperHooks;
use remapper::types::checksum;
use remapper::types::protocol::{CONFIG_SIZE, Command, REPORT_ID_CONFIG};
use remapper::{ConfigService, ReportIds};

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub const SECTOR_SIZE: usize = 4096;
pub const FLASH_SIZE: usize = 16 * SECTOR_SIZE;

/// NOR flash kept in RAM: erase sets bytes to 0xFF, writes can only clear bits
pub struct RamFlash {
    pub data: Vec<u8>,
    pub erase_count: usize,
}

impl RamFlash {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; FLASH_SIZE],
            erase_count: 0,
        }
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), NorFlashErrorKind> {
        if offset as usize + len > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(())
    }
}

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check_range(offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from as usize % SECTOR_SIZE != 0 || to as usize % SECTOR_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.check_range(from, (to - from) as usize)?;
        self.data[from as usize..to as usize].fill(0xFF);
        self.erase_count += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.check_range(offset, bytes.len())?;
        let start = offset as usize;
        for (dst, src) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *dst &= *src;
        }
        Ok(())
    }
}

/// Hooks recording every notification
#[derive(Debug, Default)]
pub struct RecordingHooks {
    pub mappings_changed: usize,
    pub last_mapping_count: usize,
    pub interval_updates: Vec<u8>,
    pub bootsel: usize,
    pub pair: usize,
    pub clear_bonds: usize,
    pub flash_b_side: usize,
}

impl RemapperHooks for RecordingHooks {
    fn mappings_changed(&mut self, state: &DeviceState) {
        self.mappings_changed += 1;
        self.last_mapping_count = state.mappings().len();
    }

    fn interval_override_updated(&mut self, interval_override: u8) {
        self.interval_updates.push(interval_override);
    }

    fn reset_into_bootsel(&mut self) {
        self.bootsel += 1;
    }

    fn pair_new_device(&mut self) {
        self.pair += 1;
    }

    fn clear_bonds(&mut self) {
        self.clear_bonds += 1;
    }

    fn flash_b_side(&mut self) {
        self.flash_b_side += 1;
    }
}

pub fn new_service(macros: &remapper::MacroStore) -> ConfigService<'_, RecordingHooks> {
    ConfigService::new(DeviceState::new(macros), RecordingHooks::default(), ReportIds::default())
}

/// Send a command as a SET config report
pub fn send<H: RemapperHooks>(service: &mut ConfigService<'_, H>, command: Command) {
    service.handle_set_report(REPORT_ID_CONFIG, &command.encode());
}

/// Read the reply of a GET config report, checking its checksum
pub fn reply<H: RemapperHooks>(service: &mut ConfigService<'_, H>) -> [u8; CONFIG_SIZE] {
    let mut buf = [0u8; CONFIG_SIZE];
    assert_eq!(service.handle_get_report(REPORT_ID_CONFIG, &mut buf), CONFIG_SIZE);
    assert!(checksum::verify(&buf, CONFIG_SIZE));
    buf
}

/// A SET config report with an arbitrary version and command byte and a valid checksum
pub fn raw_report(version: u8, command: u8, data: &[u8]) -> [u8; CONFIG_SIZE] {
    let mut report = [0u8; CONFIG_SIZE];
    report[0] = version;
    report[1] = command;
    report[2..2 + data.len()].copy_from_slice(data);
    checksum::stamp(&mut report, CONFIG_SIZE);
    report
}
