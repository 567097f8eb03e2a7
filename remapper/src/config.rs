use remapper_types::protocol::REPORT_ID_CONFIG;

/// Internal configurations for the remapper core
#[derive(Clone, Copy, Debug, Default)]
pub struct RemapperConfig {
    pub report_ids: ReportIds,
    pub storage_config: StorageConfig,
}

/// Report IDs of the two feature reports the core answers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportIds {
    /// Config protocol feature report
    pub config: u8,
    /// Hi-res scroll resolution multiplier feature report
    pub multiplier: u8,
}

impl Default for ReportIds {
    fn default() -> Self {
        Self {
            config: REPORT_ID_CONFIG,
            multiplier: REPORT_ID_MULTIPLIER,
        }
    }
}

/// Default report ID of the resolution multiplier feature report
pub const REPORT_ID_MULTIPLIER: u8 = 2;

/// Config for storage
#[derive(Clone, Copy, Debug)]
pub struct StorageConfig {
    /// Start address of local storage, MUST BE start of a sector.
    /// If start_addr is set to 0(this is the default value), the last `num_sectors` sectors will be used.
    pub start_addr: usize,
    // Number of sectors used for storage, the persisted blob must fit
    pub num_sectors: u8,
    /// Erase the storage at startup instead of loading it
    pub clear_storage: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            start_addr: 0,
            num_sectors: 4,
            clear_storage: false,
        }
    }
}
