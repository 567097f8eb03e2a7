//! Device state aggregate: settings, mapping table, usage lists and the pending query
//! of the config protocol.

use heapless::Vec;
use remapper_types::protocol::{
    CONFIG_VERSION, ConfigCommand, ConfigFlags, ConfigSummary, MAPPING_MAX_NUM, MappingConfig, SetConfig,
    USAGE_RLE_MAX_NUM, UsageRle,
};

use crate::keyboard_macros::MacroStore;
use crate::persist::PersistHeader;

/// Default partial scroll timeout, in microseconds
pub const DEFAULT_PARTIAL_SCROLL_TIMEOUT: u32 = 1_000_000;
/// Unmapped input is passed through on layer 0 by default
pub const DEFAULT_UNMAPPED_PASSTHROUGH_LAYERS: u8 = 0b0001;

/// Scalar settings changed by SET_CONFIG and persisted in the blob header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSettings {
    /// One bit per layer
    pub unmapped_passthrough_layers: u8,
    pub partial_scroll_timeout: u32,
    /// Polling interval override, 0 means no override
    pub interval_override: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            unmapped_passthrough_layers: DEFAULT_UNMAPPED_PASSTHROUGH_LAYERS,
            partial_scroll_timeout: DEFAULT_PARTIAL_SCROLL_TIMEOUT,
            interval_override: 0,
        }
    }
}

impl DeviceSettings {
    pub fn flags(&self) -> ConfigFlags {
        ConfigFlags::from_passthrough_mask(self.unmapped_passthrough_layers)
    }
}

impl From<SetConfig> for DeviceSettings {
    fn from(config: SetConfig) -> Self {
        Self {
            unmapped_passthrough_layers: config.flags.unmapped_passthrough_layers(),
            partial_scroll_timeout: config.partial_scroll_timeout,
            interval_override: config.interval_override,
        }
    }
}

/// The command a following GET config report answers, with its arguments
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingQuery {
    pub command: ConfigCommand,
    /// Mapping/usage index, or the macro slot for GET_MACRO
    pub requested_index: u32,
    /// Flattened item offset for GET_MACRO
    pub requested_secondary_index: u32,
}

impl Default for PendingQuery {
    fn default() -> Self {
        Self {
            command: ConfigCommand::NoCommand,
            requested_index: 0,
            requested_secondary_index: 0,
        }
    }
}

pub struct DeviceState<'a> {
    settings: DeviceSettings,
    mappings: Vec<MappingConfig, MAPPING_MAX_NUM>,
    our_usages: Vec<UsageRle, USAGE_RLE_MAX_NUM>,
    their_usages: Vec<UsageRle, USAGE_RLE_MAX_NUM>,
    pending: PendingQuery,
    suspended: bool,
    persist_requested: bool,
    resolution_multiplier: u8,
    macros: &'a MacroStore,
}

impl<'a> DeviceState<'a> {
    pub fn new(macros: &'a MacroStore) -> Self {
        Self {
            settings: DeviceSettings::default(),
            mappings: Vec::new(),
            our_usages: Vec::new(),
            their_usages: Vec::new(),
            pending: PendingQuery::default(),
            suspended: false,
            persist_requested: false,
            resolution_multiplier: 0,
            macros,
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DeviceSettings) {
        self.settings = settings;
    }

    pub fn mappings(&self) -> &[MappingConfig] {
        &self.mappings
    }

    pub fn clear_mappings(&mut self) {
        self.mappings.clear();
    }

    /// Append a mapping, returns false if the table is full
    pub fn add_mapping(&mut self, mapping: MappingConfig) -> bool {
        self.mappings.push(mapping).is_ok()
    }

    pub(crate) fn mappings_mut(&mut self) -> &mut Vec<MappingConfig, MAPPING_MAX_NUM> {
        &mut self.mappings
    }

    pub fn our_usages(&self) -> &[UsageRle] {
        &self.our_usages
    }

    pub fn their_usages(&self) -> &[UsageRle] {
        &self.their_usages
    }

    /// Replace the list of usages the device can emit. Entries beyond capacity are dropped.
    pub fn set_our_usages(&mut self, usages: &[UsageRle]) {
        fill_usages(&mut self.our_usages, usages);
    }

    /// Replace the list of usages seen on connected devices. Entries beyond capacity are dropped.
    pub fn set_their_usages(&mut self, usages: &[UsageRle]) {
        fill_usages(&mut self.their_usages, usages);
    }

    pub fn pending(&self) -> &PendingQuery {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingQuery {
        &mut self.pending
    }

    pub fn suspended(&self) -> bool {
        self.suspended
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn persist_requested(&self) -> bool {
        self.persist_requested
    }

    pub fn request_persist(&mut self) {
        self.persist_requested = true;
    }

    /// Consume the persist request set by PERSIST_CONFIG
    pub fn take_persist_request(&mut self) -> bool {
        core::mem::replace(&mut self.persist_requested, false)
    }

    pub fn resolution_multiplier(&self) -> u8 {
        self.resolution_multiplier
    }

    pub fn set_resolution_multiplier(&mut self, value: u8) {
        self.resolution_multiplier = value;
    }

    /// Called by the transport when the host re-enumerates the device
    pub fn reset_resolution_multiplier(&mut self) {
        self.resolution_multiplier = 0;
    }

    pub fn macros(&self) -> &'a MacroStore {
        self.macros
    }

    /// Projection answered to GET_CONFIG
    pub fn config_summary(&self) -> ConfigSummary {
        ConfigSummary {
            version: CONFIG_VERSION,
            flags: self.settings.flags(),
            partial_scroll_timeout: self.settings.partial_scroll_timeout,
            mapping_count: self.mappings.len() as u32,
            our_usage_count: self.our_usages.len() as u32,
            their_usage_count: self.their_usages.len() as u32,
            interval_override: self.settings.interval_override,
        }
    }

    /// Projection written at the start of the persisted blob
    pub fn persist_header(&self) -> PersistHeader {
        PersistHeader {
            version: CONFIG_VERSION,
            flags: self.settings.flags().into_bits(),
            partial_scroll_timeout: self.settings.partial_scroll_timeout,
            interval_override: self.settings.interval_override,
            mapping_count: self.mappings.len() as u32,
        }
    }
}

fn fill_usages(list: &mut Vec<UsageRle, USAGE_RLE_MAX_NUM>, usages: &[UsageRle]) {
    list.clear();
    let kept = usages.len().min(USAGE_RLE_MAX_NUM);
    if kept < usages.len() {
        warn!("Usage list truncated from {} to {} entries", usages.len(), kept);
    }
    // `kept` never exceeds the capacity
    let _ = list.extend_from_slice(&usages[..kept]);
}
