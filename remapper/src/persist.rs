//! Persisted configuration blob.
//!
//! The blob is always [`PERSISTED_CONFIG_SIZE`] bytes, unused space is zero:
//!
//! ```text
//! @0  version:u8
//! @1  flags:u8
//! @2  partial_scroll_timeout:u32
//! @6  interval_override:u8
//! @7  mapping_count:u32
//! @11 mapping_count × MappingConfig
//!     macro table, version 4 only
//! @PERSISTED_CONFIG_SIZE-4 crc32
//! ```
//!
//! Version 3 blobs are still accepted: they carry a single pass-through bit in the
//! flags, a layer index instead of a layer mask in each mapping, and no macro table.

use byteorder::{ByteOrder, LittleEndian};
use remapper_types::checksum::{self, CHECKSUM_SIZE};
use remapper_types::protocol::{
    CONFIG_VERSION, CONFIG_VERSION_V3, ConfigFlags, MACRO_MAX_CHORD_USAGES, MACRO_MAX_CHORDS, MAPPING_MAX_NUM,
    MappingConfig, NMACROS, PERSISTED_CONFIG_SIZE,
};

use crate::keyboard_macros::{MacroError, MacroStore};
use crate::state::{DeviceSettings, DeviceState};

/// Size of the blob header
pub const HEADER_SIZE: usize = 11;

const BODY_END: usize = PERSISTED_CONFIG_SIZE - CHECKSUM_SIZE;
const MACRO_TABLE_MAX_SIZE: usize = NMACROS * (1 + MACRO_MAX_CHORDS * (1 + MACRO_MAX_CHORD_USAGES * 4));

// A full mapping table and a full macro table always fit
const _: () = assert!(HEADER_SIZE + MAPPING_MAX_NUM * MappingConfig::SIZE + MACRO_TABLE_MAX_SIZE <= BODY_END);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    /// Blob crc32 mismatch
    Checksum,
    /// Neither version 3 nor version 4
    UnsupportedVersion(u8),
    /// More mappings than the live table holds
    TooManyMappings(u32),
    /// A section runs into the checksum
    Truncated,
    /// A macro chord or usage count exceeds capacity
    MacroOverflow,
}

impl From<MacroError> for LoadError {
    fn from(e: MacroError) -> Self {
        match e {
            MacroError::Truncated => LoadError::Truncated,
            MacroError::Overflow => LoadError::MacroOverflow,
        }
    }
}

/// Header of the persisted blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistHeader {
    pub version: u8,
    /// Raw flags byte, its meaning depends on `version`
    pub flags: u8,
    pub partial_scroll_timeout: u32,
    pub interval_override: u8,
    pub mapping_count: u32,
}

impl PersistHeader {
    pub fn encode(&self, buffer: &mut [u8]) {
        buffer[0] = self.version;
        buffer[1] = self.flags;
        LittleEndian::write_u32(&mut buffer[2..6], self.partial_scroll_timeout);
        buffer[6] = self.interval_override;
        LittleEndian::write_u32(&mut buffer[7..11], self.mapping_count);
    }

    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            version: buffer[0],
            flags: buffer[1],
            partial_scroll_timeout: LittleEndian::read_u32(&buffer[2..6]),
            interval_override: buffer[6],
            mapping_count: LittleEndian::read_u32(&buffer[7..11]),
        })
    }

    /// Settings carried by this header, with version 3 flags migrated
    pub fn settings(&self) -> DeviceSettings {
        DeviceSettings {
            unmapped_passthrough_layers: ConfigFlags::from_versioned_bits(self.version, self.flags)
                .unmapped_passthrough_layers(),
            partial_scroll_timeout: self.partial_scroll_timeout,
            interval_override: self.interval_override,
        }
    }
}

/// Validate a persisted blob and load it into `state`.
///
/// Everything is checked before anything is applied, so a rejected blob leaves
/// `state` and the macro store unchanged. The mapping table is replaced.
pub fn decode_and_load(state: &mut DeviceState, blob: &[u8]) -> Result<(), LoadError> {
    if blob.len() < PERSISTED_CONFIG_SIZE {
        return Err(LoadError::Truncated);
    }
    if !checksum::verify(blob, PERSISTED_CONFIG_SIZE) {
        return Err(LoadError::Checksum);
    }
    let header = PersistHeader::decode(blob).ok_or(LoadError::Truncated)?;
    if header.version != CONFIG_VERSION && header.version != CONFIG_VERSION_V3 {
        return Err(LoadError::UnsupportedVersion(header.version));
    }
    if header.mapping_count as usize > MAPPING_MAX_NUM {
        return Err(LoadError::TooManyMappings(header.mapping_count));
    }
    let mappings_end = HEADER_SIZE + header.mapping_count as usize * MappingConfig::SIZE;
    if mappings_end > BODY_END {
        return Err(LoadError::Truncated);
    }
    let has_macros = header.version >= CONFIG_VERSION;
    if has_macros {
        MacroStore::validate_table(&blob[mappings_end..BODY_END])?;
    }

    state.set_settings(header.settings());
    let mappings = state.mappings_mut();
    mappings.clear();
    for record in blob[HEADER_SIZE..mappings_end].chunks_exact(MappingConfig::SIZE) {
        if let Some(mut mapping) = MappingConfig::decode(record) {
            if header.version == CONFIG_VERSION_V3 {
                mapping = mapping.migrate_v3_layer();
            }
            // Count was checked against the capacity
            let _ = mappings.push(mapping);
        }
    }
    if has_macros {
        state.macros().bulk_load(&blob[mappings_end..BODY_END])?;
    }

    info!(
        "Loaded config version {}, {} mappings",
        header.version, header.mapping_count
    );
    Ok(())
}

/// Serialize the current state into `blob` as a version 4 blob.
///
/// Returns the number of bytes in use, excluding the trailing checksum.
pub fn encode_current_state(state: &DeviceState, blob: &mut [u8; PERSISTED_CONFIG_SIZE]) -> Result<usize, MacroError> {
    blob.fill(0);
    state.persist_header().encode(&mut blob[..HEADER_SIZE]);
    let mut pos = HEADER_SIZE;
    for mapping in state.mappings() {
        // Table capacity keeps every record inside the body
        mapping.encode(&mut blob[pos..BODY_END]);
        pos += MappingConfig::SIZE;
    }
    pos += state.macros().bulk_store(&mut blob[pos..BODY_END])?;
    checksum::stamp(blob, PERSISTED_CONFIG_SIZE);
    debug!("Encoded config blob, {} bytes used", pos);
    Ok(pos)
}
