//! Configuration protocol definitions.
//!
//! This module contains the constants, command codes and record layouts for
//! talking to the remapper over its config feature report.
//!
//! - [`records`] - Fixed-layout records: mappings, RLE usages, settings
//! - [`command`] - SET report commands and GET reply layouts
//! - [`host`] - Helpers for host-side tools streaming macros through the report

use bitfield_struct::bitfield;
use strum::FromRepr;

pub mod command;
pub mod host;
pub mod records;

pub use command::{Command, CommandError, ConfigSummary, MacroPage};
pub use records::{MappingConfig, SetConfig, UsageRle};

/// Current config format version, used by commands and written into persisted blobs
pub const CONFIG_VERSION: u8 = 4;
/// Oldest persisted format version the loader still accepts
pub const CONFIG_VERSION_V3: u8 = 3;

/// Report ID of the config feature report
pub const REPORT_ID_CONFIG: u8 = 100;

/// Size of the config feature report, without the report ID byte
pub const CONFIG_SIZE: usize = 32;
/// Fixed size of the persisted configuration blob
pub const PERSISTED_CONFIG_SIZE: usize = 16384;

/// Number of layers, the pass-through mask has one bit per layer
pub const NLAYERS: usize = 4;
/// Number of macro slots
pub const NMACROS: usize = 8;
/// Number of macro usages carried by one GET_MACRO reply or APPEND_TO_MACRO command
pub const MACRO_ITEMS_IN_PACKET: usize = 6;
/// Number of RLE usage entries carried by one GET_OUR_USAGES/GET_THEIR_USAGES reply
pub const NUSAGES_IN_PACKET: usize = 3;

/// Capacity of the live mapping table
pub const MAPPING_MAX_NUM: usize = 512;
/// Maximum number of chords in one macro slot
pub const MACRO_MAX_CHORDS: usize = 32;
/// Maximum number of usages pressed together in one chord
pub const MACRO_MAX_CHORD_USAGES: usize = 8;
/// Capacity of each RLE usage list
pub const USAGE_RLE_MAX_NUM: usize = 256;

/// Usage code separating chords in the macro wire format.
///
/// HID usage 0 is reserved, so it never collides with a real usage.
pub const CHORD_SEPARATOR: u32 = 0;

/// Config commands carried in byte 1 of a SET config report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConfigCommand {
    NoCommand = 0,
    ResetIntoBootsel = 1,
    SetConfig = 2,
    GetConfig = 3,
    ClearMapping = 4,
    AddMapping = 5,
    GetMapping = 6,
    PersistConfig = 7,
    GetOurUsages = 8,
    GetTheirUsages = 9,
    Suspend = 10,
    Resume = 11,
    PairNewDevice = 12,
    ClearBonds = 13,
    FlashBSide = 14,
    ClearMacros = 15,
    AppendToMacro = 16,
    GetMacro = 17,
    InvalidCommand = 0xFF,
}

impl From<u8> for ConfigCommand {
    fn from(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(Self::InvalidCommand)
    }
}

/// Option flags byte shared by SET_CONFIG, GET_CONFIG and the persisted header.
#[bitfield(u8, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct ConfigFlags {
    /// Layers on which unmapped input is passed through
    #[bits(4)]
    pub unmapped_passthrough_layers: u8,
    #[bits(4)]
    _reserved: u8,
}

impl ConfigFlags {
    const PASSTHROUGH_MASK: u8 = 0b0000_1111;
    const V3_PASSTHROUGH: u8 = 0b0000_0001;

    /// Flags carrying the given pass-through mask, bits above [`NLAYERS`] are dropped.
    pub fn from_passthrough_mask(mask: u8) -> Self {
        Self::from_bits(mask & Self::PASSTHROUGH_MASK)
    }

    /// Decode a flags byte as written by the given format version.
    ///
    /// Version 3 had a single "pass through unmapped input" bit, which maps to layer 0.
    pub fn from_versioned_bits(version: u8, bits: u8) -> Self {
        if version == CONFIG_VERSION_V3 {
            let mask = if bits & Self::V3_PASSTHROUGH != 0 { 1 } else { 0 };
            Self::from_passthrough_mask(mask)
        } else {
            Self::from_passthrough_mask(bits)
        }
    }
}
