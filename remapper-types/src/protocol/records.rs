//! Fixed-layout records carried by feature reports and the persisted blob.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::ConfigFlags;

/// One entry of the mapping table.
///
/// Layout (14 bytes):
/// `target_usage:u32 @0, source_usage:u32 @4, scaling:i32 @8, layer_mask:u8 @12, flags:u8 @13`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MappingConfig {
    pub target_usage: u32,
    pub source_usage: u32,
    /// Scaling factor, 1000 means 1.0
    pub scaling: i32,
    /// Layers the mapping is active on, one bit per layer.
    ///
    /// Persisted version 3 stored a single layer index here instead.
    pub layer_mask: u8,
    /// Mapping flags, see [`MappingConfig::STICKY_FLAG`]
    pub flags: u8,
}

impl MappingConfig {
    /// Encoded size of a mapping record
    pub const SIZE: usize = 14;
    /// The mapping stays active after the layer that triggered it is released
    pub const STICKY_FLAG: u8 = 0x01;

    pub fn is_sticky(&self) -> bool {
        self.flags & Self::STICKY_FLAG != 0
    }

    /// Decode a record from the first [`MappingConfig::SIZE`] bytes of `buffer`.
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            target_usage: LittleEndian::read_u32(&buffer[0..4]),
            source_usage: LittleEndian::read_u32(&buffer[4..8]),
            scaling: LittleEndian::read_i32(&buffer[8..12]),
            layer_mask: buffer[12],
            flags: buffer[13],
        })
    }

    /// Encode the record into the first [`MappingConfig::SIZE`] bytes of `buffer`.
    ///
    /// Returns the number of bytes written, `None` if the buffer is too short.
    pub fn encode(&self, buffer: &mut [u8]) -> Option<usize> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        LittleEndian::write_u32(&mut buffer[0..4], self.target_usage);
        LittleEndian::write_u32(&mut buffer[4..8], self.source_usage);
        LittleEndian::write_i32(&mut buffer[8..12], self.scaling);
        buffer[12] = self.layer_mask;
        buffer[13] = self.flags;
        Some(Self::SIZE)
    }

    /// Turn a version 3 single layer index into a layer mask.
    pub fn migrate_v3_layer(mut self) -> Self {
        self.layer_mask = 1u8.checked_shl(self.layer_mask as u32).unwrap_or(0);
        self
    }
}

/// One run of a run-length-encoded usage list: `count` consecutive usages starting at `usage`.
///
/// Layout (8 bytes): `usage:u32 @0, count:u32 @4`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsageRle {
    pub usage: u32,
    pub count: u32,
}

impl UsageRle {
    pub const SIZE: usize = 8;

    pub const fn new(usage: u32, count: u32) -> Self {
        Self { usage, count }
    }

    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            usage: LittleEndian::read_u32(&buffer[0..4]),
            count: LittleEndian::read_u32(&buffer[4..8]),
        })
    }

    pub fn encode(&self, buffer: &mut [u8]) -> Option<usize> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        LittleEndian::write_u32(&mut buffer[0..4], self.usage);
        LittleEndian::write_u32(&mut buffer[4..8], self.count);
        Some(Self::SIZE)
    }
}

/// Payload of SET_CONFIG.
///
/// Layout (6 bytes): `flags:u8 @0, partial_scroll_timeout:u32 @1, interval_override:u8 @5`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetConfig {
    pub flags: ConfigFlags,
    pub partial_scroll_timeout: u32,
    pub interval_override: u8,
}

impl SetConfig {
    pub const SIZE: usize = 6;

    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            flags: ConfigFlags::from_passthrough_mask(buffer[0]),
            partial_scroll_timeout: LittleEndian::read_u32(&buffer[1..5]),
            interval_override: buffer[5],
        })
    }

    pub fn encode(&self, buffer: &mut [u8]) -> Option<usize> {
        if buffer.len() < Self::SIZE {
            return None;
        }
        buffer[0] = self.flags.into_bits();
        LittleEndian::write_u32(&mut buffer[1..5], self.partial_scroll_timeout);
        buffer[5] = self.interval_override;
        Some(Self::SIZE)
    }
}
