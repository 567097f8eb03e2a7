//! SET config report commands and GET config reply layouts.
//!
//! A SET config report is `[version:1][command:1][data:26][crc32:4]`. Replies
//! use the same size, payload at offset 0 and a crc32 in the last 4 bytes.

use byteorder::{ByteOrder, LittleEndian};
use heapless::Vec;

use super::records::{MappingConfig, SetConfig, UsageRle};
use super::{CONFIG_SIZE, CONFIG_VERSION, ConfigCommand, ConfigFlags, MACRO_ITEMS_IN_PACKET, NUSAGES_IN_PACKET};
use crate::checksum::{self, CHECKSUM_SIZE};

const VERSION_OFFSET: usize = 0;
const COMMAND_OFFSET: usize = 1;
const DATA_OFFSET: usize = 2;
/// Offset of the crc32 in both SET reports and GET replies
pub const CHECKSUM_OFFSET: usize = CONFIG_SIZE - CHECKSUM_SIZE;

/// Reason a SET config report was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Report shorter than [`CONFIG_SIZE`]
    Truncated(usize),
    /// crc32 mismatch
    Checksum,
    /// Embedded version is not [`CONFIG_VERSION`]
    Version(u8),
    /// Command byte has no known command
    UnknownCommand(u8),
}

/// Payload of APPEND_TO_MACRO.
///
/// Layout: `macro:u8 @2, nitems:u8 @3, usages:[u32; 6] @4`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppendToMacro {
    pub slot: u8,
    /// Usages to append, [`super::CHORD_SEPARATOR`] starts a new chord
    pub usages: Vec<u32, MACRO_ITEMS_IN_PACKET>,
}

/// A decoded SET config report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    NoCommand,
    ResetIntoBootsel,
    SetConfig(SetConfig),
    GetConfig,
    ClearMapping,
    AddMapping(MappingConfig),
    GetMapping { index: u32 },
    PersistConfig,
    GetOurUsages { index: u32 },
    GetTheirUsages { index: u32 },
    Suspend,
    Resume,
    PairNewDevice,
    ClearBonds,
    FlashBSide,
    ClearMacros,
    AppendToMacro(AppendToMacro),
    GetMacro { slot: u32, item: u32 },
}

impl Command {
    /// The command code of this command
    pub fn kind(&self) -> ConfigCommand {
        match self {
            Command::NoCommand => ConfigCommand::NoCommand,
            Command::ResetIntoBootsel => ConfigCommand::ResetIntoBootsel,
            Command::SetConfig(_) => ConfigCommand::SetConfig,
            Command::GetConfig => ConfigCommand::GetConfig,
            Command::ClearMapping => ConfigCommand::ClearMapping,
            Command::AddMapping(_) => ConfigCommand::AddMapping,
            Command::GetMapping { .. } => ConfigCommand::GetMapping,
            Command::PersistConfig => ConfigCommand::PersistConfig,
            Command::GetOurUsages { .. } => ConfigCommand::GetOurUsages,
            Command::GetTheirUsages { .. } => ConfigCommand::GetTheirUsages,
            Command::Suspend => ConfigCommand::Suspend,
            Command::Resume => ConfigCommand::Resume,
            Command::PairNewDevice => ConfigCommand::PairNewDevice,
            Command::ClearBonds => ConfigCommand::ClearBonds,
            Command::FlashBSide => ConfigCommand::FlashBSide,
            Command::ClearMacros => ConfigCommand::ClearMacros,
            Command::AppendToMacro(_) => ConfigCommand::AppendToMacro,
            Command::GetMacro { .. } => ConfigCommand::GetMacro,
        }
    }

    /// Validate and decode a SET config report.
    ///
    /// The checksum is checked first, then the version, which must be the current
    /// [`CONFIG_VERSION`] exactly, then the command byte.
    pub fn decode(report: &[u8]) -> Result<Self, CommandError> {
        if report.len() < CONFIG_SIZE {
            return Err(CommandError::Truncated(report.len()));
        }
        if !checksum::verify(report, CONFIG_SIZE) {
            return Err(CommandError::Checksum);
        }
        let version = report[VERSION_OFFSET];
        if version != CONFIG_VERSION {
            return Err(CommandError::Version(version));
        }

        let command_byte = report[COMMAND_OFFSET];
        let data = &report[DATA_OFFSET..CHECKSUM_OFFSET];
        let command = match ConfigCommand::from(command_byte) {
            ConfigCommand::NoCommand => Command::NoCommand,
            ConfigCommand::ResetIntoBootsel => Command::ResetIntoBootsel,
            ConfigCommand::SetConfig => {
                // `data` is 26 bytes, every payload fits
                Command::SetConfig(SetConfig::decode(data).ok_or(CommandError::Truncated(report.len()))?)
            }
            ConfigCommand::GetConfig => Command::GetConfig,
            ConfigCommand::ClearMapping => Command::ClearMapping,
            ConfigCommand::AddMapping => {
                Command::AddMapping(MappingConfig::decode(data).ok_or(CommandError::Truncated(report.len()))?)
            }
            ConfigCommand::GetMapping => Command::GetMapping {
                index: LittleEndian::read_u32(&data[0..4]),
            },
            ConfigCommand::PersistConfig => Command::PersistConfig,
            ConfigCommand::GetOurUsages => Command::GetOurUsages {
                index: LittleEndian::read_u32(&data[0..4]),
            },
            ConfigCommand::GetTheirUsages => Command::GetTheirUsages {
                index: LittleEndian::read_u32(&data[0..4]),
            },
            ConfigCommand::Suspend => Command::Suspend,
            ConfigCommand::Resume => Command::Resume,
            ConfigCommand::PairNewDevice => Command::PairNewDevice,
            ConfigCommand::ClearBonds => Command::ClearBonds,
            ConfigCommand::FlashBSide => Command::FlashBSide,
            ConfigCommand::ClearMacros => Command::ClearMacros,
            ConfigCommand::AppendToMacro => {
                let slot = data[0];
                let nitems = (data[1] as usize).min(MACRO_ITEMS_IN_PACKET);
                let mut usages = Vec::new();
                for chunk in data[2..2 + nitems * 4].chunks_exact(4) {
                    // Capacity is MACRO_ITEMS_IN_PACKET and nitems is clamped to it
                    let _ = usages.push(LittleEndian::read_u32(chunk));
                }
                Command::AppendToMacro(AppendToMacro { slot, usages })
            }
            ConfigCommand::GetMacro => Command::GetMacro {
                slot: LittleEndian::read_u32(&data[0..4]),
                item: LittleEndian::read_u32(&data[4..8]),
            },
            ConfigCommand::InvalidCommand => return Err(CommandError::UnknownCommand(command_byte)),
        };
        Ok(command)
    }

    /// Build a checksum-stamped SET config report carrying the current version.
    pub fn encode(&self) -> [u8; CONFIG_SIZE] {
        self.encode_with_version(CONFIG_VERSION)
    }

    /// Build a checksum-stamped SET config report carrying an arbitrary version byte.
    pub fn encode_with_version(&self, version: u8) -> [u8; CONFIG_SIZE] {
        let mut report = [0u8; CONFIG_SIZE];
        report[VERSION_OFFSET] = version;
        report[COMMAND_OFFSET] = self.kind() as u8;
        let data = &mut report[DATA_OFFSET..CHECKSUM_OFFSET];
        match self {
            Command::SetConfig(config) => {
                config.encode(data);
            }
            Command::AddMapping(mapping) => {
                mapping.encode(data);
            }
            Command::GetMapping { index } | Command::GetOurUsages { index } | Command::GetTheirUsages { index } => {
                LittleEndian::write_u32(&mut data[0..4], *index);
            }
            Command::AppendToMacro(append) => {
                data[0] = append.slot;
                data[1] = append.usages.len() as u8;
                for (chunk, usage) in data[2..].chunks_exact_mut(4).zip(append.usages.iter()) {
                    LittleEndian::write_u32(chunk, *usage);
                }
            }
            Command::GetMacro { slot, item } => {
                LittleEndian::write_u32(&mut data[0..4], *slot);
                LittleEndian::write_u32(&mut data[4..8], *item);
            }
            _ => (),
        }
        checksum::stamp(&mut report, CONFIG_SIZE);
        report
    }
}

/// GET_CONFIG reply.
///
/// Layout: `version @0, flags @1, partial_scroll_timeout:u32 @2, mapping_count:u32 @6,
/// our_usage_count:u32 @10, their_usage_count:u32 @14, interval_override @18`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigSummary {
    pub version: u8,
    pub flags: ConfigFlags,
    pub partial_scroll_timeout: u32,
    pub mapping_count: u32,
    pub our_usage_count: u32,
    pub their_usage_count: u32,
    pub interval_override: u8,
}

impl ConfigSummary {
    pub fn encode_reply(&self, reply: &mut [u8]) {
        reply[0] = self.version;
        reply[1] = self.flags.into_bits();
        LittleEndian::write_u32(&mut reply[2..6], self.partial_scroll_timeout);
        LittleEndian::write_u32(&mut reply[6..10], self.mapping_count);
        LittleEndian::write_u32(&mut reply[10..14], self.our_usage_count);
        LittleEndian::write_u32(&mut reply[14..18], self.their_usage_count);
        reply[18] = self.interval_override;
    }

    /// Decode a GET_CONFIG reply, `None` if it is short or its checksum is bad.
    pub fn decode_reply(reply: &[u8]) -> Option<Self> {
        if !checksum::verify(reply, CONFIG_SIZE) {
            return None;
        }
        Some(Self {
            version: reply[0],
            flags: ConfigFlags::from_bits(reply[1]),
            partial_scroll_timeout: LittleEndian::read_u32(&reply[2..6]),
            mapping_count: LittleEndian::read_u32(&reply[6..10]),
            our_usage_count: LittleEndian::read_u32(&reply[10..14]),
            their_usage_count: LittleEndian::read_u32(&reply[14..18]),
            interval_override: reply[18],
        })
    }
}

/// GET_MACRO reply: a page of the flattened, zero-separated macro.
///
/// Layout: `nitems:u8 @0, usages:[u32; 6] @1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacroPage {
    pub items: Vec<u32, MACRO_ITEMS_IN_PACKET>,
}

impl MacroPage {
    pub fn encode_reply(&self, reply: &mut [u8]) {
        reply[0] = self.items.len() as u8;
        for (chunk, usage) in reply[1..1 + MACRO_ITEMS_IN_PACKET * 4]
            .chunks_exact_mut(4)
            .zip(self.items.iter())
        {
            LittleEndian::write_u32(chunk, *usage);
        }
    }

    pub fn decode_reply(reply: &[u8]) -> Option<Self> {
        if !checksum::verify(reply, CONFIG_SIZE) {
            return None;
        }
        let nitems = (reply[0] as usize).min(MACRO_ITEMS_IN_PACKET);
        let mut items = Vec::new();
        for chunk in reply[1..1 + nitems * 4].chunks_exact(4) {
            let _ = items.push(LittleEndian::read_u32(chunk));
        }
        Some(Self { items })
    }
}

/// Write up to [`NUSAGES_IN_PACKET`] RLE entries into a GET_OUR_USAGES/GET_THEIR_USAGES reply.
pub fn encode_usages_reply(entries: &[UsageRle], reply: &mut [u8]) {
    for (chunk, entry) in reply[..NUSAGES_IN_PACKET * UsageRle::SIZE]
        .chunks_exact_mut(UsageRle::SIZE)
        .zip(entries.iter())
    {
        entry.encode(chunk);
    }
}

/// Decode a GET_OUR_USAGES/GET_THEIR_USAGES reply, skipping unused (zero usage) entries.
pub fn decode_usages_reply(reply: &[u8]) -> Option<Vec<UsageRle, NUSAGES_IN_PACKET>> {
    if !checksum::verify(reply, CONFIG_SIZE) {
        return None;
    }
    let mut entries = Vec::new();
    for chunk in reply[..NUSAGES_IN_PACKET * UsageRle::SIZE].chunks_exact(UsageRle::SIZE) {
        if let Some(entry) = UsageRle::decode(chunk) {
            if entry.usage != 0 {
                let _ = entries.push(entry);
            }
        }
    }
    Some(entries)
}

/// Decode a GET_MAPPING reply. An out-of-range request yields an all-zero record.
pub fn decode_mapping_reply(reply: &[u8]) -> Option<MappingConfig> {
    if !checksum::verify(reply, CONFIG_SIZE) {
        return None;
    }
    MappingConfig::decode(reply)
}

/// Whether a reply is the all-ones "invalid command" sentinel
pub fn is_invalid_reply(reply: &[u8]) -> bool {
    reply.len() >= CONFIG_SIZE && reply[..CHECKSUM_OFFSET].iter().all(|b| *b == 0xFF)
}
