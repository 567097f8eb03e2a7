//! Config protocol service, answering SET and GET feature reports.
//!
//! A SET config report carries a command. Query commands only record what was asked,
//! the answer is produced by the following GET config report, which consumes it.

mod hooks;

use remapper_types::checksum;
use remapper_types::protocol::command::{CHECKSUM_OFFSET, encode_usages_reply};
use remapper_types::protocol::{
    CONFIG_SIZE, Command, CommandError, ConfigCommand, MACRO_ITEMS_IN_PACKET, MacroPage, NUSAGES_IN_PACKET, UsageRle,
};

pub use self::hooks::{NoopHooks, RemapperHooks};
use crate::config::ReportIds;
use crate::state::{DeviceSettings, DeviceState, PendingQuery};

const INVALID_REPLY_BYTE: u8 = 0xFF;

pub struct ConfigService<'a, H: RemapperHooks> {
    state: DeviceState<'a>,
    hooks: H,
    report_ids: ReportIds,
}

impl<'a, H: RemapperHooks> ConfigService<'a, H> {
    pub fn new(state: DeviceState<'a>, hooks: H, report_ids: ReportIds) -> Self {
        Self {
            state,
            hooks,
            report_ids,
        }
    }

    pub fn state(&self) -> &DeviceState<'a> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState<'a> {
        &mut self.state
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn report_ids(&self) -> ReportIds {
        self.report_ids
    }

    /// Handle a SET feature report.
    pub fn handle_set_report(&mut self, report_id: u8, buffer: &[u8]) {
        if report_id == self.report_ids.multiplier {
            if let Some(value) = buffer.first() {
                self.state.set_resolution_multiplier(*value);
            }
        } else if report_id == self.report_ids.config {
            if buffer.len() < CONFIG_SIZE {
                warn!("Ignoring short config report, {} bytes", buffer.len());
                return;
            }
            match Command::decode(buffer) {
                Ok(command) => self.process_command(command),
                Err(e) => {
                    match e {
                        CommandError::Checksum => warn!("Config report checksum mismatch"),
                        CommandError::Version(v) => warn!("Unsupported config report version {}", v),
                        CommandError::UnknownCommand(c) => warn!("Unknown config command {}", c),
                        CommandError::Truncated(len) => warn!("Config report too short, {} bytes", len),
                    }
                    self.state.pending_mut().command = ConfigCommand::InvalidCommand;
                }
            }
        }
    }

    fn process_command(&mut self, command: Command) {
        debug!("Config command: {:?}", command.kind());
        self.state.pending_mut().command = command.kind();
        match command {
            Command::NoCommand => (),
            Command::ResetIntoBootsel => self.hooks.reset_into_bootsel(),
            Command::SetConfig(config) => {
                let settings = DeviceSettings::from(config);
                let interval_changed = settings.interval_override != self.state.settings().interval_override;
                self.state.set_settings(settings);
                if interval_changed {
                    self.hooks.interval_override_updated(settings.interval_override);
                }
                self.hooks.mappings_changed(&self.state);
            }
            Command::GetConfig => (),
            Command::ClearMapping => {
                self.state.clear_mappings();
                self.hooks.mappings_changed(&self.state);
            }
            Command::AddMapping(mapping) => {
                if !self.state.add_mapping(mapping) {
                    warn!("Mapping table is full, dropping mapping");
                }
                self.hooks.mappings_changed(&self.state);
            }
            Command::GetMapping { index } | Command::GetOurUsages { index } | Command::GetTheirUsages { index } => {
                self.state.pending_mut().requested_index = index;
            }
            Command::PersistConfig => self.state.request_persist(),
            Command::Suspend => self.state.set_suspended(true),
            Command::Resume => self.state.set_suspended(false),
            Command::PairNewDevice => self.hooks.pair_new_device(),
            Command::ClearBonds => self.hooks.clear_bonds(),
            Command::FlashBSide => self.hooks.flash_b_side(),
            Command::ClearMacros => self.state.macros().clear_all(),
            Command::AppendToMacro(append) => {
                self.state.macros().append(append.slot as usize, &append.usages);
            }
            Command::GetMacro { slot, item } => {
                let pending = self.state.pending_mut();
                pending.requested_index = slot;
                pending.requested_secondary_index = item;
            }
        }
    }

    /// Handle a GET feature report, writing the reply into `buffer`.
    ///
    /// Returns the reply length, 0 if the report is unknown or `buffer` is too small.
    pub fn handle_get_report(&mut self, report_id: u8, buffer: &mut [u8]) -> usize {
        if report_id == self.report_ids.multiplier {
            match buffer.first_mut() {
                Some(b) => {
                    *b = self.state.resolution_multiplier();
                    1
                }
                None => 0,
            }
        } else if report_id == self.report_ids.config {
            if buffer.len() < CONFIG_SIZE {
                warn!("Config reply buffer too small, {} bytes", buffer.len());
                return 0;
            }
            let reply = &mut buffer[..CONFIG_SIZE];
            reply.fill(0);
            let pending = *self.state.pending();
            self.write_reply(&pending, reply);
            checksum::stamp(reply, CONFIG_SIZE);
            *self.state.pending_mut() = PendingQuery::default();
            CONFIG_SIZE
        } else {
            0
        }
    }

    fn write_reply(&self, pending: &PendingQuery, reply: &mut [u8]) {
        match pending.command {
            ConfigCommand::InvalidCommand => reply.fill(INVALID_REPLY_BYTE),
            ConfigCommand::GetConfig => self.state.config_summary().encode_reply(reply),
            ConfigCommand::GetMapping => {
                if let Some(mapping) = self.state.mappings().get(pending.requested_index as usize) {
                    mapping.encode(&mut reply[..CHECKSUM_OFFSET]);
                }
            }
            ConfigCommand::GetOurUsages => {
                encode_usages_reply(usage_page(self.state.our_usages(), pending.requested_index), reply)
            }
            ConfigCommand::GetTheirUsages => {
                encode_usages_reply(usage_page(self.state.their_usages(), pending.requested_index), reply)
            }
            ConfigCommand::GetMacro => {
                let mut items = [0u32; MACRO_ITEMS_IN_PACKET];
                let fill = self.state.macros().paginate(
                    pending.requested_index as usize,
                    pending.requested_secondary_index as usize,
                    &mut items,
                );
                let mut page = MacroPage::default();
                // `fill.count` never exceeds the page capacity
                let _ = page.items.extend_from_slice(&items[..fill.count]);
                page.encode_reply(reply);
            }
            _ => (),
        }
    }
}

fn usage_page(usages: &[UsageRle], start: u32) -> &[UsageRle] {
    let start = (start as usize).min(usages.len());
    let end = (start + NUSAGES_IN_PACKET).min(usages.len());
    &usages[start..end]
}
