pub mod common;

mod protocol_test {
    use heapless::Vec;
    use remapper::MacroStore;
    use remapper::types::checksum;
    use remapper::types::protocol::command::{AppendToMacro, decode_mapping_reply, decode_usages_reply, is_invalid_reply};
    use remapper::types::protocol::{
        CONFIG_SIZE, CONFIG_VERSION, CONFIG_VERSION_V3, Command, ConfigCommand, ConfigFlags, ConfigSummary,
        MappingConfig, REPORT_ID_CONFIG, SetConfig, UsageRle,
    };

    use crate::common::{new_service, raw_report, reply, send};

    fn mapping(source: u32, target: u32) -> MappingConfig {
        MappingConfig {
            target_usage: target,
            source_usage: source,
            scaling: 1000,
            layer_mask: 0b0001,
            flags: 0,
        }
    }

    #[test]
    fn test_get_config_reply() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        service
            .state_mut()
            .set_our_usages(&[UsageRle::new(0x0007_0004, 10), UsageRle::new(0x000C_00E9, 2)]);
        send(&mut service, Command::AddMapping(mapping(0x0007_0004, 0x0007_0005)));
        send(&mut service, Command::GetConfig);

        let summary = ConfigSummary::decode_reply(&reply(&mut service)).unwrap();
        assert_eq!(summary.version, CONFIG_VERSION);
        assert_eq!(summary.flags.unmapped_passthrough_layers(), 0b0001);
        assert_eq!(summary.partial_scroll_timeout, 1_000_000);
        assert_eq!(summary.mapping_count, 1);
        assert_eq!(summary.our_usage_count, 2);
        assert_eq!(summary.their_usage_count, 0);
        assert_eq!(summary.interval_override, 0);
    }

    #[test]
    fn test_second_get_is_consumed() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        send(&mut service, Command::GetConfig);
        let first = reply(&mut service);
        assert_eq!(first[0], CONFIG_VERSION);

        // The pending query is one-shot, a second GET answers as NO_COMMAND
        let second = reply(&mut service);
        assert!(second[..28].iter().all(|b| *b == 0));
        assert_eq!(service.state().pending().command, ConfigCommand::NoCommand);
    }

    #[test]
    fn test_set_config() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let config = SetConfig {
            flags: ConfigFlags::from_passthrough_mask(0b0110),
            partial_scroll_timeout: 300_000,
            interval_override: 2,
        };
        send(&mut service, Command::SetConfig(config));
        assert_eq!(service.hooks().interval_updates, [2]);
        assert_eq!(service.hooks().mappings_changed, 1);

        // Same interval again does not notify
        send(&mut service, Command::SetConfig(config));
        assert_eq!(service.hooks().interval_updates, [2]);
        assert_eq!(service.hooks().mappings_changed, 2);

        send(&mut service, Command::GetConfig);
        let summary = ConfigSummary::decode_reply(&reply(&mut service)).unwrap();
        assert_eq!(summary.flags.unmapped_passthrough_layers(), 0b0110);
        assert_eq!(summary.partial_scroll_timeout, 300_000);
        assert_eq!(summary.interval_override, 2);
    }

    #[test]
    fn test_mapping_commands() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let first = mapping(0x0007_0004, 0x0007_0005);
        let second = mapping(0x0009_0001, 0x0009_0002);
        send(&mut service, Command::AddMapping(first));
        send(&mut service, Command::AddMapping(second));
        assert_eq!(service.hooks().mappings_changed, 2);
        assert_eq!(service.hooks().last_mapping_count, 2);

        send(&mut service, Command::GetMapping { index: 1 });
        assert_eq!(decode_mapping_reply(&reply(&mut service)), Some(second));

        // Out of range index yields a zeroed record
        send(&mut service, Command::GetMapping { index: 2 });
        let out_of_range = reply(&mut service);
        assert!(out_of_range[..28].iter().all(|b| *b == 0));
        assert_eq!(decode_mapping_reply(&out_of_range), Some(MappingConfig::default()));

        send(&mut service, Command::ClearMapping);
        assert!(service.state().mappings().is_empty());
        assert_eq!(service.hooks().mappings_changed, 3);
        assert_eq!(service.hooks().last_mapping_count, 0);
    }

    #[test]
    fn test_usage_pages() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let usages = [
            UsageRle::new(0x0007_0004, 26),
            UsageRle::new(0x0007_00E0, 8),
            UsageRle::new(0x000C_00E2, 1),
            UsageRle::new(0x000C_00E9, 2),
        ];
        service.state_mut().set_their_usages(&usages);

        send(&mut service, Command::GetTheirUsages { index: 0 });
        let page = decode_usages_reply(&reply(&mut service)).unwrap();
        assert_eq!(page.as_slice(), &usages[..3]);

        send(&mut service, Command::GetTheirUsages { index: 3 });
        let page = decode_usages_reply(&reply(&mut service)).unwrap();
        assert_eq!(page.as_slice(), &usages[3..]);

        send(&mut service, Command::GetOurUsages { index: 0 });
        assert!(decode_usages_reply(&reply(&mut service)).unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_report_is_invalid() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let mut report = Command::AddMapping(mapping(1, 2)).encode();
        report[4] ^= 0x10;
        service.handle_set_report(REPORT_ID_CONFIG, &report);
        assert!(service.state().mappings().is_empty());
        assert_eq!(service.hooks().mappings_changed, 0);

        let reply = reply(&mut service);
        assert!(is_invalid_reply(&reply));
        // The sentinel still carries a fresh checksum
        assert!(checksum::verify(&reply, CONFIG_SIZE));
        assert_ne!(&reply[28..], &[0xFF; 4]);
    }

    #[test]
    fn test_old_version_command_is_invalid() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let report = Command::AddMapping(mapping(1, 2)).encode_with_version(CONFIG_VERSION_V3);
        service.handle_set_report(REPORT_ID_CONFIG, &report);
        assert!(service.state().mappings().is_empty());
        assert!(is_invalid_reply(&reply(&mut service)));
    }

    #[test]
    fn test_unknown_command_is_invalid() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        service.handle_set_report(REPORT_ID_CONFIG, &raw_report(CONFIG_VERSION, 99, &[]));
        assert_eq!(service.state().pending().command, ConfigCommand::InvalidCommand);
        assert!(is_invalid_reply(&reply(&mut service)));

        // The error is consumed by the GET
        assert!(!is_invalid_reply(&reply(&mut service)));
    }

    #[test]
    fn test_short_report_ignored() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        send(&mut service, Command::GetConfig);
        let report = Command::Suspend.encode();
        service.handle_set_report(REPORT_ID_CONFIG, &report[..CONFIG_SIZE - 1]);
        assert!(!service.state().suspended());
        assert_eq!(service.state().pending().command, ConfigCommand::GetConfig);
    }

    #[test]
    fn test_later_set_overwrites_pending_query() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        send(&mut service, Command::AddMapping(mapping(1, 2)));
        send(&mut service, Command::GetMapping { index: 0 });
        send(&mut service, Command::GetConfig);
        let summary = ConfigSummary::decode_reply(&reply(&mut service)).unwrap();
        assert_eq!(summary.mapping_count, 1);
    }

    #[test]
    fn test_state_commands() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        send(&mut service, Command::Suspend);
        assert!(service.state().suspended());
        send(&mut service, Command::Resume);
        assert!(!service.state().suspended());

        send(&mut service, Command::PersistConfig);
        assert!(service.state_mut().take_persist_request());
        assert!(!service.state().persist_requested());

        send(&mut service, Command::PairNewDevice);
        send(&mut service, Command::ClearBonds);
        send(&mut service, Command::FlashBSide);
        send(&mut service, Command::ResetIntoBootsel);
        let hooks = service.hooks();
        assert_eq!((hooks.pair, hooks.clear_bonds, hooks.flash_b_side, hooks.bootsel), (1, 1, 1, 1));
    }

    #[test]
    fn test_add_mapping_on_full_table() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        for i in 0..remapper::types::protocol::MAPPING_MAX_NUM as u32 {
            send(&mut service, Command::AddMapping(mapping(i, i)));
        }
        send(&mut service, Command::AddMapping(mapping(0xFFFF, 0xFFFF)));
        assert_eq!(
            service.state().mappings().len(),
            remapper::types::protocol::MAPPING_MAX_NUM
        );
        assert_eq!(service.state().pending().command, ConfigCommand::AddMapping);
    }

    #[test]
    fn test_multiplier_report() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        let multiplier = service.report_ids().multiplier;
        service.handle_set_report(multiplier, &[0x05, 0xAA]);
        assert_eq!(service.state().resolution_multiplier(), 5);

        let mut buf = [0u8; 4];
        assert_eq!(service.handle_get_report(multiplier, &mut buf), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(service.handle_get_report(multiplier, &mut []), 0);

        service.state_mut().reset_resolution_multiplier();
        service.handle_get_report(multiplier, &mut buf);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_macro_commands() {
        let macros = MacroStore::new();
        let mut service = new_service(&macros);
        send(
            &mut service,
            Command::AppendToMacro(AppendToMacro {
                slot: 4,
                usages: Vec::from_slice(&[0x0007_0004, 0x0007_0005, 0, 0x0007_0006]).unwrap(),
            }),
        );
        assert_eq!(macros.with_slot(4, |chords| chords.len()), Some(2));

        send(&mut service, Command::ClearMacros);
        assert_eq!(macros.with_slot(4, |chords| chords.len()), Some(0));
    }
}
