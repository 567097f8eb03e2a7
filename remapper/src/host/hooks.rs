use crate::state::DeviceState;

/// Collaborators outside the config core, notified by [`super::ConfigService`].
///
/// Every call is fire-and-forget.
pub trait RemapperHooks {
    /// The mapping table or the settings changed, derived lookup tables should be rebuilt
    fn mappings_changed(&mut self, _state: &DeviceState) {}

    /// SET_CONFIG changed the polling interval override
    fn interval_override_updated(&mut self, _interval_override: u8) {}

    fn reset_into_bootsel(&mut self) {
        warn!("Reset into bootloader is not supported");
    }

    fn pair_new_device(&mut self) {
        warn!("Pairing is not supported");
    }

    fn clear_bonds(&mut self) {
        warn!("Clearing bonds is not supported");
    }

    /// Flash the firmware of the other side of a dual-chip device
    fn flash_b_side(&mut self) {
        warn!("Flashing the B side is not supported");
    }
}

/// Hooks that ignore every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl RemapperHooks for NoopHooks {}
