//! # Remapper
//!
//! Configuration core of a HID remapper: the config feature report protocol, the
//! mapping table and device settings, the macro store and the persisted config blob.
//!
//! The transport (USB or BLE) owns a [`host::ConfigService`] and forwards every SET and
//! GET feature report to it. A separate task drives [`storage::Storage`] to load the
//! config at boot and to write it back when the host sends PERSIST_CONFIG.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![no_std]

#[macro_use]
mod fmt;

pub mod config;
pub mod host;
pub mod keyboard_macros;
pub mod persist;
pub mod state;
#[cfg(feature = "storage")]
pub mod storage;

pub use remapper_types as types;

pub use crate::config::{RemapperConfig, ReportIds, StorageConfig};
pub use crate::host::{ConfigService, NoopHooks, RemapperHooks};
pub use crate::keyboard_macros::MacroStore;
pub use crate::state::DeviceState;

/// Mutex type used by the core
pub type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
