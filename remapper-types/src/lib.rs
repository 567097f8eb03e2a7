//! # Remapper Types
//!
//! Wire and record types shared by the remapper firmware core and host-side
//! configuration tools.
//!
//! ## Modules
//!
//! - [`checksum`] - CRC-32 integrity code used on feature reports and on the persisted blob
//! - [`protocol`] - Constants, commands and fixed-layout records of the configuration protocol
//!
//! Every record is encoded and decoded field by field at fixed byte offsets,
//! all multi-byte values little-endian.

#![no_std]

pub mod checksum;
pub mod protocol;
