//! CRC-32 checksum utilities for data integrity verification.
//!
//! Both the config feature report and the persisted blob carry a trailing
//! little-endian CRC-32 over every preceding byte.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;

/// Size of the trailing checksum field
pub const CHECKSUM_SIZE: usize = 4;

/// Standard CRC-32 (IEEE) over `data`.
pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Check the checksum stored in the last 4 bytes of `buffer[..total_len]`.
///
/// Returns false when `total_len` cannot hold a checksum or exceeds the buffer.
pub fn verify(buffer: &[u8], total_len: usize) -> bool {
    if total_len < CHECKSUM_SIZE || total_len > buffer.len() {
        return false;
    }
    let data_end = total_len - CHECKSUM_SIZE;
    let stored = LittleEndian::read_u32(&buffer[data_end..total_len]);
    checksum(&buffer[..data_end]) == stored
}

/// Write the checksum of `buffer[..total_len - 4]` into `buffer[total_len - 4..total_len]`.
pub fn stamp(buffer: &mut [u8], total_len: usize) {
    debug_assert!(total_len >= CHECKSUM_SIZE && total_len <= buffer.len());
    let data_end = total_len - CHECKSUM_SIZE;
    let crc = checksum(&buffer[..data_end]);
    LittleEndian::write_u32(&mut buffer[data_end..total_len], crc);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_checksum_known_value() {
        // CRC-32 check value from the catalogue of parametrised CRC algorithms
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
        assert_eq!(checksum(b""), 0);
    }

    #[test]
    fn test_stamp_then_verify() {
        let mut buf = [0u8; 32];
        buf[0] = 4;
        buf[1] = 3;
        stamp(&mut buf, 32);
        assert!(verify(&buf, 32));
        assert_eq!(LittleEndian::read_u32(&buf[28..32]), checksum(&buf[..28]));
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut buf = [0x5Au8; 16];
        stamp(&mut buf, 16);
        for i in 0..16 {
            let mut corrupted = buf;
            corrupted[i] ^= 0x01;
            assert!(!verify(&corrupted, 16), "corruption at byte {} not detected", i);
        }
    }

    #[test]
    fn test_verify_rejects_bad_lengths() {
        let buf = [0u8; 8];
        assert!(!verify(&buf, 3));
        assert!(!verify(&buf, 9));
    }

    #[test]
    fn test_verify_uses_prefix_only() {
        let mut buf = [0u8; 40];
        stamp(&mut buf, 32);
        buf[35] = 0xAA;
        assert!(verify(&buf, 32));
    }
}
