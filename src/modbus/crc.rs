//! # CRC-16/MODBUS Implementation
//!
//! CRC-16 checksum calculation for Modbus RTU frames.
//!
//! **Polynomial**: 0xA001 (reflected form of 0x8005)
//! **Initial Value**: 0xFFFF
//!
//! On the wire the CRC follows the frame body low byte first.

/// Reflected CRC-16/MODBUS polynomial
const CRC16_POLY: u16 = 0xA001;

/// CRC-16/MODBUS initial register value
const CRC16_INIT: u16 = 0xFFFF;

/// Number of trailing CRC bytes in an RTU frame
pub const CRC_LEN: usize = 2;

/// Shortest frame `verify_frame` accepts: one body byte plus the CRC
pub const MIN_VERIFIABLE_LEN: usize = 3;

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the CRC-16/MODBUS checksum of `data` using the lookup table
///
/// # Examples
///
/// ```
/// use rs485_bus::modbus::crc::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x4B37);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0x00FF) as usize];
    }

    crc
}

/// Calculate CRC-16/MODBUS bit by bit (slow, for verification)
#[allow(dead_code)]
fn crc16_slow(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in data {
        crc ^= byte as u16;

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Return `(calculated, received)` CRC values for a complete frame
///
/// The received value is the trailing two bytes read little-endian.
/// Returns `None` when the frame is too short to carry a CRC.
pub fn frame_crc(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < MIN_VERIFIABLE_LEN {
        return None;
    }

    let body_len = frame.len() - CRC_LEN;
    let calculated = crc16(&frame[..body_len]);
    let received = u16::from_le_bytes([frame[body_len], frame[body_len + 1]]);

    Some((calculated, received))
}

/// Verify the trailing CRC of a complete RTU frame
///
/// Fails closed: frames shorter than 3 bytes are never valid.
///
/// # Examples
///
/// ```
/// use rs485_bus::modbus::crc::verify_frame;
///
/// assert!(verify_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]));
/// assert!(!verify_frame(&[0x01, 0x03]));
/// ```
pub fn verify_frame(frame: &[u8]) -> bool {
    matches!(frame_crc(frame), Some((calculated, received)) if calculated == received)
}

/// Copy `body` and append its CRC (low byte first)
pub fn append_crc(body: &[u8]) -> Vec<u8> {
    let crc = crc16(body);
    let mut frame = Vec::with_capacity(body.len() + CRC_LEN);
    frame.extend_from_slice(body);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}
