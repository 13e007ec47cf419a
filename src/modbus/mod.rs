//! # Modbus RTU Module
//!
//! The Modbus RTU pieces the transport needs, and nothing more.
//!
//! This module handles:
//! - CRC-16/MODBUS checksum calculation and frame verification
//! - Prefix + CRC scanning of raw captures for fixed-length frames
//! - Register read / single register write request encoding
//! - Data-driven decoding of register blocks into scaled values

pub mod protocol;
pub mod crc;
pub mod frame;
pub mod request;
pub mod registers;
