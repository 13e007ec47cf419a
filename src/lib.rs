//! # RS-485 Bus Library
//!
//! Half-duplex RS-485 transport for Modbus-RTU field devices.
//!
//! This library switches the transceiver direction around each transmission,
//! captures the reply by line silence and extracts the CRC-valid response
//! frame from whatever else the bus delivered.

pub mod bus;
pub mod config;
pub mod error;
pub mod modbus;
pub mod serial;
pub mod status;
