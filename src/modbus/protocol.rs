//! # Modbus RTU Constants
//!
//! Wire-level constants for the subset of Modbus RTU the transport speaks.
//!
//! Frame structure: `[address:1][function:1][payload:N][crc_lo:1][crc_hi:1]`

/// Read Holding Registers function code
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers function code
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Register function code
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Lowest assignable slave address
pub const MIN_SLAVE_ADDRESS: u8 = 1;

/// Highest assignable slave address
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// Address every device answers to, used when the device's own address is unknown
///
/// Only meaningful with a single device on the bus. Unlike the standard
/// broadcast address 0, the device replies.
pub const WILDCARD_ADDRESS: u8 = 0xFF;

/// Maximum registers a single read may request (byte count must fit in one byte)
pub const MAX_READ_REGISTERS: u16 = 125;

/// Read response overhead: address + function + byte count + CRC(2)
pub const READ_RESPONSE_OVERHEAD: usize = 5;

/// Read request length: address + function + start(2) + count(2) + CRC(2)
pub const READ_REQUEST_LEN: usize = 8;

/// Write Single Register request and echo length
pub const WRITE_SINGLE_FRAME_LEN: usize = 8;

/// Returns true for the read function codes the register helpers support
pub fn is_read_function(function: u8) -> bool {
    matches!(
        function,
        FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS
    )
}

/// Returns true if `address` may be assigned to a slave device
pub fn is_valid_slave_address(address: u8) -> bool {
    (MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address)
}
