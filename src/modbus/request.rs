//! # Modbus RTU Request Encoder
//!
//! Builds the two request types shared by every device driver on the bus:
//! register block reads (FC03/FC04) and single register writes (FC06).

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::{crc16, CRC_LEN};
use super::protocol::*;
use crate::error::{Rs485Error, Result};

/// Register block read (Read Holding / Read Input Registers)
///
/// Only constructed through `new`, so the count always fits a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    address: u8,
    function: u8,
    start: u16,
    count: u16,
}

impl ReadRequest {
    /// Create a validated read request
    ///
    /// # Errors
    ///
    /// Returns `Protocol` error if the address, function or count is out of range
    pub fn new(address: u8, function: u8, start: u16, count: u16) -> Result<Self> {
        if !is_valid_slave_address(address) {
            return Err(Rs485Error::Protocol(format!(
                "slave address {} out of range {}..={}",
                address, MIN_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS
            )));
        }

        if !is_read_function(function) {
            return Err(Rs485Error::Protocol(format!(
                "function 0x{:02X} is not a register read",
                function
            )));
        }

        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(Rs485Error::Protocol(format!(
                "register count {} out of range 1..={}",
                count, MAX_READ_REGISTERS
            )));
        }

        Ok(Self {
            address,
            function,
            start,
            count,
        })
    }

    /// Read Holding Registers shorthand
    pub fn holding(address: u8, start: u16, count: u16) -> Result<Self> {
        Self::new(address, FC_READ_HOLDING_REGISTERS, start, count)
    }

    /// Read Input Registers shorthand
    pub fn input(address: u8, start: u16, count: u16) -> Result<Self> {
        Self::new(address, FC_READ_INPUT_REGISTERS, start, count)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn function(&self) -> u8 {
        self.function
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Encode the request frame, CRC included
    ///
    /// # Examples
    ///
    /// ```
    /// use rs485_bus::modbus::request::ReadRequest;
    ///
    /// let request = ReadRequest::holding(0x01, 0x0000, 1).unwrap();
    /// assert_eq!(&request.encode()[..], &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    /// ```
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(READ_REQUEST_LEN);
        buf.put_u8(self.address);
        buf.put_u8(self.function);
        buf.put_u16(self.start);
        buf.put_u16(self.count);
        put_crc(&mut buf);
        buf.freeze()
    }

    /// Number of payload bytes the response carries
    pub fn byte_count(&self) -> u8 {
        // count <= 125, enforced by new()
        (self.count * 2) as u8
    }

    /// Leading bytes of a normal response: address, function, byte count
    pub fn response_prefix(&self) -> [u8; 3] {
        [self.address, self.function, self.byte_count()]
    }

    /// Total length of a normal response frame
    pub fn response_len(&self) -> usize {
        READ_RESPONSE_OVERHEAD + self.byte_count() as usize
    }
}

/// Write Single Register (FC06), e.g. an address-change command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSingleRegister {
    address: u8,
    register: u16,
    value: u16,
}

impl WriteSingleRegister {
    /// Create a validated write request
    ///
    /// # Errors
    ///
    /// Returns `Protocol` error if the slave address is out of range
    pub fn new(address: u8, register: u16, value: u16) -> Result<Self> {
        if !is_valid_slave_address(address) {
            return Err(Rs485Error::Protocol(format!(
                "slave address {} out of range {}..={}",
                address, MIN_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS
            )));
        }

        Ok(Self {
            address,
            register,
            value,
        })
    }

    /// Write addressed to `WILDCARD_ADDRESS`
    ///
    /// Reaches a device whose address is unknown, typically to assign it a
    /// new one. The device echoes the frame with the wildcard address.
    pub fn broadcast(register: u16, value: u16) -> Self {
        Self {
            address: WILDCARD_ADDRESS,
            register,
            value,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn register(&self) -> u16 {
        self.register
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Encode the request frame, CRC included
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WRITE_SINGLE_FRAME_LEN);
        buf.put_u8(self.address);
        buf.put_u8(FC_WRITE_SINGLE_REGISTER);
        buf.put_u16(self.register);
        buf.put_u16(self.value);
        put_crc(&mut buf);
        buf.freeze()
    }

    /// The device echoes the request; address, function and register are matched
    pub fn response_prefix(&self) -> [u8; 4] {
        let [register_hi, register_lo] = self.register.to_be_bytes();
        [self.address, FC_WRITE_SINGLE_REGISTER, register_hi, register_lo]
    }

    /// Length of the echoed response
    pub fn response_len(&self) -> usize {
        WRITE_SINGLE_FRAME_LEN
    }
}

/// Append the CRC of everything already in `buf`, low byte first
fn put_crc(buf: &mut BytesMut) {
    let crc = crc16(&buf[..]);
    buf.reserve(CRC_LEN);
    buf.put_u16_le(crc);
}
