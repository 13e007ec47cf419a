//! # Register Access Helpers
//!
//! The generic read/write operations every device driver is built from.
//! A device is described as data (`ReadRequest` + `ScaledField`s); these
//! helpers do the transfer, extraction and decoding.

use super::{Rs485Bus, RxTimeouts};
use crate::error::{Rs485Error, Result};
use crate::modbus::protocol::WRITE_SINGLE_FRAME_LEN;
use crate::modbus::registers::{decode_fields, response_words, Reading, ScaledField};
use crate::modbus::request::{ReadRequest, WriteSingleRegister};
use crate::serial::ByteChannel;
use crate::status::hex_inline;

impl<C: ByteChannel> Rs485Bus<C> {
    /// Read a register block and return its words
    ///
    /// # Errors
    ///
    /// Any transfer or extraction error, or `Protocol` if the reply is malformed
    pub fn read_registers(
        &mut self,
        request: &ReadRequest,
        timeouts: RxTimeouts,
    ) -> Result<Vec<u16>> {
        let expected_len = request.response_len();
        let mut frame = vec![0u8; expected_len];

        self.transfer_and_extract(
            &request.encode(),
            &request.response_prefix(),
            expected_len,
            &mut frame,
            timeouts,
        )?;

        response_words(&frame)
    }

    /// Write one register and check the device's echo
    ///
    /// # Errors
    ///
    /// Any transfer or extraction error, or `Protocol` if the echo differs
    /// from the request
    pub fn write_register(
        &mut self,
        request: &WriteSingleRegister,
        timeouts: RxTimeouts,
    ) -> Result<()> {
        let tx = request.encode();
        let mut echo = [0u8; WRITE_SINGLE_FRAME_LEN];

        self.transfer_and_extract(
            &tx,
            &request.response_prefix(),
            request.response_len(),
            &mut echo,
            timeouts,
        )?;

        if echo[..] != tx[..] {
            return Err(Rs485Error::Protocol(format!(
                "write echo mismatch: sent {}, got {}",
                hex_inline(&tx),
                hex_inline(&echo)
            )));
        }
        Ok(())
    }

    /// Read a register block and decode it into range-checked values
    ///
    /// # Errors
    ///
    /// Any `read_registers` error, `Protocol` if a field lies outside the
    /// block, `OutOfRange` if a value is implausible
    pub fn read_scaled(
        &mut self,
        request: &ReadRequest,
        fields: &[ScaledField],
        timeouts: RxTimeouts,
    ) -> Result<Vec<Reading>> {
        let words = self.read_registers(request, timeouts)?;
        decode_fields(&words, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Timing;
    use crate::modbus::crc::append_crc;
    use crate::modbus::registers::FieldKind;
    use crate::serial::port_trait::mocks::ScriptedChannel;
    use std::time::Duration;

    fn bus_with(channel: &ScriptedChannel) -> Rs485Bus<ScriptedChannel> {
        let mut bus = Rs485Bus::new();
        bus.configure(channel.clone(), Timing::default()).unwrap();
        bus
    }

    #[test]
    fn test_read_registers() {
        let channel = ScriptedChannel::new();
        channel.reply_after(
            Duration::from_millis(5),
            &[0x01, 0x03, 0x04, 0x02, 0x92, 0xFF, 0x9B, 0x5A, 0x3D],
        );
        let mut bus = bus_with(&channel);

        let request = ReadRequest::holding(0x01, 0x0000, 2).unwrap();
        let words = bus.read_registers(&request, RxTimeouts::default()).unwrap();

        assert_eq!(words, vec![0x0292, 0xFF9B]);
        assert_eq!(
            channel.get_written_data(),
            vec![vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]]
        );
    }

    #[test]
    fn test_read_ignores_reply_from_other_address() {
        let channel = ScriptedChannel::new();
        // Address 2 answers with a valid frame; we asked address 1
        channel.reply_after(
            Duration::from_millis(5),
            &[0x02, 0x03, 0x02, 0x01, 0x2C, 0xFC, 0x09],
        );
        let mut bus = bus_with(&channel);

        let request = ReadRequest::holding(0x01, 0x0000, 1).unwrap();
        let result = bus.read_registers(&request, RxTimeouts::default());
        assert!(matches!(result, Err(Rs485Error::FrameNotFound { .. })));
    }

    #[test]
    fn test_read_scaled() {
        let channel = ScriptedChannel::new();
        channel.reply_after(
            Duration::from_millis(5),
            &[0x01, 0x03, 0x04, 0x02, 0x92, 0xFF, 0x9B, 0x5A, 0x3D],
        );
        let mut bus = bus_with(&channel);

        let request = ReadRequest::holding(0x01, 0x0000, 2).unwrap();
        let fields = vec![
            ScaledField::new("humidity_pct", 0, FieldKind::U16)
                .with_scale(0.1)
                .with_range(0.0, 100.0),
            ScaledField::new("temperature_c", 1, FieldKind::I16)
                .with_scale(0.1)
                .with_range(-40.0, 80.0),
        ];

        let readings = bus
            .read_scaled(&request, &fields, RxTimeouts::default())
            .unwrap();
        assert!((readings[0].value - 65.8).abs() < 0.001);
        assert!((readings[1].value + 10.1).abs() < 0.001);
    }

    #[test]
    fn test_read_scaled_rejects_implausible_value() {
        let channel = ScriptedChannel::new();
        // 0x07D0 = 2000 -> 200.0 %
        channel.reply_after(
            Duration::from_millis(5),
            &append_crc(&[0x01, 0x03, 0x02, 0x07, 0xD0]),
        );
        let mut bus = bus_with(&channel);

        let request = ReadRequest::holding(0x01, 0x0000, 1).unwrap();
        let fields = vec![ScaledField::new("humidity_pct", 0, FieldKind::U16)
            .with_scale(0.1)
            .with_range(0.0, 100.0)];

        let result = bus.read_scaled(&request, &fields, RxTimeouts::default());
        assert!(matches!(result, Err(Rs485Error::OutOfRange { .. })));
    }

    #[test]
    fn test_write_register_accepts_echo() {
        let request = WriteSingleRegister::new(0x01, 0x0100, 0x0002).unwrap();
        let channel = ScriptedChannel::new();
        channel.reply_after(Duration::from_millis(5), &request.encode());
        let mut bus = bus_with(&channel);

        bus.write_register(&request, RxTimeouts::from_millis(500, 25))
            .unwrap();
    }

    #[test]
    fn test_wildcard_address_change_round_trip() {
        let request = WriteSingleRegister::broadcast(0x0200, 0x0005);
        let channel = ScriptedChannel::new();
        channel.reply_after(
            Duration::from_millis(5),
            &append_crc(&[0xFF, 0x06, 0x02, 0x00, 0x00, 0x05]),
        );
        let mut bus = bus_with(&channel);

        bus.write_register(&request, RxTimeouts::from_millis(500, 50))
            .unwrap();
        assert_eq!(channel.get_written_data(), vec![request.encode().to_vec()]);
    }

    #[test]
    fn test_write_register_rejects_different_echo() {
        let request = WriteSingleRegister::new(0x01, 0x0100, 0x0002).unwrap();
        let channel = ScriptedChannel::new();
        channel.reply_after(
            Duration::from_millis(5),
            &append_crc(&[0x01, 0x06, 0x01, 0x00, 0x00, 0x03]),
        );
        let mut bus = bus_with(&channel);

        let result = bus.write_register(&request, RxTimeouts::default());
        assert!(matches!(result, Err(Rs485Error::Protocol(_))));
    }

    #[test]
    fn test_silent_device() {
        let channel = ScriptedChannel::new();
        channel.no_reply();
        let mut bus = bus_with(&channel);

        let request = ReadRequest::holding(0x05, 0x0000, 1).unwrap();
        let result = bus.read_registers(&request, RxTimeouts::from_millis(30, 10));
        assert!(matches!(result, Err(Rs485Error::NoResponse)));
    }
}
