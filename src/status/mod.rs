//! # Status Reporting Module
//!
//! Observability hooks for the transfer engine.
//!
//! This module handles:
//! - Transfer outcomes (bytes sent, bytes captured, success/fail)
//! - Frame extraction outcomes (found/not found, index, declared length)
//! - CRC mismatches on prefix matches, for protocol debugging
//! - Raw capture dumps
//!
//! Sinks are optional. The engine never changes its control flow or return
//! values based on a sink, and skips building reports when none is installed.

pub mod jsonl;
pub mod logger;

pub use jsonl::JsonlSink;
pub use logger::TracingSink;

use serde::Serialize;

/// Outcome of one TX/RX cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub bytes_sent: usize,
    pub bytes_captured: usize,
    pub success: bool,
    pub elapsed_ms: u64,
}

/// Outcome of one frame extraction scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub found: bool,
    pub index: Option<usize>,
    pub expected_len: usize,
}

/// Prefix matched at `index` but the trailing CRC did not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrcMismatch {
    pub index: usize,
    pub calculated: u16,
    pub received: u16,
}

/// Receiver of transport status events
///
/// All methods default to no-ops so a sink only implements what it needs.
pub trait StatusSink: Send {
    fn on_transfer_result(&mut self, _report: &TransferReport) {}

    fn on_frame_result(&mut self, _report: &FrameReport, _frame: Option<&[u8]>) {}

    fn on_crc_mismatch(&mut self, _mismatch: &CrcMismatch) {}

    fn on_raw_dump(&mut self, _bytes: &[u8]) {}
}

/// Format bytes as space-separated uppercase hex ("01 03 02")
pub fn hex_inline(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format bytes as offset-prefixed hex lines of `per_line` bytes
pub fn hex_lines(bytes: &[u8], per_line: usize) -> Vec<String> {
    bytes
        .chunks(per_line.max(1))
        .enumerate()
        .map(|(i, chunk)| format!("{:04X}: {}", i * per_line.max(1), hex_inline(chunk)))
        .collect()
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Everything a sink was told, in order
    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Transfer(TransferReport),
        Frame(FrameReport, Option<Vec<u8>>),
        Mismatch(CrcMismatch),
        Raw(Vec<u8>),
    }

    /// Sink that records events for assertions
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub events: Arc<Mutex<Vec<Recorded>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<Recorded> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StatusSink for RecordingSink {
        fn on_transfer_result(&mut self, report: &TransferReport) {
            self.events.lock().unwrap().push(Recorded::Transfer(*report));
        }

        fn on_frame_result(&mut self, report: &FrameReport, frame: Option<&[u8]>) {
            self.events
                .lock()
                .unwrap()
                .push(Recorded::Frame(*report, frame.map(|f| f.to_vec())));
        }

        fn on_crc_mismatch(&mut self, mismatch: &CrcMismatch) {
            self.events.lock().unwrap().push(Recorded::Mismatch(*mismatch));
        }

        fn on_raw_dump(&mut self, bytes: &[u8]) {
            self.events.lock().unwrap().push(Recorded::Raw(bytes.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_inline() {
        assert_eq!(hex_inline(&[0x01, 0x03, 0xAF]), "01 03 AF");
        assert_eq!(hex_inline(&[]), "");
    }

    #[test]
    fn test_hex_lines() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let lines = hex_lines(&bytes, 16);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 00 01 02"));
        assert_eq!(lines[1], "0010: 10 11 12 13");
    }

    #[test]
    fn test_default_sink_methods_are_noops() {
        struct Silent;
        impl StatusSink for Silent {}

        let mut sink = Silent;
        sink.on_transfer_result(&TransferReport {
            bytes_sent: 8,
            bytes_captured: 0,
            success: false,
            elapsed_ms: 250,
        });
        sink.on_raw_dump(&[0x01]);
    }
}
