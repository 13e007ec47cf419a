//! Status sink that renders transport events through `tracing`

use tracing::{debug, trace};

use super::{hex_inline, hex_lines, CrcMismatch, FrameReport, StatusSink, TransferReport};

/// Bytes per line in raw capture dumps
const DUMP_BYTES_PER_LINE: usize = 16;

/// Summaries at debug level, frame bytes and raw dumps at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl StatusSink for TracingSink {
    fn on_transfer_result(&mut self, report: &TransferReport) {
        debug!(
            "[RS485] TX={} bytes, RAW_RX={} bytes, status={} ({} ms)",
            report.bytes_sent,
            report.bytes_captured,
            if report.success { "OK" } else { "FAIL" },
            report.elapsed_ms
        );
    }

    fn on_frame_result(&mut self, report: &FrameReport, frame: Option<&[u8]>) {
        match report.index {
            Some(index) => debug!(
                "[RS485] Frame FOUND (expected_len={}, idx={})",
                report.expected_len, index
            ),
            None => debug!(
                "[RS485] Frame NOT FOUND (expected_len={})",
                report.expected_len
            ),
        }

        if let Some(frame) = frame {
            trace!("[RS485] Extracted frame: {}", hex_inline(frame));
        }
    }

    fn on_crc_mismatch(&mut self, mismatch: &CrcMismatch) {
        trace!(
            "[RS485] Prefix at idx={} but CRC fail: calc=0x{:04X} got=0x{:04X}",
            mismatch.index,
            mismatch.calculated,
            mismatch.received
        );
    }

    fn on_raw_dump(&mut self, bytes: &[u8]) {
        trace!("[RS485] RAW RX dump ({} bytes):", bytes.len());
        for line in hex_lines(bytes, DUMP_BYTES_PER_LINE) {
            trace!("[RS485]   {}", line);
        }
    }
}
