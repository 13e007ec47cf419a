//! # JSONL Status Log
//!
//! Writes one JSON object per transport event, for offline protocol debugging.
//!
//! Each line carries an RFC 3339 UTC `timestamp` and an `event` tag
//! (`transfer`, `frame`, `crc_mismatch`, `raw_dump`).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{hex_inline, CrcMismatch, FrameReport, StatusSink, TransferReport};
use crate::error::Result;

/// JSON Lines status sink over any writer
pub struct JsonlSink<W: Write + Send> {
    writer: W,
    include_raw: bool,
    write_errors: u64,
}

impl JsonlSink<BufWriter<File>> {
    /// Append to the JSONL file at `path`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened for appending
    pub fn create<P: AsRef<Path>>(path: P, include_raw: bool) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file), include_raw))
    }
}

impl<W: Write + Send> JsonlSink<W> {
    /// Wrap `writer`; raw capture dumps are only written when `include_raw` is set
    pub fn new(writer: W, include_raw: bool) -> Self {
        Self {
            writer,
            include_raw,
            write_errors: 0,
        }
    }

    /// Number of events that could not be written
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn record<T: Serialize>(&mut self, event: &str, body: &T) {
        let mut line = match serde_json::to_value(body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
            Err(e) => {
                self.write_failed(&e.to_string());
                return;
            }
        };
        line.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        line.insert("event".to_string(), json!(event));

        if let Err(e) = write_line(&mut self.writer, &line) {
            self.write_failed(&e.to_string());
        }
    }

    fn write_failed(&mut self, reason: &str) {
        self.write_errors += 1;
        if self.write_errors == 1 {
            warn!("Status log write failed: {}", reason);
        }
    }
}

fn write_line<W: Write>(writer: &mut W, line: &serde_json::Map<String, Value>) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, line)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl<W: Write + Send> StatusSink for JsonlSink<W> {
    fn on_transfer_result(&mut self, report: &TransferReport) {
        self.record("transfer", report);
    }

    fn on_frame_result(&mut self, report: &FrameReport, frame: Option<&[u8]>) {
        let body = json!({
            "found": report.found,
            "index": report.index,
            "expected_len": report.expected_len,
            "frame": frame.map(hex_inline),
        });
        self.record("frame", &body);
    }

    fn on_crc_mismatch(&mut self, mismatch: &CrcMismatch) {
        self.record("crc_mismatch", mismatch);
    }

    fn on_raw_dump(&mut self, bytes: &[u8]) {
        if !self.include_raw {
            return;
        }
        let body = json!({
            "len": bytes.len(),
            "hex": hex_inline(bytes),
        });
        self.record("raw_dump", &body);
    }
}
