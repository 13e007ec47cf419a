//! # RS-485 Transfer Engine
//!
//! One blocking request/response cycle on a half-duplex bus.
//!
//! This module handles:
//! - Flushing stale input before every request
//! - Direction switching with guard delays around the transmission
//! - Capturing the reply into a fixed-capacity buffer under two timeouts
//! - Extracting a fixed-length, CRC-valid frame from the capture
//!
//! RTU has no frame terminator, so the end of a reply is inferred from
//! silence: once bytes have started arriving, a gap of `inter_byte` ends the
//! capture. A slow byte in the middle of a frame therefore truncates it; this
//! is the RTU timing contract, not something to work around here. The
//! `overall` timeout bounds the wait when nobody answers at all.
//!
//! The engine performs exactly one attempt per call. Retries belong to the
//! caller. Transfer and frame outcomes are only logged through the status
//! sink; install a `TracingSink` to see them. Every I/O method takes `&mut self`, so one instance can never have
//! two transfers in flight.

pub mod capture;
pub mod device;

pub use capture::CaptureBuffer;

use std::fmt;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Rs485Error, Result};
use crate::modbus::frame::{check_frame_request, prefix_candidates};
use crate::serial::{ByteChannel, DirectionControl};
use crate::status::{hex_inline, CrcMismatch, FrameReport, StatusSink, TransferReport};

/// Default raw capture capacity in bytes
pub const DEFAULT_RX_BUFFER_SIZE: usize = 512;

/// Default guard time on each side of a direction switch
pub const DEFAULT_GUARD_DELAY: Duration = Duration::from_micros(200);

/// Default bound on the whole receive phase
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Default silence that ends a started reply
pub const DEFAULT_INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(25);

/// Pause after each discarded byte while flushing, so a byte still on the wire is caught
const FLUSH_GRACE: Duration = Duration::from_millis(1);

/// Sleep between idle polls of the channel; also the loop's yield point
const RX_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Guard delays around the direction switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Between asserting transmit and the first byte
    pub pre_tx_delay: Duration,
    /// Between the last byte leaving the UART and releasing transmit
    pub post_tx_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            pre_tx_delay: DEFAULT_GUARD_DELAY,
            post_tx_delay: DEFAULT_GUARD_DELAY,
        }
    }
}

impl Timing {
    pub fn from_micros(pre_tx_us: u64, post_tx_us: u64) -> Self {
        Self {
            pre_tx_delay: Duration::from_micros(pre_tx_us),
            post_tx_delay: Duration::from_micros(post_tx_us),
        }
    }
}

/// Receive deadlines for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxTimeouts {
    /// Maximum time spent in the receive phase
    pub overall: Duration,
    /// Silence after the last byte that ends the capture
    pub inter_byte: Duration,
}

impl Default for RxTimeouts {
    fn default() -> Self {
        Self {
            overall: DEFAULT_OVERALL_TIMEOUT,
            inter_byte: DEFAULT_INTER_BYTE_TIMEOUT,
        }
    }
}

impl RxTimeouts {
    pub fn from_millis(overall_ms: u64, inter_byte_ms: u64) -> Self {
        Self {
            overall: Duration::from_millis(overall_ms),
            inter_byte: Duration::from_millis(inter_byte_ms),
        }
    }
}

/// Single-master transport over one RS-485 bus
///
/// Owns its byte channel, direction line and capture buffer. Must not be
/// shared between threads without external exclusion; several instances can
/// drive several independent buses.
pub struct Rs485Bus<C> {
    channel: Option<C>,
    direction: DirectionControl,
    timing: Timing,
    capture: CaptureBuffer,
    sink: Option<Box<dyn StatusSink>>,
}

impl<C> fmt::Debug for Rs485Bus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rs485Bus")
            .field("configured", &self.channel.is_some())
            .field("direction", &self.direction)
            .field("timing", &self.timing)
            .field("captured", &self.capture.len())
            .field("capacity", &self.capture.capacity())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl<C: ByteChannel> Default for Rs485Bus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ByteChannel> Rs485Bus<C> {
    /// Unbound engine with the default capture capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RX_BUFFER_SIZE)
    }

    /// Unbound engine whose capture holds at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channel: None,
            direction: DirectionControl::Disabled,
            timing: Timing::default(),
            capture: CaptureBuffer::with_capacity(capacity),
            sink: None,
        }
    }

    /// Bind the byte channel and guard timings
    ///
    /// Replaces any previous binding. The direction line is put into receive
    /// state and stale input is discarded.
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the direction line or the channel fails
    pub fn configure(&mut self, channel: C, timing: Timing) -> Result<()> {
        self.channel = Some(channel);
        self.timing = timing;
        self.direction.initialize()?;
        self.flush_input()?;
        Ok(())
    }

    /// Replace the direction control and put it into receive state
    pub fn set_direction_control(&mut self, direction: DirectionControl) -> Result<()> {
        self.direction = direction;
        self.direction.initialize()?;
        Ok(())
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Install or remove the status sink
    pub fn set_status_sink(&mut self, sink: Option<Box<dyn StatusSink>>) {
        self.sink = sink;
    }

    pub fn is_configured(&self) -> bool {
        self.channel.is_some()
    }

    /// Bytes captured by the last transfer
    pub fn raw_capture(&self) -> &[u8] {
        self.capture.as_slice()
    }

    pub fn capture_capacity(&self) -> usize {
        self.capture.capacity()
    }

    /// Discard every byte waiting on the channel
    ///
    /// Returns the number of bytes discarded.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if no channel is bound, `Io` on channel failure
    pub fn flush_input(&mut self) -> Result<usize> {
        let channel = self.channel.as_mut().ok_or(Rs485Error::NotConfigured)?;

        let mut discarded = 0;
        while channel.bytes_available()? > 0 {
            if channel.read_byte()?.is_none() {
                break;
            }
            discarded += 1;
            thread::sleep(FLUSH_GRACE);
        }

        if discarded > 0 {
            trace!("[RS485] Flushed {} stale bytes", discarded);
        }
        Ok(discarded)
    }

    /// Send `tx` and capture whatever comes back
    ///
    /// Returns the number of bytes captured. Success only means the bus was
    /// not silent; use `extract_frame` to look for a valid reply.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No channel is bound (`NotConfigured`) or `tx` is empty (`EmptyRequest`);
    ///   no I/O is attempted and the capture is left empty
    /// - Nothing arrived before `timeouts.overall` (`NoResponse`)
    /// - The channel or direction line fails (`Io`)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rs485_bus::bus::{Rs485Bus, RxTimeouts, Timing};
    /// use rs485_bus::config::Config;
    /// use rs485_bus::serial::SerialChannel;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// let mut bus = Rs485Bus::new();
    /// bus.configure(SerialChannel::open(&config.serial)?, Timing::default())?;
    ///
    /// let request = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A];
    /// if bus.transfer(&request, RxTimeouts::default()).is_ok() {
    ///     println!("captured {:02X?}", bus.raw_capture());
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn transfer(&mut self, tx: &[u8], timeouts: RxTimeouts) -> Result<usize> {
        self.capture.clear();

        if self.channel.is_none() {
            return Err(Rs485Error::NotConfigured);
        }
        if tx.is_empty() {
            return Err(Rs485Error::EmptyRequest);
        }

        self.flush_input()?;

        trace!("[RS485] TX: {}", hex_inline(tx));
        let started = Instant::now();
        let outcome = self.transmit(tx).and_then(|()| self.receive(timeouts));

        let captured = self.capture.len();
        let success = outcome.is_ok() && captured > 0;

        if let Some(sink) = self.sink.as_mut() {
            sink.on_transfer_result(&TransferReport {
                bytes_sent: tx.len(),
                bytes_captured: captured,
                success,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            sink.on_raw_dump(self.capture.as_slice());
        }

        outcome?;
        if success {
            Ok(captured)
        } else {
            Err(Rs485Error::NoResponse)
        }
    }

    /// Find the first CRC-valid frame of `expected_len` bytes starting with `prefix`
    ///
    /// The frame is copied into `out[..expected_len]` and its offset inside
    /// the capture is returned. Prefix matches whose CRC fails are skipped and
    /// reported to the status sink.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The request can never match (`InvalidFrameRequest`); nothing is scanned
    /// - No candidate passes the CRC check, including a capture shorter than
    ///   `expected_len` (`FrameNotFound`)
    pub fn extract_frame(
        &mut self,
        prefix: &[u8],
        expected_len: usize,
        out: &mut [u8],
    ) -> Result<usize> {
        check_frame_request(prefix, expected_len, out.len())?;

        let capture = self.capture.as_slice();
        let mut found = None;

        for candidate in prefix_candidates(capture, prefix, expected_len) {
            if candidate.is_valid() {
                found = Some(candidate.index);
                break;
            }

            if let Some(sink) = self.sink.as_mut() {
                sink.on_crc_mismatch(&CrcMismatch {
                    index: candidate.index,
                    calculated: candidate.calculated,
                    received: candidate.received,
                });
            }
        }

        let report = FrameReport {
            found: found.is_some(),
            index: found,
            expected_len,
        };

        match found {
            Some(index) => {
                let frame = &mut out[..expected_len];
                frame.copy_from_slice(&capture[index..index + expected_len]);
                if let Some(sink) = self.sink.as_mut() {
                    sink.on_frame_result(&report, Some(&*frame));
                }
                Ok(index)
            }
            None => {
                if let Some(sink) = self.sink.as_mut() {
                    sink.on_frame_result(&report, None);
                }
                Err(Rs485Error::FrameNotFound {
                    expected_len,
                    captured: capture.len(),
                })
            }
        }
    }

    /// `transfer` followed by `extract_frame`
    ///
    /// Requests that could never fit the capture buffer or `out` are rejected
    /// before anything is sent.
    ///
    /// # Errors
    ///
    /// Any error of `transfer` (notably `NoResponse`) or `extract_frame`
    pub fn transfer_and_extract(
        &mut self,
        tx: &[u8],
        prefix: &[u8],
        expected_len: usize,
        out: &mut [u8],
        timeouts: RxTimeouts,
    ) -> Result<usize> {
        check_frame_request(prefix, expected_len, out.len())?;
        if expected_len > self.capture.capacity() {
            return Err(Rs485Error::InvalidFrameRequest(format!(
                "capture holds at most {} bytes, frame needs {}",
                self.capture.capacity(),
                expected_len
            )));
        }

        self.transfer(tx, timeouts)?;
        self.extract_frame(prefix, expected_len, out)
    }

    /// Assert transmit, send with guard delays, always release transmit
    fn transmit(&mut self, tx: &[u8]) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Rs485Error::NotConfigured)?;

        self.direction.set_transmit(true)?;
        let sent = send_with_guards(channel, tx, &self.timing);
        let released = self.direction.set_transmit(false);

        sent?;
        released?;
        Ok(())
    }

    /// Capture until overall timeout, inter-byte silence or a full buffer
    fn receive(&mut self, timeouts: RxTimeouts) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Rs485Error::NotConfigured)?;

        let start = Instant::now();
        let mut last_byte: Option<Instant> = None;

        while start.elapsed() < timeouts.overall && !self.capture.is_full() {
            let available = channel.bytes_available()?;

            let mut got_any = false;
            for _ in 0..available {
                if self.capture.is_full() {
                    break;
                }
                match channel.read_byte()? {
                    Some(byte) => {
                        self.capture.push(byte);
                        got_any = true;
                    }
                    None => break,
                }
            }

            if got_any {
                last_byte = Some(Instant::now());
                continue;
            }

            if let Some(last) = last_byte {
                if last.elapsed() >= timeouts.inter_byte {
                    break;
                }
            }
            thread::sleep(RX_POLL_INTERVAL);
        }

        Ok(())
    }
}

fn send_with_guards<C: ByteChannel>(channel: &mut C, tx: &[u8], timing: &Timing) -> io::Result<()> {
    if !timing.pre_tx_delay.is_zero() {
        thread::sleep(timing.pre_tx_delay);
    }

    channel.write(tx)?;
    channel.flush_output()?;

    if !timing.post_tx_delay.is_zero() {
        thread::sleep(timing.post_tx_delay);
    }
    Ok(())
}
