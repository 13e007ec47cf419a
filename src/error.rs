//! # Error Types
//!
//! Custom error types for the RS-485 transport using `thiserror`.

use thiserror::Error;

/// Main error type for the RS-485 transport
#[derive(Debug, Error)]
pub enum Rs485Error {
    /// No byte channel has been bound with `configure`
    #[error("Bus not configured: no byte channel bound")]
    NotConfigured,

    /// Transfer called with an empty request
    #[error("Request is empty")]
    EmptyRequest,

    /// Structurally impossible extraction request (lengths, prefix, output size)
    #[error("Invalid frame request: {0}")]
    InvalidFrameRequest(String),

    /// Zero bytes captured before the overall timeout
    #[error("No response: bus stayed silent")]
    NoResponse,

    /// Bytes were captured but no prefix + CRC match exists
    #[error("Frame not found: expected {expected_len} bytes in {captured} captured")]
    FrameNotFound {
        expected_len: usize,
        captured: usize,
    },

    /// Valid frame whose contents contradict the request
    #[error("Modbus protocol error: {0}")]
    Protocol(String),

    /// Decoded value outside its plausibility bounds
    #[error("Value out of range: {name} = {value} (expected {min}..={max})")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("Serial port not found, tried: {0}")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the RS-485 transport
pub type Result<T> = std::result::Result<T, Rs485Error>;
