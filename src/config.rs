//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::bus::{RxTimeouts, Timing};
use crate::error::{Rs485Error, Result};
use crate::modbus::protocol::{is_read_function, is_valid_slave_address, MAX_READ_REGISTERS};
use crate::modbus::registers::ScaledField;
use crate::modbus::request::ReadRequest;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    #[serde(default)]
    pub direction: DirectionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default)]
    pub parity: ParityMode,

    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

/// Character parity
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParityMode {
    #[default]
    None,
    Even,
    Odd,
}

/// How the transceiver's direction is switched
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectionMode {
    /// Transceiver switches by itself
    #[default]
    Auto,
    /// DE/RE wired to the port's RTS line
    Rts,
}

/// Direction control configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DirectionConfig {
    #[serde(default)]
    pub mode: DirectionMode,

    #[serde(default = "default_transmit_active_high")]
    pub transmit_active_high: bool,
}

/// Transfer timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_guard_delay_us")]
    pub pre_tx_delay_us: u64,

    #[serde(default = "default_guard_delay_us")]
    pub post_tx_delay_us: u64,

    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,

    #[serde(default = "default_inter_byte_timeout_ms")]
    pub inter_byte_timeout_ms: u64,

    #[serde(default = "default_rx_buffer_size")]
    pub rx_buffer_size: usize,
}

/// Status reporting configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_status_enabled")]
    pub enabled: bool,

    /// Empty means report through tracing only
    #[serde(default)]
    pub jsonl_path: String,

    #[serde(default)]
    pub raw_dumps: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty means stdout only
    #[serde(default)]
    pub log_dir: String,
}

/// Register block polled by the binary
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_address")]
    pub address: u8,

    #[serde(default = "default_poll_function")]
    pub function: u8,

    #[serde(default)]
    pub start: u16,

    #[serde(default = "default_poll_count")]
    pub count: u16,

    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub fields: Vec<ScaledField>,
}

// Default value functions
fn default_baud_rate() -> u32 { 9600 }
fn default_stop_bits() -> u8 { 1 }

fn default_transmit_active_high() -> bool { true }

fn default_guard_delay_us() -> u64 { 200 }
fn default_overall_timeout_ms() -> u64 { 250 }
fn default_inter_byte_timeout_ms() -> u64 { 25 }
fn default_rx_buffer_size() -> usize { 512 }

fn default_status_enabled() -> bool { true }

fn default_log_level() -> String { "info".to_string() }

fn default_poll_address() -> u8 { 1 }
fn default_poll_function() -> u8 { 3 }
fn default_poll_count() -> u16 { 1 }
fn default_poll_interval_ms() -> u64 { 1000 }

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            mode: DirectionMode::default(),
            transmit_active_high: default_transmit_active_high(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pre_tx_delay_us: default_guard_delay_us(),
            post_tx_delay_us: default_guard_delay_us(),
            overall_timeout_ms: default_overall_timeout_ms(),
            inter_byte_timeout_ms: default_inter_byte_timeout_ms(),
            rx_buffer_size: default_rx_buffer_size(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: default_status_enabled(),
            jsonl_path: String::new(),
            raw_dumps: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            address: default_poll_address(),
            function: default_poll_function(),
            start: 0,
            count: default_poll_count(),
            interval_ms: default_poll_interval_ms(),
            fields: Vec::new(),
        }
    }
}

impl TimingConfig {
    /// Guard delays for the transfer engine
    pub fn guard_timing(&self) -> Timing {
        Timing::from_micros(self.pre_tx_delay_us, self.post_tx_delay_us)
    }

    /// Receive deadlines for the transfer engine
    pub fn rx_timeouts(&self) -> RxTimeouts {
        RxTimeouts::from_millis(self.overall_timeout_ms, self.inter_byte_timeout_ms)
    }
}

impl PollConfig {
    /// The configured block as an encodable request
    pub fn read_request(&self) -> Result<ReadRequest> {
        ReadRequest::new(self.address, self.function, self.start, self.count)
    }
}

fn invalid(msg: impl std::fmt::Display) -> Rs485Error {
    Rs485Error::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rs485_bus::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate serial framing
        if ![1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if self.serial.stop_bits != 1 && self.serial.stop_bits != 2 {
            return Err(invalid("stop_bits must be 1 or 2"));
        }

        // Validate timing fields
        if self.timing.pre_tx_delay_us > 10_000 || self.timing.post_tx_delay_us > 10_000 {
            return Err(invalid("guard delays must be at most 10000 us"));
        }

        if self.timing.overall_timeout_ms == 0 || self.timing.overall_timeout_ms > 10_000 {
            return Err(invalid("overall_timeout_ms must be between 1 and 10000"));
        }

        if self.timing.inter_byte_timeout_ms == 0
            || self.timing.inter_byte_timeout_ms > self.timing.overall_timeout_ms
        {
            return Err(invalid(
                "inter_byte_timeout_ms must be between 1 and overall_timeout_ms",
            ));
        }

        if self.timing.rx_buffer_size < 8 || self.timing.rx_buffer_size > 4096 {
            return Err(invalid("rx_buffer_size must be between 8 and 4096"));
        }

        // Validate status configuration
        if self.status.raw_dumps && !self.status.enabled {
            return Err(invalid("raw_dumps requires status reporting to be enabled"));
        }

        // Validate logging configuration
        if !["error", "warn", "info", "debug", "trace"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging level must be one of: error, warn, info, debug, trace",
            ));
        }

        // Validate poll block
        if !is_valid_slave_address(self.poll.address) {
            return Err(invalid("poll address must be between 1 and 247"));
        }

        if !is_read_function(self.poll.function) {
            return Err(invalid("poll function must be 3 or 4"));
        }

        if self.poll.count == 0 || self.poll.count > MAX_READ_REGISTERS {
            return Err(invalid(format!(
                "poll count must be between 1 and {}",
                MAX_READ_REGISTERS
            )));
        }

        let response_len = self.poll.read_request()?.response_len();
        if response_len > self.timing.rx_buffer_size {
            return Err(invalid(format!(
                "rx_buffer_size {} cannot hold a {}-byte poll response",
                self.timing.rx_buffer_size, response_len
            )));
        }

        if self.poll.interval_ms == 0 || self.poll.interval_ms > 3_600_000 {
            return Err(invalid("poll interval_ms must be between 1 and 3600000"));
        }

        for field in &self.poll.fields {
            if field.end() > self.poll.count as usize {
                return Err(invalid(format!(
                    "field '{}' reaches past the {} polled registers",
                    field.name, self.poll.count
                )));
            }

            if field.min > field.max {
                return Err(invalid(format!(
                    "field '{}' has min greater than max",
                    field.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::registers::FieldKind;

    fn create_valid_config() -> Config {
        Config {
            serial: SerialConfig {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: default_baud_rate(),
                parity: ParityMode::None,
                stop_bits: default_stop_bits(),
            },
            direction: DirectionConfig::default(),
            timing: TimingConfig::default(),
            status: StatusConfig::default(),
            logging: LoggingConfig::default(),
            poll: PollConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB1"
baud_rate = 4800
parity = "even"

[direction]
mode = "rts"
transmit_active_high = false

[timing]
overall_timeout_ms = 500

[poll]
address = 17
count = 2

[[poll.fields]]
name = "humidity_pct"
offset = 0
scale = 0.1
min = 0.0
max = 100.0

[[poll.fields]]
name = "temperature_c"
offset = 1
kind = "i16"
scale = 0.1
min = -40.0
max = 80.0
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 4800);
        assert_eq!(config.serial.parity, ParityMode::Even);
        assert_eq!(config.direction.mode, DirectionMode::Rts);
        assert!(!config.direction.transmit_active_high);
        assert_eq!(config.timing.overall_timeout_ms, 500);
        assert_eq!(config.timing.inter_byte_timeout_ms, 25);
        assert_eq!(config.poll.fields.len(), 2);
        assert_eq!(config.poll.fields[0].kind, FieldKind::U16);
        assert_eq!(config.poll.fields[1].kind, FieldKind::I16);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("[serial]\n").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.port, "");
        assert_eq!(config.direction.mode, DirectionMode::Auto);
        assert_eq!(config.timing.rx_buffer_size, 512);
        assert_eq!(config.poll.address, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/rs485-bus.toml");
        assert!(matches!(result, Err(Rs485Error::Io(_))));
    }

    #[test]
    fn test_timing_conversions() {
        let config = create_valid_config();
        let timing = config.timing.guard_timing();
        assert_eq!(timing.pre_tx_delay, std::time::Duration::from_micros(200));

        let timeouts = config.timing.rx_timeouts();
        assert_eq!(timeouts.overall, std::time::Duration::from_millis(250));
        assert_eq!(timeouts.inter_byte, std::time::Duration::from_millis(25));
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stop_bits() {
        let mut config = create_valid_config();
        config.serial.stop_bits = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overall_timeout_zero() {
        let mut config = create_valid_config();
        config.timing.overall_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inter_byte_longer_than_overall() {
        let mut config = create_valid_config();
        config.timing.inter_byte_timeout_ms = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rx_buffer_too_small_for_poll() {
        let mut config = create_valid_config();
        config.poll.count = 10; // 25-byte response
        config.timing.rx_buffer_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_poll_address() {
        let mut config = create_valid_config();
        config.poll.address = 0;
        assert!(config.validate().is_err());

        config.poll.address = 248;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_poll_function() {
        let mut config = create_valid_config();
        config.poll.function = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_count_bounds() {
        let mut config = create_valid_config();
        config.poll.count = 0;
        assert!(config.validate().is_err());

        config.poll.count = 126;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_past_polled_block() {
        let mut config = create_valid_config();
        config.poll.count = 1;
        config.poll.fields = vec![ScaledField::new("pressure", 0, FieldKind::U32)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_min_above_max() {
        let mut config = create_valid_config();
        config.poll.fields = vec![ScaledField::new("x", 0, FieldKind::U16).with_range(10.0, 0.0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_request_from_poll() {
        let config = create_valid_config();
        let request = config.poll.read_request().unwrap();
        assert_eq!(request.address(), 1);
        assert_eq!(request.response_len(), 7);
    }
}
