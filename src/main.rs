//! # RS-485 Bus
//!
//! Poll one Modbus-RTU field device over a half-duplex RS-485 link.
//!
//! This application opens the configured serial adapter, sets up direction
//! control and status reporting, then reads the configured register block
//! at a fixed interval and logs the decoded values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use rs485_bus::bus::Rs485Bus;
use rs485_bus::config::{Config, DirectionMode, LoggingConfig, StatusConfig};
use rs485_bus::serial::{DirectionControl, SerialChannel};
use rs485_bus::status::{JsonlSink, StatusSink, TracingSink};

/// Configuration used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of polls between status log messages
const LOG_INTERVAL_POLLS: u64 = 60;

/// Main entry point for the RS-485 poller
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Open the serial adapter and wire up direction control
///
/// 2. **Main Loop**
///    - Read and decode the configured register block every `interval_ms`
///    - Log failures and keep polling; one attempt per tick
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - No serial port can be opened
/// - Direction control cannot be initialized
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args(std::env::args());
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let _log_guard = init_logging(&config.logging)?;

    info!("RS-485 Bus v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path.display());

    let channel = SerialChannel::open(&config.serial)?;
    info!("RS-485 port opened at: {}", channel.device_path());

    let direction = match config.direction.mode {
        DirectionMode::Auto => DirectionControl::Disabled,
        DirectionMode::Rts => {
            let line = channel.rts_line()?;
            info!(
                "Direction control on RTS (transmit active {})",
                if config.direction.transmit_active_high { "high" } else { "low" }
            );
            DirectionControl::new(Box::new(line), config.direction.transmit_active_high)
        }
    };

    let mut bus = Rs485Bus::with_capacity(config.timing.rx_buffer_size);
    bus.configure(channel, config.timing.guard_timing())?;
    bus.set_direction_control(direction)?;
    bus.set_status_sink(build_status_sink(&config.status)?);

    let request = config.poll.read_request()?;
    let timeouts = config.timing.rx_timeouts();
    let fields = config.poll.fields.clone();

    let mut poll_interval = interval(Duration::from_millis(config.poll.interval_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Polling address {} function 0x{:02X} registers {}..{} every {} ms",
        request.address(),
        request.function(),
        request.start(),
        request.start() as u32 + request.count() as u32,
        config.poll.interval_ms
    );
    info!("Press Ctrl+C to exit");

    let mut poll_count: u64 = 0;
    let mut failures: u64 = 0;

    // Subscribed once so a signal arriving mid-transfer is still seen
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                poll_count += 1;

                // The transfer busy-waits on the port; keep it off the async workers
                let result = tokio::task::block_in_place(|| {
                    if fields.is_empty() {
                        bus.read_registers(&request, timeouts).map(|words| {
                            info!("Registers: {:04X?}", words);
                        })
                    } else {
                        bus.read_scaled(&request, &fields, timeouts).map(|readings| {
                            for reading in &readings {
                                info!("{} = {:.2}", reading.name, reading.value);
                            }
                        })
                    }
                });

                if let Err(e) = result {
                    failures += 1;
                    warn!("Poll {} failed: {}", poll_count, e);
                }

                if poll_count % LOG_INTERVAL_POLLS == 0 {
                    debug!("{} polls, {} failed", poll_count, failures);
                }
            }

            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total polls: {} ({} failed)", poll_count, failures);
                break;
            }
        }
    }

    Ok(())
}

/// First command line argument, or the default configuration path
fn config_path_from_args<I: IntoIterator<Item = String>>(args: I) -> PathBuf {
    args.into_iter()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. With a `log_dir` set, output
/// goes to a daily rolling file and the returned guard must be held until exit.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log filter")?;

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(Path::new(&config.log_dir), "rs485-bus.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Status sink selected by the `[status]` section
fn build_status_sink(config: &StatusConfig) -> Result<Option<Box<dyn StatusSink>>> {
    if !config.enabled {
        return Ok(None);
    }

    if config.jsonl_path.is_empty() {
        return Ok(Some(Box::new(TracingSink::new())));
    }

    let sink = JsonlSink::create(&config.jsonl_path, config.raw_dumps)
        .with_context(|| format!("opening status log {}", config.jsonl_path))?;
    info!("Writing status events to {}", config.jsonl_path);
    Ok(Some(Box::new(sink)))
}
