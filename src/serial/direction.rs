//! # RS-485 Direction Control
//!
//! Drives the driver-enable (DE/RE) line of a half-duplex transceiver.
//!
//! Guard delays around the transition belong to the transfer engine; this
//! module only knows which level means "transmit".

use std::fmt;
use std::io;

use tokio_serial::SerialPort;

/// Logic level of a digital output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// A single digital output wired to the transceiver's DE/RE pins
#[cfg_attr(test, mockall::automock)]
pub trait DirectionLine: Send {
    /// Drive the line to `level`
    fn set_level(&mut self, level: Level) -> io::Result<()>;
}

/// Uses the RTS modem line of a serial port as DE/RE
///
/// This is how most USB RS-485 adapters without automatic direction
/// switching are wired.
pub struct RtsLine {
    port: Box<dyn SerialPort>,
}

impl RtsLine {
    /// Wrap a (cloned) handle of the port whose RTS line drives DE/RE
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl fmt::Debug for RtsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtsLine")
            .field("port", &self.port.name())
            .finish()
    }
}

impl DirectionLine for RtsLine {
    fn set_level(&mut self, level: Level) -> io::Result<()> {
        self.port
            .write_request_to_send(level == Level::High)
            .map_err(io::Error::from)
    }
}

/// Direction state of the bus
#[derive(Default)]
pub enum DirectionControl {
    /// Transceiver switches direction by itself
    #[default]
    Disabled,
    /// Line driven to `transmit_level` while sending, to its inverse otherwise
    Enabled {
        line: Box<dyn DirectionLine>,
        transmit_level: Level,
    },
}

impl fmt::Debug for DirectionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionControl::Disabled => f.write_str("Disabled"),
            DirectionControl::Enabled { transmit_level, .. } => f
                .debug_struct("Enabled")
                .field("transmit_level", transmit_level)
                .finish_non_exhaustive(),
        }
    }
}

impl DirectionControl {
    /// Direction control over `line`
    ///
    /// # Arguments
    ///
    /// * `line` - Output wired to DE/RE
    /// * `transmit_active_high` - true if a high level enables the driver
    pub fn new(line: Box<dyn DirectionLine>, transmit_active_high: bool) -> Self {
        let transmit_level = if transmit_active_high { Level::High } else { Level::Low };
        DirectionControl::Enabled {
            line,
            transmit_level,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, DirectionControl::Enabled { .. })
    }

    /// Put the line into its receive state
    pub fn initialize(&mut self) -> io::Result<()> {
        self.set_transmit(false)
    }

    /// Drive the line to the transmit (`true`) or receive (`false`) level
    ///
    /// No-op when disabled.
    pub fn set_transmit(&mut self, transmit: bool) -> io::Result<()> {
        match self {
            DirectionControl::Disabled => Ok(()),
            DirectionControl::Enabled {
                line,
                transmit_level,
            } => {
                let level = if transmit { *transmit_level } else { !*transmit_level };
                line.set_level(level)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[test]
    fn test_level_not() {
        assert_eq!(!Level::High, Level::Low);
        assert_eq!(!Level::Low, Level::High);
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut control = DirectionControl::default();
        assert!(!control.is_enabled());
        assert!(control.initialize().is_ok());
        assert!(control.set_transmit(true).is_ok());
        assert!(control.set_transmit(false).is_ok());
    }

    #[test]
    fn test_active_high_levels() {
        let mut line = MockDirectionLine::new();
        let mut seq = Sequence::new();
        line.expect_set_level()
            .with(eq(Level::Low))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        line.expect_set_level()
            .with(eq(Level::High))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        line.expect_set_level()
            .with(eq(Level::Low))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut control = DirectionControl::new(Box::new(line), true);
        assert!(control.is_enabled());
        control.initialize().unwrap();
        control.set_transmit(true).unwrap();
        control.set_transmit(false).unwrap();
    }

    #[test]
    fn test_active_low_levels() {
        let mut line = MockDirectionLine::new();
        let mut seq = Sequence::new();
        line.expect_set_level()
            .with(eq(Level::High))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        line.expect_set_level()
            .with(eq(Level::Low))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut control = DirectionControl::new(Box::new(line), false);
        control.initialize().unwrap();
        control.set_transmit(true).unwrap();
    }

    #[test]
    fn test_line_error_propagates() {
        let mut line = MockDirectionLine::new();
        line.expect_set_level()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "line gone")));

        let mut control = DirectionControl::new(Box::new(line), true);
        let err = control.set_transmit(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
