//! Trait abstraction for the byte channel under the bus, to enable testing

use std::io;

/// Minimal unbuffered byte channel the transfer engine drives
pub trait ByteChannel: Send {
    /// Queue all of `data` for transmission
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Block until every queued byte has physically left the UART
    fn flush_output(&mut self) -> io::Result<()>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read one received byte, `None` if nothing is waiting
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}
