//! Byte link to the controller.
//!
//! The pipeline only needs a few capabilities from the transport: write,
//! flush, read with a timeout, discard stale input, and drive the reset
//! line. [`SerialLink`] provides them over a serial port.

#[cfg(test)]
pub(crate) mod mock;
mod serial;

pub use serial::SerialLink;

use crate::Result;
use std::time::Duration;

/// Exclusive, bidirectional byte channel to one device.
pub trait ByteLink: Send {
    /// Queues bytes for transmission.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Waits until written bytes have left the host. `timeout` is a bound
    /// only where the transport can enforce one.
    fn flush(&mut self, timeout: Duration) -> Result<()>;

    /// Discards received bytes nobody has read yet.
    fn clear_input(&mut self) -> Result<()>;

    /// Fills `buf` or fails with [`crate::Error::Timeout`].
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Drives the reset control line; `false` holds the device in reset.
    fn set_reset_line(&mut self, high: bool) -> Result<()>;

    /// Human-readable name, e.g. the port path.
    fn name(&self) -> &str;
}
