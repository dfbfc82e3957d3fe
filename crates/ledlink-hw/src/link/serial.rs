//! Serial port implementation of [`ByteLink`].

use super::ByteLink;
use crate::config::ProtocolConfig;
use crate::protocol::BAUD_RATE;
use crate::{Error, Result};
use std::io::{Read, Write};
use std::time::Duration;
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

/// Blocking serial link at 115200-8N1 without flow control.
pub struct SerialLink {
    port_path: String,
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink {
    /// Opens the serial port and discards any stale input.
    pub fn open(port_path: &str, config: &ProtocolConfig) -> Result<Self> {
        let port = tokio_serial::new(port_path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.io_timeout)
            .open()
            .map_err(|e| {
                // Check if the error is due to device not existing
                if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                    if *kind == std::io::ErrorKind::NotFound
                        || *kind == std::io::ErrorKind::PermissionDenied
                    {
                        if !std::path::Path::new(port_path).exists() {
                            return Error::LedNotFound(port_path.to_string());
                        }
                    }
                }
                if e.kind == tokio_serial::ErrorKind::NoDevice {
                    return Error::LedNotFound(port_path.to_string());
                }
                Error::Serial(e)
            })?;

        // The controller may have chattered while nobody was listening
        port.clear(ClearBuffer::Input)?;

        info!("LED controller opened at {} ({} baud)", port_path, BAUD_RATE);

        Ok(Self {
            port_path: port_path.to_string(),
            port,
            timeout: config.io_timeout,
        })
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.timeout != timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }
        Ok(())
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

impl ByteLink for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        debug!("Writing to {}: {:02X?}", self.port_path, bytes);
        let timeout_ms = self.timeout_ms();
        self.port
            .write_all(bytes)
            .map_err(|e| Error::from_io(e, "write", timeout_ms))
    }

    fn flush(&mut self, timeout: Duration) -> Result<()> {
        // serialport drains with tcdrain on Unix, which ignores the port timeout
        self.port
            .flush()
            .map_err(|e| Error::from_io(e, "flush", timeout.as_millis() as u64))
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        self.set_timeout(timeout)?;
        self.port
            .read_exact(buf)
            .map_err(|e| Error::from_io(e, "read", timeout.as_millis() as u64))?;
        debug!("Read from {}: {:02X?}", self.port_path, buf);
        Ok(())
    }

    fn set_reset_line(&mut self, high: bool) -> Result<()> {
        debug!("DTR on {} -> {}", self.port_path, if high { "high" } else { "low" });
        self.port.write_data_terminal_ready(high)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.port_path
    }
}
