//! Error types for the LED link library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the controller.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial device not found or could not be opened.
    #[error("LED controller not found at {0}")]
    LedNotFound(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial I/O error.
    #[error("Serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    /// A write, flush or read did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The device answered something other than ACK.
    #[error("Device rejected opcode {opcode:#04X} (response {response:#04X})")]
    Nack { opcode: u8, response: u8 },

    /// The enter-edit-mode handshake was not acknowledged.
    #[error("Edit-mode session unavailable: {0}")]
    SessionUnavailable(String),

    /// A round-trip was attempted on a session that is no longer active.
    #[error("Edit-mode session is not active")]
    SessionNotActive,

    /// The link has been torn down.
    #[error("LED controller disconnected")]
    Disconnected,

    /// The configured exit opcode collides with another opcode.
    #[error("Invalid exit opcode: {0:#04X}")]
    InvalidExitOpcode(u8),

    /// The worker thread could not be started.
    #[error("Failed to start worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Command text could not be parsed.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl Error {
    /// Returns true for faults of the link itself, as opposed to a single
    /// operation timing out or being refused.
    pub fn is_link_fault(&self) -> bool {
        matches!(
            self,
            Error::LedNotFound(_) | Error::Serial(_) | Error::SerialIo(_) | Error::Disconnected
        )
    }

    /// Maps an I/O error from a timed operation, turning timeouts into
    /// [`Error::Timeout`] and a vanished port into [`Error::Disconnected`].
    pub(crate) fn from_io(err: std::io::Error, operation: &'static str, timeout_ms: u64) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout {
                operation,
                timeout_ms,
            },
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
                Error::Disconnected
            }
            _ => Error::SerialIo(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_mapping() {
        let err = Error::from_io(std::io::ErrorKind::TimedOut.into(), "read", 1000);
        assert!(matches!(
            err,
            Error::Timeout {
                operation: "read",
                timeout_ms: 1000
            }
        ));
        assert!(!err.is_link_fault());

        let err = Error::from_io(std::io::ErrorKind::BrokenPipe.into(), "write", 1000);
        assert!(matches!(err, Error::Disconnected));
        assert!(err.is_link_fault());

        let err = Error::from_io(std::io::ErrorKind::PermissionDenied.into(), "write", 1000);
        assert!(matches!(err, Error::SerialIo(_)));
        assert!(err.is_link_fault());
    }

    #[test]
    fn test_nack_display() {
        let err = Error::Nack {
            opcode: b'B',
            response: 0x15,
        };
        assert_eq!(err.to_string(), "Device rejected opcode 0x42 (response 0x15)");
    }
}
