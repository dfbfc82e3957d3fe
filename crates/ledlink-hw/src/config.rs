//! Protocol timing and handshake settings.

use crate::protocol::{Opcode, DEFAULT_EXIT_EDIT_MODE};
use crate::{Error, Result};
use std::time::Duration;

/// Round-trip timeout for flushes and reads.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(1000);

/// How long the reset line is held low.
pub const DEFAULT_RESET_LOW: Duration = Duration::from_millis(500);

/// How long the device needs to boot after the reset line goes high.
pub const DEFAULT_RESET_SETTLE: Duration = Duration::from_millis(2000);

/// Settings shared by every session on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub io_timeout: Duration,
    pub reset_low: Duration,
    pub reset_settle: Duration,
    /// Byte sent to leave edit mode.
    pub exit_opcode: u8,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            reset_low: DEFAULT_RESET_LOW,
            reset_settle: DEFAULT_RESET_SETTLE,
            exit_opcode: DEFAULT_EXIT_EDIT_MODE,
        }
    }
}

impl ProtocolConfig {
    /// Rejects an exit opcode the device would read as a command or probe.
    pub fn validate(&self) -> Result<()> {
        if Opcode::ALL.iter().any(|&op| op as u8 == self.exit_opcode) {
            return Err(Error::InvalidExitOpcode(self.exit_opcode));
        }
        Ok(())
    }

    pub(crate) fn io_timeout_ms(&self) -> u64 {
        self.io_timeout.as_millis() as u64
    }
}
