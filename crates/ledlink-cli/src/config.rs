//! Configuration management.

use anyhow::{bail, Context, Result};
use ledlink_hw::ProtocolConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial device configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Protocol timing configuration
    #[serde(default)]
    pub protocol: ProtocolSettings,
}

/// Serial device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port path
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Protocol timing and handshake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Read/flush timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Reset line low time in milliseconds
    #[serde(default = "default_reset_low_ms")]
    pub reset_low_ms: u64,

    /// Boot time after reset in milliseconds
    #[serde(default = "default_reset_settle_ms")]
    pub reset_settle_ms: u64,

    /// Single ASCII character sent to leave edit mode
    #[serde(default = "default_exit_opcode")]
    pub exit_opcode: String,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            reset_low_ms: default_reset_low_ms(),
            reset_settle_ms: default_reset_settle_ms(),
            exit_opcode: default_exit_opcode(),
        }
    }
}

// Default value functions
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_reset_low_ms() -> u64 {
    500
}

fn default_reset_settle_ms() -> u64 {
    2000
}

fn default_exit_opcode() -> String {
    "E".to_string()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Converts the protocol section into the library's settings.
    pub fn protocol_config(&self) -> Result<ProtocolConfig> {
        let exit_opcode = match self.protocol.exit_opcode.as_bytes() {
            [byte] => *byte,
            _ => bail!(
                "exit_opcode must be a single ASCII character, got {:?}",
                self.protocol.exit_opcode
            ),
        };
        let config = ProtocolConfig {
            io_timeout: Duration::from_millis(self.protocol.timeout_ms),
            reset_low: Duration::from_millis(self.protocol.reset_low_ms),
            reset_settle: Duration::from_millis(self.protocol.reset_settle_ms),
            exit_opcode,
        };
        config.validate().context("Invalid protocol configuration")?;
        Ok(config)
    }
}
