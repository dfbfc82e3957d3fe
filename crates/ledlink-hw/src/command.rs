//! Commands accepted by the LED controller.

use crate::{Error, Result};
use std::str::FromStr;

/// Command kind, used for coalescing queued commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SetBrightness,
    SetImmediateRgb,
    SetImmediateHsv,
    SetTranslation,
    Reset,
    PowerDown,
    VerifyDevice,
}

impl CommandKind {
    /// Only global brightness is safe to coalesce by kind: a newer value
    /// fully replaces an older one. Per-LED colors address different LEDs.
    pub fn coalesces_by_default(self) -> bool {
        self == CommandKind::SetBrightness
    }

    /// Returns true if this kind must run inside an edit-mode session.
    pub fn needs_session(self) -> bool {
        !matches!(self, CommandKind::Reset | CommandKind::VerifyDevice)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::SetBrightness => write!(f, "brightness"),
            CommandKind::SetImmediateRgb => write!(f, "rgb"),
            CommandKind::SetImmediateHsv => write!(f, "hsv"),
            CommandKind::SetTranslation => write!(f, "translation"),
            CommandKind::Reset => write!(f, "reset"),
            CommandKind::PowerDown => write!(f, "power-down"),
            CommandKind::VerifyDevice => write!(f, "verify"),
        }
    }
}

/// A single controller command with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Global brightness.
    SetBrightness(u8),
    /// Immediately set one LED to an RGB color.
    SetImmediateRgb {
        index: u8,
        red: u8,
        green: u8,
        blue: u8,
    },
    /// Immediately set one LED to an HSV color.
    SetImmediateHsv {
        index: u8,
        hue: u8,
        saturation: u8,
        value: u8,
    },
    /// Select the color translation table.
    SetTranslation(u8),
    /// Hardware reset through the control line.
    Reset,
    /// Power the strip down. The device answers nothing.
    PowerDown,
    /// Diagnostic probe.
    VerifyDevice,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::SetBrightness(_) => CommandKind::SetBrightness,
            Command::SetImmediateRgb { .. } => CommandKind::SetImmediateRgb,
            Command::SetImmediateHsv { .. } => CommandKind::SetImmediateHsv,
            Command::SetTranslation(_) => CommandKind::SetTranslation,
            Command::Reset => CommandKind::Reset,
            Command::PowerDown => CommandKind::PowerDown,
            Command::VerifyDevice => CommandKind::VerifyDevice,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Command::SetBrightness(value) => write!(f, "brightness {}", value),
            Command::SetImmediateRgb {
                index,
                red,
                green,
                blue,
            } => write!(f, "rgb {} {} {} {}", index, red, green, blue),
            Command::SetImmediateHsv {
                index,
                hue,
                saturation,
                value,
            } => write!(f, "hsv {} {} {} {}", index, hue, saturation, value),
            Command::SetTranslation(mode) => write!(f, "translation {}", mode),
            Command::Reset => write!(f, "reset"),
            Command::PowerDown => write!(f, "power-down"),
            Command::VerifyDevice => write!(f, "verify"),
        }
    }
}

/// Parses e.g. `brightness 30`, `rgb 0 255 0 0`, `power-down`.
impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| Error::InvalidCommand("empty command".to_string()))?
            .to_lowercase();
        let args = words
            .map(|w| {
                w.parse::<u8>()
                    .map_err(|_| Error::InvalidCommand(format!("{}: not a byte value: {}", name, w)))
            })
            .collect::<Result<Vec<u8>>>()?;

        let command = match (name.as_str(), args.as_slice()) {
            ("brightness", &[value]) => Command::SetBrightness(value),
            ("rgb", &[index, red, green, blue]) => Command::SetImmediateRgb {
                index,
                red,
                green,
                blue,
            },
            ("hsv", &[index, hue, saturation, value]) => Command::SetImmediateHsv {
                index,
                hue,
                saturation,
                value,
            },
            ("translation", &[mode]) => Command::SetTranslation(mode),
            ("reset", &[]) => Command::Reset,
            ("power-down" | "powerdown", &[]) => Command::PowerDown,
            ("verify", &[]) => Command::VerifyDevice,
            (
                "brightness" | "rgb" | "hsv" | "translation" | "reset" | "power-down"
                | "powerdown" | "verify",
                _,
            ) => {
                return Err(Error::InvalidCommand(format!(
                    "{}: wrong number of arguments ({})",
                    name,
                    args.len()
                )))
            }
            _ => return Err(Error::InvalidCommand(format!("unknown command: {}", name))),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "brightness 30".parse::<Command>().unwrap(),
            Command::SetBrightness(30)
        );
        assert_eq!(
            "RGB 0 255 0 0".parse::<Command>().unwrap(),
            Command::SetImmediateRgb {
                index: 0,
                red: 255,
                green: 0,
                blue: 0
            }
        );
        assert_eq!(
            "hsv 3 10 200 255".parse::<Command>().unwrap(),
            Command::SetImmediateHsv {
                index: 3,
                hue: 10,
                saturation: 200,
                value: 255
            }
        );
        assert_eq!("power-down".parse::<Command>().unwrap(), Command::PowerDown);
        assert_eq!("verify".parse::<Command>().unwrap(), Command::VerifyDevice);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Command>().is_err());
        assert!("brightness".parse::<Command>().is_err());
        assert!("brightness 256".parse::<Command>().is_err());
        assert!("reset now".parse::<Command>().is_err());
        assert!("blink 1".parse::<Command>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let command = Command::SetImmediateHsv {
            index: 1,
            hue: 2,
            saturation: 3,
            value: 4,
        };
        assert_eq!(command.to_string(), "hsv 1 2 3 4");
        assert_eq!(command.to_string().parse::<Command>().unwrap(), command);
    }

    #[test]
    fn test_kind_flags() {
        assert!(CommandKind::SetBrightness.coalesces_by_default());
        assert!(!CommandKind::Reset.coalesces_by_default());
        assert!(!CommandKind::SetImmediateRgb.coalesces_by_default());
        assert!(!CommandKind::SetImmediateHsv.coalesces_by_default());
        assert!(CommandKind::PowerDown.needs_session());
        assert!(!CommandKind::VerifyDevice.needs_session());
        assert!(!CommandKind::Reset.needs_session());
        assert_eq!(Command::SetTranslation(1).kind(), CommandKind::SetTranslation);
    }
}
