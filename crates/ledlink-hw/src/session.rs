//! Edit-mode sessions on a shared link.
//!
//! A [`Session`] holds the link's lock for its whole lifetime, so nothing
//! else can talk to the device between the enter and exit handshakes. The
//! lock is released when the session is dropped, whether or not the exit
//! handshake succeeded.

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::link::ByteLink;
use crate::protocol::{self, Frame, Response, ENTER_EDIT_MODE};
use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Entering,
    Active,
    Exiting,
}

/// A link shared between sessions.
pub struct SharedLink {
    link: Mutex<Box<dyn ByteLink>>,
    config: ProtocolConfig,
    name: String,
}

impl SharedLink {
    pub fn new(link: Box<dyn ByteLink>, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: link.name().to_string(),
            link: Mutex::new(link),
            config,
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn ByteLink>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters edit mode, blocking while another session is open.
    pub fn begin(&self) -> Result<Session<'_>> {
        let mut session = Session {
            link: self.lock(),
            config: self.config,
            state: SessionState::Entering,
        };

        debug!("Entering edit mode on {}", self.name);
        match enter_edit_mode(&mut **session.link, &self.config) {
            Ok(Response::Ack) => {
                session.state = SessionState::Active;
                Ok(session)
            }
            Ok(Response::Nack(byte)) => {
                session.state = SessionState::Closed;
                warn!("Edit mode refused on {} (response {:#04X})", self.name, byte);
                Err(Error::SessionUnavailable(format!(
                    "handshake answered {:#04X}",
                    byte
                )))
            }
            Err(e) => {
                session.state = SessionState::Closed;
                warn!("Edit mode handshake failed on {}: {}", self.name, e);
                Err(Error::SessionUnavailable(e.to_string()))
            }
        }
    }

    /// Pulses the reset line without entering edit mode.
    pub fn reset(&self) -> Result<()> {
        let mut link = self.lock();
        pulse_reset(&mut **link, &self.config)
    }

    /// Probes the device without entering edit mode.
    pub fn verify_device(&self) -> Result<()> {
        let mut link = self.lock();
        round_trip(&mut **link, &Frame::probe(), &self.config)
    }
}

/// An open edit-mode session.
pub struct Session<'a> {
    link: MutexGuard<'a, Box<dyn ByteLink>>,
    config: ProtocolConfig,
    state: SessionState,
}

impl Session<'_> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Executes one command.
    ///
    /// A timeout or NACK fails only this command. A link fault abandons the
    /// session. Power-down and reset take the device out of edit mode, so
    /// the session is closed afterwards without an exit handshake.
    pub fn execute(&mut self, command: &Command) -> Result<()> {
        let Some(frame) = protocol::encode(command) else {
            let result = pulse_reset(&mut **self.link, &self.config);
            self.state = SessionState::Closed;
            return result;
        };

        if command.kind().needs_session() && !self.is_active() {
            return Err(Error::SessionNotActive);
        }

        let result = round_trip(&mut **self.link, &frame, &self.config);
        match &result {
            Err(e) if e.is_link_fault() => {
                warn!("Abandoning edit-mode session: {}", e);
                self.state = SessionState::Closed;
            }
            _ if *command == Command::PowerDown => self.state = SessionState::Closed,
            _ => {}
        }
        result
    }

    pub fn set_brightness(&mut self, brightness: u8) -> Result<()> {
        self.execute(&Command::SetBrightness(brightness))
    }

    pub fn set_immediate_rgb(&mut self, index: u8, red: u8, green: u8, blue: u8) -> Result<()> {
        self.execute(&Command::SetImmediateRgb {
            index,
            red,
            green,
            blue,
        })
    }

    pub fn set_immediate_hsv(
        &mut self,
        index: u8,
        hue: u8,
        saturation: u8,
        value: u8,
    ) -> Result<()> {
        self.execute(&Command::SetImmediateHsv {
            index,
            hue,
            saturation,
            value,
        })
    }

    pub fn set_translation(&mut self, mode: u8) -> Result<()> {
        self.execute(&Command::SetTranslation(mode))
    }

    pub fn power_down(&mut self) -> Result<()> {
        self.execute(&Command::PowerDown)
    }

    pub fn verify_device(&mut self) -> Result<()> {
        self.execute(&Command::VerifyDevice)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.execute(&Command::Reset)
    }

    /// Leaves edit mode and releases the link.
    pub fn end(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.state != SessionState::Active {
            self.state = SessionState::Closed;
            return Ok(());
        }

        self.state = SessionState::Exiting;
        debug!("Leaving edit mode on {}", self.link.name());
        let result = send_byte(&mut **self.link, self.config.exit_opcode, &self.config);
        self.state = SessionState::Closed;
        result
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Exit handshake failed: {}", e);
        }
    }
}

fn send_byte(link: &mut dyn ByteLink, byte: u8, config: &ProtocolConfig) -> Result<()> {
    link.write(&[byte])?;
    link.flush(config.io_timeout)
}

fn read_byte(link: &mut dyn ByteLink, config: &ProtocolConfig) -> Result<u8> {
    let mut byte = [0u8; 1];
    link.read_exact(&mut byte, config.io_timeout)?;
    Ok(byte[0])
}

fn enter_edit_mode(link: &mut dyn ByteLink, config: &ProtocolConfig) -> Result<Response> {
    link.clear_input()?;
    send_byte(link, ENTER_EDIT_MODE, config)?;
    read_byte(link, config).map(Response::from_byte)
}

fn round_trip(link: &mut dyn ByteLink, frame: &Frame, config: &ProtocolConfig) -> Result<()> {
    // A reply that missed an earlier timeout must not answer this frame
    link.clear_input()?;
    link.write(frame.as_bytes())?;
    link.flush(config.io_timeout)?;

    if !frame.expects_response() {
        return Ok(());
    }

    let response = match read_byte(link, config) {
        Ok(byte) => Some(byte),
        Err(Error::Timeout { .. }) => None,
        Err(e) => return Err(e),
    };
    if protocol::decode(response) {
        return Ok(());
    }
    match response {
        Some(byte) => Err(Error::Nack {
            opcode: frame.opcode() as u8,
            response: byte,
        }),
        None => Err(Error::Timeout {
            operation: "read",
            timeout_ms: config.io_timeout_ms(),
        }),
    }
}

fn pulse_reset(link: &mut dyn ByteLink, config: &ProtocolConfig) -> Result<()> {
    info!("Resetting LED controller on {}", link.name());
    link.set_reset_line(false)?;
    std::thread::sleep(config.reset_low);
    link.set_reset_line(true)?;
    std::thread::sleep(config.reset_settle);
    debug!("Reset complete");
    Ok(())
}
