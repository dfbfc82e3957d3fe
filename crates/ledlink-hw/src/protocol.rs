//! Controller wire protocol.
//!
//! Protocol structure:
//! - Framing: 115200 baud, 8N1, no flow control
//! - Edit mode is entered with `'E'` and acknowledged with a single ACK byte
//! - Each command is a single ASCII opcode followed by raw parameter bytes
//! - Every command except power-down is answered with exactly one byte

use crate::command::Command;

/// Link baud rate.
pub const BAUD_RATE: u32 = 115_200;

/// Acknowledgment byte.
pub const ACK: u8 = 0x06;

/// Enter-edit-mode handshake byte.
pub const ENTER_EDIT_MODE: u8 = b'E';

/// Default exit-edit-mode handshake byte (the device toggles on `'E'`).
pub const DEFAULT_EXIT_EDIT_MODE: u8 = b'E';

/// Longest frame: opcode plus four parameter bytes.
pub const MAX_FRAME_LEN: usize = 5;

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    SetBrightness = b'B',
    SetImmediateRgb = b'I',
    SetImmediateHsv = b'i',
    SetTranslation = b'T',
    PowerDown = b'P',
    /// Diagnostic probe, valid in and out of edit mode.
    VerifyDevice = b'e',
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::SetBrightness,
        Opcode::SetImmediateRgb,
        Opcode::SetImmediateHsv,
        Opcode::SetTranslation,
        Opcode::PowerDown,
        Opcode::VerifyDevice,
    ];

    /// Returns true if the device answers this opcode.
    pub fn expects_response(self) -> bool {
        self != Opcode::PowerDown
    }
}

/// An encoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    opcode: Opcode,
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    fn new(opcode: Opcode, params: &[u8]) -> Self {
        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[0] = opcode as u8;
        buf[1..=params.len()].copy_from_slice(params);
        Self {
            opcode,
            buf,
            len: params.len() + 1,
        }
    }

    /// The diagnostic probe frame.
    pub fn probe() -> Self {
        Self::new(Opcode::VerifyDevice, &[])
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn expects_response(&self) -> bool {
        self.opcode().expects_response()
    }
}

/// Device answer to a frame or handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ack,
    Nack(u8),
}

impl Response {
    pub fn from_byte(byte: u8) -> Self {
        if byte == ACK {
            Response::Ack
        } else {
            Response::Nack(byte)
        }
    }

    pub fn is_ack(self) -> bool {
        self == Response::Ack
    }
}

/// Encodes a command into its wire frame.
///
/// Returns `None` for [`Command::Reset`], which is signalled on the control
/// line instead of the data line.
pub fn encode(command: &Command) -> Option<Frame> {
    let frame = match *command {
        Command::SetBrightness(value) => Frame::new(Opcode::SetBrightness, &[value]),
        Command::SetImmediateRgb {
            index,
            red,
            green,
            blue,
        } => Frame::new(Opcode::SetImmediateRgb, &[index, red, green, blue]),
        Command::SetImmediateHsv {
            index,
            hue,
            saturation,
            value,
        } => Frame::new(Opcode::SetImmediateHsv, &[index, hue, saturation, value]),
        Command::SetTranslation(mode) => Frame::new(Opcode::SetTranslation, &[mode]),
        Command::PowerDown => Frame::new(Opcode::PowerDown, &[]),
        Command::VerifyDevice => Frame::probe(),
        Command::Reset => return None,
    };
    Some(frame)
}

/// Decodes a single response byte, `None` meaning nothing arrived in time.
pub fn decode(response: Option<u8>) -> bool {
    response.map(Response::from_byte).is_some_and(Response::is_ack)
}
