//! LED Link Hardware Library
//!
//! Drives addressable LED strip controllers that speak a byte-oriented
//! edit-mode protocol over a serial port. Producers queue commands through a
//! [`CommandHandle`]; a single worker thread per connected device batches
//! them into edit-mode sessions.

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod worker;

pub use command::{Command, CommandKind};
pub use config::ProtocolConfig;
pub use device::{CommandHandle, DeviceManager, LedController, Outcome};
pub use error::{Error, Result};
pub use link::{ByteLink, SerialLink};
pub use protocol::{ACK, BAUD_RATE};
pub use queue::{CommandQueue, Completion, QueuedCommand, Wake};
pub use session::{Session, SessionState, SharedLink};
pub use worker::Worker;
