//! Scripted in-memory link for tests.

use super::ByteLink;
use crate::protocol::ACK;
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Decides what the fake device answers to a flushed frame.
pub(crate) enum Responder {
    /// Answer every frame with ACK.
    Ack,
    /// Never answer; every read times out.
    Silent,
    /// Answer every frame with this byte.
    Byte(u8),
    /// Answer per frame.
    Script(Box<dyn FnMut(&[u8]) -> Option<u8> + Send>),
}

#[derive(Default)]
pub(crate) struct MockState {
    frames: Vec<Vec<u8>>,
    reset_line: Vec<(bool, Instant)>,
    pending_write: Vec<u8>,
    pending_read: VecDeque<u8>,
    responder: Option<Responder>,
    in_edit_mode: bool,
    /// Fail every operation as if the cable were pulled.
    unplugged: bool,
}

/// Fake device; clones share state so tests can inspect traffic.
#[derive(Clone)]
pub(crate) struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    pub fn new(responder: Responder) -> Self {
        let state = MockState {
            responder: Some(responder),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn acking() -> Self {
        Self::new(Responder::Ack)
    }

    pub fn set_responder(&self, responder: Responder) {
        self.state.lock().unwrap().responder = Some(responder);
    }

    /// Queues a byte as if the device answered late.
    pub fn inject(&self, byte: u8) {
        self.state.lock().unwrap().pending_read.push_back(byte);
    }

    pub fn unplug(&self) {
        self.state.lock().unwrap().unplugged = true;
    }

    /// Every flushed frame, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().frames.clone()
    }

    /// All bytes flushed, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.frames().concat()
    }

    pub fn reset_line(&self) -> Vec<(bool, Instant)> {
        self.state.lock().unwrap().reset_line.clone()
    }

    pub fn boxed(&self) -> Box<dyn ByteLink> {
        Box::new(self.clone())
    }
}

impl ByteLink for MockLink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unplugged {
            return Err(Error::Disconnected);
        }
        state.pending_write.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unplugged {
            return Err(Error::Disconnected);
        }
        let frame = std::mem::take(&mut state.pending_write);
        if frame.is_empty() {
            return Ok(());
        }
        // 'E' toggles edit mode; leaving it and powering down are not answered
        let leaves_edit_mode = state.in_edit_mode && frame == b"E";
        let answer = match state.responder.as_mut() {
            _ if leaves_edit_mode || frame == b"P" => None,
            Some(Responder::Script(script)) => script(&frame),
            Some(Responder::Ack) => Some(ACK),
            Some(Responder::Byte(byte)) => Some(*byte),
            Some(Responder::Silent) | None => None,
        };
        if frame == b"E" {
            state.in_edit_mode = !leaves_edit_mode && answer == Some(ACK);
        } else if frame == b"P" {
            state.in_edit_mode = false;
        }
        state.pending_read.extend(answer);
        state.frames.push(frame);
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unplugged {
            return Err(Error::Disconnected);
        }
        state.pending_read.clear();
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unplugged {
            return Err(Error::Disconnected);
        }
        if state.pending_read.len() < buf.len() {
            return Err(Error::Timeout {
                operation: "read",
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        for byte in buf.iter_mut() {
            *byte = state.pending_read.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn set_reset_line(&mut self, high: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !high {
            state.in_edit_mode = false;
        }
        state.reset_line.push((high, Instant::now()));
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
