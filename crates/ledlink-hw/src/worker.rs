//! The single consumer of a command queue.
//!
//! The worker sleeps until work arrives, then drains the queue through one
//! edit-mode session so that a burst of updates pays for one handshake.

use crate::command::Command;
use crate::queue::{CommandQueue, Wake};
use crate::session::{Session, SharedLink};
use crate::{Error, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Background thread executing queued commands against one link.
pub struct Worker {
    queue: Arc<CommandQueue>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(link: Arc<SharedLink>, queue: Arc<CommandQueue>) -> Result<Self> {
        let worker_queue = Arc::clone(&queue);
        let thread = std::thread::Builder::new()
            .name("ledlink-worker".to_string())
            .spawn(move || run(&link, &worker_queue))
            .map_err(Error::WorkerSpawn)?;

        Ok(Self {
            queue,
            thread: Some(thread),
        })
    }

    /// Stops the worker and fails every command it did not get to.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.queue.cancel();
        if thread.join().is_err() {
            warn!("Worker thread panicked");
        }

        let orphans = self.queue.drain();
        if !orphans.is_empty() {
            info!("Failing {} unexecuted command(s)", orphans.len());
        }
        for orphan in orphans {
            orphan.complete(false);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(link: &SharedLink, queue: &CommandQueue) {
    debug!("Worker started for {}", link.name());
    while queue.wait() == Wake::Work {
        drain_cycle(link, queue);
    }
    debug!("Worker stopped for {}", link.name());
}

/// Executes queued commands until the queue is empty, opening a session on
/// the first command that needs one.
fn drain_cycle(link: &SharedLink, queue: &CommandQueue) {
    let mut session: Option<Session<'_>> = None;

    while let Some(entry) = queue.take_next() {
        // Power-down, reset or a link fault ended edit mode; free the link
        if session.as_ref().is_some_and(|s| !s.is_active()) {
            session = None;
        }

        let command = *entry.command();
        if command.kind().needs_session() && session.is_none() {
            match link.begin() {
                Ok(opened) => session = Some(opened),
                Err(e) => {
                    let orphans = queue.drain();
                    warn!("{}; failing {} command(s)", e, orphans.len() + 1);
                    entry.complete(false);
                    for orphan in orphans {
                        orphan.complete(false);
                    }
                    return;
                }
            }
        }

        let result = match session.as_mut() {
            Some(session) => session.execute(&command),
            None if command == Command::Reset => link.reset(),
            None => link.verify_device(),
        };

        match &result {
            Ok(()) => debug!("{} done", command),
            Err(e) => warn!("{} failed: {}", command, e),
        }
        entry.complete(result.is_ok());
    }

    if let Some(session) = session {
        if let Err(e) = session.end() {
            warn!("Exit handshake failed: {}", e);
        }
    }
}
