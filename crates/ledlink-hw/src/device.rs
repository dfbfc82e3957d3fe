//! Connected controller and the handle producers use to reach it.

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::link::{ByteLink, SerialLink};
use crate::queue::{CommandQueue, Completion};
use crate::session::SharedLink;
use crate::worker::Worker;
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::info;

/// What happened to a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The worker executed the command (or gave up on it).
    Completed(bool),
    /// A newer command of the same kind replaced it before it ran.
    Superseded,
}

impl Outcome {
    pub fn succeeded(self) -> bool {
        self == Outcome::Completed(true)
    }
}

/// Cloneable capability to queue commands for one controller.
#[derive(Clone)]
pub struct CommandHandle {
    queue: Arc<CommandQueue>,
}

impl CommandHandle {
    /// Queues a command.
    ///
    /// The completion normally runs on the worker thread. A command rejected
    /// after shutdown, or failed while the controller is torn down, is
    /// completed on the thread doing the enqueue or the teardown instead.
    pub fn enqueue(&self, command: Command, coalesce: bool, completion: Option<Completion>) {
        self.queue.enqueue(command, coalesce, completion);
    }

    /// Queues a command using its kind's default coalescing.
    pub fn send(&self, command: Command) {
        self.enqueue(command, command.kind().coalesces_by_default(), None);
    }

    /// Queues a command and waits for its outcome.
    pub async fn submit(&self, command: Command, coalesce: bool) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.enqueue(
            command,
            coalesce,
            Some(Box::new(move |ok| {
                let _ = tx.send(ok);
            })),
        );
        match rx.await {
            Ok(ok) => Outcome::Completed(ok),
            Err(_) => Outcome::Superseded,
        }
    }

    pub async fn set_brightness(&self, brightness: u8) -> Outcome {
        self.submit(Command::SetBrightness(brightness), true).await
    }

    pub async fn set_immediate_rgb(&self, index: u8, red: u8, green: u8, blue: u8) -> Outcome {
        let command = Command::SetImmediateRgb {
            index,
            red,
            green,
            blue,
        };
        self.submit(command, false).await
    }

    pub async fn set_immediate_hsv(&self, index: u8, hue: u8, saturation: u8, value: u8) -> Outcome {
        let command = Command::SetImmediateHsv {
            index,
            hue,
            saturation,
            value,
        };
        self.submit(command, false).await
    }

    pub async fn set_translation(&self, mode: u8) -> Outcome {
        self.submit(Command::SetTranslation(mode), false).await
    }

    pub async fn power_down(&self) -> Outcome {
        self.submit(Command::PowerDown, false).await
    }

    pub async fn reset(&self) -> Outcome {
        self.submit(Command::Reset, false).await
    }

    pub async fn verify_device(&self) -> Outcome {
        self.submit(Command::VerifyDevice, false).await
    }

    /// Number of commands not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// False once the controller behind this handle was shut down.
    pub fn is_connected(&self) -> bool {
        !self.queue.is_cancelled()
    }
}

/// One link, its queue and its worker.
pub struct LedController {
    link: Arc<SharedLink>,
    queue: Arc<CommandQueue>,
    worker: Worker,
}

impl LedController {
    /// Starts a worker for an already opened link.
    pub fn start(link: Box<dyn ByteLink>, config: ProtocolConfig) -> Result<Self> {
        let link = Arc::new(SharedLink::new(link, config)?);
        let queue = Arc::new(CommandQueue::new());
        let worker = Worker::spawn(Arc::clone(&link), Arc::clone(&queue))?;
        info!("LED controller ready on {}", link.name());
        Ok(Self {
            link,
            queue,
            worker,
        })
    }

    /// Opens a serial port and starts a worker for it.
    pub fn open(port_path: &str, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let link = SerialLink::open(port_path, &config)?;
        Self::start(Box::new(link), config)
    }

    pub fn handle(&self) -> CommandHandle {
        CommandHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn port_name(&self) -> &str {
        self.link.name()
    }

    /// Stops the worker; commands still queued resolve with `false`.
    pub fn shutdown(self) {
        info!("Shutting down LED controller on {}", self.link.name());
        self.worker.shutdown();
    }
}

/// Owns at most one connected controller.
#[derive(Default)]
pub struct DeviceManager {
    current: Mutex<Option<LedController>>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<LedController>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes over a newly available link, tearing down the previous one.
    pub fn connect(&self, link: Box<dyn ByteLink>, config: ProtocolConfig) -> Result<CommandHandle> {
        let controller = LedController::start(link, config)?;
        let handle = controller.handle();
        let previous = self.lock().replace(controller);

        // Joining the old worker may wait out a reset; not under the lock
        if let Some(previous) = previous {
            previous.shutdown();
        }
        Ok(handle)
    }

    /// Tears down the current controller. Returns false if none was connected.
    pub fn disconnect(&self) -> bool {
        let current = self.lock().take();
        match current {
            Some(controller) => {
                controller.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn handle(&self) -> Option<CommandHandle> {
        self.lock().as_ref().map(LedController::handle)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}
