//! Pending command queue with per-kind coalescing.

use crate::command::{Command, CommandKind};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Single-shot sink for a command's outcome.
pub type Completion = Box<dyn FnOnce(bool) + Send + 'static>;

/// A command waiting for the worker.
pub struct QueuedCommand {
    command: Command,
    completion: Option<Completion>,
}

impl QueuedCommand {
    pub fn new(command: Command, completion: Option<Completion>) -> Self {
        Self {
            command,
            completion,
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }

    /// Reports the outcome. Consuming `self` makes a second call impossible.
    pub fn complete(self, success: bool) {
        if let Some(completion) = self.completion {
            completion(success);
        }
    }
}

impl std::fmt::Debug for QueuedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedCommand")
            .field("command", &self.command)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

/// Why [`CommandQueue::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Work,
    Cancelled,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<QueuedCommand>,
    cancelled: bool,
}

/// FIFO of pending commands, shared by any number of producers and one
/// consumer.
#[derive(Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
    work_available: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a command and wakes the consumer.
    ///
    /// With `coalesce`, every queued command of the same kind is removed
    /// first; their completions are dropped without being called. Once the
    /// queue is cancelled the command is resolved with `false` right away.
    pub fn enqueue(&self, command: Command, coalesce: bool, completion: Option<Completion>) {
        let entry = QueuedCommand::new(command, completion);
        let mut superseded = Vec::new();

        let rejected = {
            let mut state = self.lock();
            if state.cancelled {
                Some(entry)
            } else {
                if coalesce {
                    let kind = entry.kind();
                    for queued in std::mem::take(&mut state.entries) {
                        if queued.kind() == kind {
                            superseded.push(queued);
                        } else {
                            state.entries.push_back(queued);
                        }
                    }
                }
                state.entries.push_back(entry);
                self.work_available.notify_one();
                None
            }
        };

        if !superseded.is_empty() {
            debug!("{} queued {} command(s) superseded", superseded.len(), command.kind());
        }
        if let Some(entry) = rejected {
            debug!("Queue closed, rejecting {}", entry.command());
            entry.complete(false);
        }
    }

    /// Removes and returns the oldest command.
    pub fn dequeue(&self) -> Option<QueuedCommand> {
        self.lock().entries.pop_front()
    }

    /// Like [`CommandQueue::dequeue`], but yields nothing once cancelled.
    pub(crate) fn take_next(&self) -> Option<QueuedCommand> {
        let mut state = self.lock();
        if state.cancelled {
            return None;
        }
        state.entries.pop_front()
    }

    /// Removes every queued command.
    pub fn drain(&self) -> Vec<QueuedCommand> {
        self.lock().entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Blocks until there is work or the queue is cancelled.
    pub fn wait(&self) -> Wake {
        let mut state = self.lock();
        loop {
            if state.cancelled {
                return Wake::Cancelled;
            }
            if !state.entries.is_empty() {
                return Wake::Work;
            }
            state = self
                .work_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes the consumer for good; later enqueues are rejected.
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.work_available.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    fn drained(queue: &CommandQueue) -> Vec<Command> {
        queue.drain().iter().map(|q| *q.command()).collect()
    }

    #[test]
    fn test_fifo_without_coalescing() {
        let queue = CommandQueue::new();
        queue.enqueue(Command::SetBrightness(1), false, None);
        queue.enqueue(Command::SetTranslation(2), false, None);
        queue.enqueue(Command::SetBrightness(3), false, None);
        assert_eq!(queue.len(), 3);

        assert_eq!(
            queue.dequeue().map(|q| *q.command()),
            Some(Command::SetBrightness(1))
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(
            drained(&queue),
            vec![Command::SetTranslation(2), Command::SetBrightness(3)]
        );
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_coalescing_keeps_latest_and_order() {
        let queue = CommandQueue::new();
        queue.enqueue(Command::SetBrightness(10), false, None);
        queue.enqueue(Command::SetTranslation(1), false, None);
        queue.enqueue(Command::SetBrightness(20), false, None);
        queue.enqueue(Command::VerifyDevice, false, None);
        queue.enqueue(Command::SetBrightness(30), true, None);

        assert_eq!(queue.len(), 3);
        assert_eq!(
            drained(&queue),
            vec![
                Command::SetTranslation(1),
                Command::VerifyDevice,
                Command::SetBrightness(30)
            ]
        );
    }

    #[test]
    fn test_coalescing_never_holds_two_of_a_kind() {
        let queue = CommandQueue::new();
        for value in 0..50u8 {
            queue.enqueue(Command::SetBrightness(value), true, None);
            queue.enqueue(
                Command::SetImmediateRgb {
                    index: 0,
                    red: value,
                    green: 0,
                    blue: 0,
                },
                true,
                None,
            );
            assert_eq!(queue.len(), 2);
        }
        assert_eq!(
            drained(&queue),
            vec![
                Command::SetBrightness(49),
                Command::SetImmediateRgb {
                    index: 0,
                    red: 49,
                    green: 0,
                    blue: 0
                }
            ]
        );
    }

    #[test]
    fn test_superseded_completions_are_not_called() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = CommandQueue::new();
        for value in 0..3u8 {
            let calls = Arc::clone(&calls);
            queue.enqueue(
                Command::SetBrightness(value),
                true,
                Some(Box::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })),
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        queue.dequeue().unwrap().complete(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_len_consistent_under_concurrency() {
        let queue = Arc::new(CommandQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for value in 0..100u8 {
                        queue.enqueue(Command::SetTranslation(value), false, None);
                        if value % 3 == i {
                            queue.dequeue();
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let len = queue.len();
        assert_eq!(queue.drain().len(), len);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_wait_wakes_on_enqueue_and_cancel() {
        let queue = Arc::new(CommandQueue::new());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                tx.send(queue.wait()).unwrap();
                queue.dequeue();
                tx.send(queue.wait()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        queue.enqueue(Command::VerifyDevice, false, None);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Wake::Work);

        // Empty again, so the consumer sleeps until cancelled
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        queue.cancel();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            Wake::Cancelled
        );
        consumer.join().unwrap();
    }

    #[test]
    fn test_enqueue_after_cancel_fails_immediately() {
        let queue = CommandQueue::new();
        queue.cancel();

        let (tx, rx) = mpsc::channel();
        queue.enqueue(
            Command::SetBrightness(5),
            false,
            Some(Box::new(move |ok| tx.send(ok).unwrap())),
        );
        assert!(!rx.try_recv().unwrap());
        assert!(queue.is_empty());
        assert!(queue.take_next().is_none());
    }

    #[test]
    fn test_rejected_completion_runs_on_caller_thread() {
        let queue = CommandQueue::new();
        queue.cancel();

        let (tx, rx) = mpsc::channel();
        queue.enqueue(
            Command::VerifyDevice,
            false,
            Some(Box::new(move |_| {
                tx.send(std::thread::current().id()).unwrap();
            })),
        );
        assert_eq!(rx.try_recv().unwrap(), std::thread::current().id());
    }
}
