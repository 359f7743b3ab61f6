// Tue Jan 13 2026 - Alex

use crate::engine::control::CancelToken;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    Item(T),
    End,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue operation cancelled")]
pub struct Cancelled;

/// Bounded FIFO shared between producers and consumers.
///
/// `put` waits while the queue is full and `get` waits while it is empty. Neither
/// times out; both give up only when the token is cancelled.
pub struct Queue<T> {
    sender: Sender<Message<T>>,
    receiver: Receiver<Message<T>>,
    cancel: CancelToken,
    poll_interval: Duration,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            cancel: self.cancel.clone(),
            poll_interval: self.poll_interval,
        }
    }
}

impl<T> Queue<T> {
    pub fn bounded(capacity: usize, cancel: CancelToken) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));

        Self {
            sender,
            receiver,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn put(&self, message: Message<T>) -> Result<(), Cancelled> {
        let mut message = message;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Cancelled);
            }

            match self.sender.send_timeout(message, self.poll_interval) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => message = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(Cancelled),
            }
        }
    }

    pub fn get(&self) -> Result<Message<T>, Cancelled> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Cancelled);
            }

            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(message) => return Ok(message),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(Cancelled),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(0)
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }
}
