use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	Closed,
}

impl std::fmt::Display for MailboxSendError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Closed => write!(f, "mailbox closed"),
		}
	}
}

impl std::error::Error for MailboxSendError {}

struct MailboxState<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct MailboxInner<T> {
	capacity: usize,
	state: Mutex<MailboxState<T>>,
	notify_recv: Notify,
	notify_send: Notify,
}

/// Multi-producer mailbox sender.
pub struct MailboxSender<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Mailbox receiver.
pub struct MailboxReceiver<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Bounded FIFO mailbox with backpressure.
///
/// Producers calling [`MailboxSender::send`] wait once the queue holds
/// `capacity` messages; nothing is ever dropped. A capacity of 1 gives a
/// hand-off where the sender returns as soon as the previous message has
/// been taken.
pub struct Mailbox<T> {
	inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Mailbox<T> {
	/// Creates a bounded mailbox.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn new(capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		Self {
			inner: Arc::new(MailboxInner {
				capacity,
				state: Mutex::new(MailboxState {
					queue: VecDeque::with_capacity(capacity.min(1024)),
					closed: false,
				}),
				notify_recv: Notify::new(),
				notify_send: Notify::new(),
			}),
		}
	}

	/// Splits into a sender/receiver pair.
	pub fn split(self) -> (MailboxSender<T>, MailboxReceiver<T>) {
		let sender = MailboxSender {
			inner: Arc::clone(&self.inner),
		};
		(sender, MailboxReceiver { inner: self.inner })
	}
}

impl<T> MailboxSender<T> {
	/// Requests mailbox closure. Receivers drain existing items then return `None`.
	pub async fn close(&self) {
		let mut state = self.inner.state.lock().await;
		state.closed = true;
		drop(state);
		self.inner.notify_recv.notify_waiters();
		self.inner.notify_send.notify_waiters();
	}

	/// Attempts to close mailbox without waiting for a lock.
	pub fn close_now(&self) {
		if let Ok(mut state) = self.inner.state.try_lock() {
			state.closed = true;
			drop(state);
			self.inner.notify_recv.notify_waiters();
			self.inner.notify_send.notify_waiters();
		}
	}

	/// Enqueue, waiting for capacity while the mailbox is full.
	pub async fn send(&self, msg: T) -> Result<(), MailboxSendError> {
		loop {
			// Register the notification future *before* checking capacity
			// to avoid lost-wakeup between drop(lock) and await.
			let notified = self.inner.notify_send.notified();

			let mut state = self.inner.state.lock().await;
			if state.closed {
				return Err(MailboxSendError::Closed);
			}
			if state.queue.len() < self.inner.capacity {
				state.queue.push_back(msg);
				self.inner.notify_recv.notify_one();
				return Ok(());
			}
			drop(state);
			notified.await;
		}
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives one message. Returns `None` once mailbox is closed and drained.
	///
	/// Cancel safe: a message is only removed from the queue in the same
	/// poll that returns it.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let notified = self.inner.notify_recv.notified();
			let mut state = self.inner.state.lock().await;
			if let Some(msg) = state.queue.pop_front() {
				drop(state);
				self.inner.notify_send.notify_one();
				return Some(msg);
			}
			if state.closed {
				return None;
			}
			drop(state);
			notified.await;
		}
	}

	/// Takes every queued message without waiting for more.
	pub async fn drain(&self) -> Vec<T> {
		let mut state = self.inner.state.lock().await;
		let drained: Vec<T> = state.queue.drain(..).collect();
		drop(state);
		if !drained.is_empty() {
			self.inner.notify_send.notify_waiters();
		}
		drained
	}
}
