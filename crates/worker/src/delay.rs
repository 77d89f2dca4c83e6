use std::future::poll_fn;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio_util::time::DelayQueue;

/// Fixed-delay holding queue with a hard capacity.
///
/// Items pushed in are yielded back once `delay` has elapsed, in expiry
/// order. The queue is owned and polled by a single task, so holding many
/// delayed items costs one timer-wheel slot each instead of one spawned task
/// each. Callers check [`has_capacity`](Self::has_capacity) before pushing
/// and stop admitting work while it is full.
///
/// Expiry granularity is that of the tokio timer (1ms).
pub struct BoundedDelayQueue<T> {
	inner: DelayQueue<T>,
	capacity: usize,
	delay: Duration,
}

impl<T> BoundedDelayQueue<T> {
	/// Creates an empty queue.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn new(capacity: usize, delay: Duration) -> Self {
		assert!(capacity > 0, "delay queue capacity must be > 0");
		Self {
			inner: DelayQueue::with_capacity(capacity.min(1024)),
			capacity,
			delay,
		}
	}

	/// Schedules `item` to come back after the configured delay.
	///
	/// Returns the item unchanged when the queue is full.
	pub fn push(&mut self, item: T) -> Result<(), T> {
		if !self.has_capacity() {
			return Err(item);
		}
		self.inner.insert(item, self.delay);
		Ok(())
	}

	/// Waits for the next expired item. Resolves to `None` immediately when
	/// the queue is empty.
	///
	/// Cancel safe.
	pub async fn next_expired(&mut self) -> Option<T> {
		poll_fn(|cx| self.poll_expired(cx)).await
	}

	fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
		self.inner.poll_expired(cx).map(|expired| expired.map(|e| e.into_inner()))
	}

	/// Returns `true` when another item can be pushed.
	pub fn has_capacity(&self) -> bool {
		self.inner.len() < self.capacity
	}

	/// Number of items waiting out their delay.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Returns `true` if nothing is waiting.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}
