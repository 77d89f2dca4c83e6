use std::future::Future;

use tokio::task::{JoinError, JoinSet};

use crate::TaskClass;

/// Class-tagged wrapper for a Tokio [`JoinSet`].
///
/// Task spawning is routed through the worker runtime handle so tasks are
/// attached to the active runtime even when the set is driven from a
/// context that did not create it.
#[derive(Debug)]
pub struct WorkerJoinSet<T> {
	class: TaskClass,
	inner: JoinSet<T>,
}

impl<T> WorkerJoinSet<T>
where
	T: Send + 'static,
{
	/// Creates an empty worker join set for the given task class.
	pub fn new(class: TaskClass) -> Self {
		Self { class, inner: JoinSet::new() }
	}

	/// Returns the number of tasks currently in the set.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	/// Returns `true` if the set is empty.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Spawns a future into the set on the current worker runtime handle.
	#[allow(clippy::disallowed_methods)]
	pub fn spawn<F>(&mut self, fut: F)
	where
		F: Future<Output = T> + Send + 'static,
	{
		tracing::trace!(worker_class = self.class.as_str(), pending = self.inner.len(), "worker.join_set.spawn");
		let handle = crate::spawn::runtime_handle();
		self.inner.spawn_on(fut, &handle);
	}

	/// Waits for every task, returning successful outputs and the number of
	/// tasks that failed to join.
	///
	/// Cancel safe: tasks not yet joined stay in the set and a later call
	/// picks them up. Outputs collected before the cancellation are lost.
	pub async fn join_all(&mut self) -> (Vec<T>, usize) {
		let mut outputs = Vec::with_capacity(self.inner.len());
		let mut failed = 0usize;
		while let Some(res) = self.inner.join_next().await {
			match res {
				Ok(out) => outputs.push(out),
				Err(err) => {
					failed += 1;
					log_join_error(self.class, &err);
				}
			}
		}
		(outputs, failed)
	}
}

fn log_join_error(class: TaskClass, err: &JoinError) {
	if err.is_panic() {
		tracing::error!(worker_class = class.as_str(), error = %err, "worker.join_set.panicked");
	} else {
		tracing::debug!(worker_class = class.as_str(), error = %err, "worker.join_set.cancelled");
	}
}
