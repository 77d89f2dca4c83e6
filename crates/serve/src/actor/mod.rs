//! Message-passing matcher.
//!
//! A fixed pool of workers each owns a private handle to the current table.
//! [`ActorMatcher::find_match`] picks a worker round robin, sends it the
//! query and waits for the reply. A worker handles a query in two CPU
//! phases: phase 1 runs when the query is admitted, then the query waits
//! out a simulated I/O delay in the worker's storeroom (a bounded delay
//! queue polled by the same event loop) and phase 2 runs against whatever
//! table the worker holds at that point.
//!
//! # Consistency
//!
//! [`ActorMatcher::update_cache`] hands the new table to every worker's
//! single-slot update mailbox in pool order and returns once each worker has
//! accepted it, not once each has applied it. Workers are therefore
//! eventually consistent with each other, within one update-channel depth:
//! during a broadcast two queries on different workers may be served from
//! different table versions, and a query whose phase 1 ran on the old table
//! may finish phase 2 on the new one. A worker always installs a pending
//! table before admitting another query.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use swapmatch_table::SkuTable;
use swapmatch_worker::{ShutdownMode, ShutdownReport, TaskClass, WorkerJoinSet};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{MatchError, Matcher};

mod dispatch;
mod worker;

pub use dispatch::RoundRobin;
use worker::{Query, Worker, WorkerPorts};

const EVENT_BUFFER: usize = 1024;

/// Actor pool sizing and timing.
#[derive(Debug, Clone)]
pub struct ActorConfig {
	/// Number of workers; fixed for the matcher's lifetime.
	pub workers: usize,
	/// Bound of each worker's query mailbox.
	pub queue_capacity: usize,
	/// Bound of each worker's storeroom (queries between phase 1 and 2).
	pub storeroom_capacity: usize,
	/// Simulated asynchronous I/O between the two phases.
	pub io_delay: Duration,
}

impl Default for ActorConfig {
	fn default() -> Self {
		Self {
			workers: 10,
			queue_capacity: 1000,
			storeroom_capacity: 1000,
			io_delay: Duration::from_micros(50),
		}
	}
}

/// Observable worker lifecycle events.
///
/// Query-level events are only produced while someone is subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
	TableInstalled { worker: usize, version: u64 },
	PhaseOne { worker: usize, ticket: u64, version: u64 },
	PhaseTwo { worker: usize, ticket: u64, version: u64 },
	Uninitialized { worker: usize, ticket: u64 },
}

/// Point-in-time counters for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
	pub index: usize,
	pub served: u64,
	pub table_version: u64,
}

/// Worker-pool matcher; see the module docs for its consistency level.
pub struct ActorMatcher {
	pool: Vec<WorkerPorts>,
	tasks: Mutex<WorkerJoinSet<()>>,
	dispatch: RoundRobin,
	events: broadcast::Sender<WorkerEvent>,
	cancel: CancellationToken,
}

impl ActorMatcher {
	/// Spawns the worker pool.
	pub fn new(config: ActorConfig) -> Result<Self, MatchError> {
		Self::with_dispatch(config, RoundRobin::new())
	}

	/// Spawns the worker pool with an explicit dispatcher.
	pub fn with_dispatch(config: ActorConfig, dispatch: RoundRobin) -> Result<Self, MatchError> {
		if config.workers == 0 {
			return Err(MatchError::EmptyPool);
		}

		let (events, _) = broadcast::channel(EVENT_BUFFER);
		let cancel = CancellationToken::new();
		let mut tasks = WorkerJoinSet::new(TaskClass::Interactive);
		let pool = (0..config.workers)
			.map(|index| {
				let (worker, ports) = Worker::new(index, &config, events.clone(), cancel.child_token());
				tasks.spawn(worker.run());
				ports
			})
			.collect();

		tracing::debug!(workers = config.workers, queue_capacity = config.queue_capacity, io_delay = ?config.io_delay, "serve.actor.spawned");
		Ok(Self {
			pool,
			tasks: Mutex::new(tasks),
			dispatch,
			events,
			cancel,
		})
	}

	pub fn pool_size(&self) -> usize {
		self.pool.len()
	}

	/// Subscribes to worker events.
	pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
		self.events.subscribe()
	}

	/// Per-worker counters, in pool order.
	pub fn worker_stats(&self) -> Vec<WorkerStats> {
		self.pool
			.iter()
			.enumerate()
			.map(|(index, ports)| WorkerStats {
				index,
				served: ports.counters.served.load(Ordering::Relaxed),
				table_version: ports.counters.version.load(Ordering::Acquire),
			})
			.collect()
	}

	/// Stops the pool.
	///
	/// Graceful shutdown stops admitting queries, lets every worker answer
	/// what it already queued, and cancels whatever is left at the timeout.
	/// Immediate shutdown cancels at once; pending callers get
	/// [`MatchError::Closed`].
	///
	/// Concurrent callers serialize on the task set; later ones find it
	/// empty and return at once.
	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		for ports in &self.pool {
			ports.queries.close().await;
			ports.updates.close().await;
		}

		let mut tasks = self.tasks.lock().await;
		match mode {
			ShutdownMode::Immediate => {
				self.cancel.cancel();
				tasks.join_all().await;
				ShutdownReport::new(true, false)
			}
			ShutdownMode::Graceful { timeout } => {
				if tokio::time::timeout(timeout, tasks.join_all()).await.is_ok() {
					return ShutdownReport::new(true, false);
				}
				tracing::warn!(workers = self.pool.len(), remaining = tasks.len(), "graceful pool shutdown timed out; cancelling");
				self.cancel.cancel();
				tasks.join_all().await;
				ShutdownReport::new(false, true)
			}
		}
	}
}

impl Drop for ActorMatcher {
	fn drop(&mut self) {
		self.cancel.cancel();
		for ports in &self.pool {
			ports.queries.close_now();
			ports.updates.close_now();
		}
	}
}

#[async_trait]
impl Matcher for ActorMatcher {
	async fn update_cache(&self, table: Arc<SkuTable>) -> Result<(), MatchError> {
		let version = table.version();
		for ports in &self.pool {
			ports.updates.send(Arc::clone(&table)).await.map_err(|_| MatchError::Closed)?;
		}
		tracing::info!(matcher = "actor", version, workers = self.pool.len(), "cache updated");
		Ok(())
	}

	async fn find_match(&self, key: &str) -> Result<String, MatchError> {
		let (ticket, slot) = self.dispatch.next(self.pool.len());
		let (reply, rx) = oneshot::channel();
		let query = Query {
			ticket,
			key: key.to_owned(),
			reply,
		};
		self.pool[slot].queries.send(query).await.map_err(|_| MatchError::Closed)?;
		rx.await.map_err(|_| MatchError::Closed)
	}

	fn name(&self) -> &'static str {
		"actor"
	}
}

#[cfg(test)]
mod tests;
