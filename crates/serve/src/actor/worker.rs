use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use swapmatch_table::SkuTable;
use swapmatch_worker::{BoundedDelayQueue, Mailbox, MailboxReceiver, MailboxSender, TaskClass};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use super::{ActorConfig, WorkerEvent};

/// One in-flight lookup.
pub(super) struct Query {
	pub(super) ticket: u64,
	pub(super) key: String,
	pub(super) reply: oneshot::Sender<String>,
}

#[derive(Debug, Default)]
pub(super) struct WorkerCounters {
	pub(super) served: AtomicU64,
	pub(super) version: AtomicU64,
	uninitialized: AtomicU64,
}

/// Matcher-side ends of one worker's mailboxes.
pub(super) struct WorkerPorts {
	pub(super) queries: MailboxSender<Query>,
	pub(super) updates: MailboxSender<Arc<SkuTable>>,
	pub(super) counters: Arc<WorkerCounters>,
}

/// Event loop state for one worker task.
pub(super) struct Worker {
	index: usize,
	table: Option<Arc<SkuTable>>,
	queries: MailboxReceiver<Query>,
	updates: MailboxReceiver<Arc<SkuTable>>,
	storeroom: BoundedDelayQueue<Query>,
	events: broadcast::Sender<WorkerEvent>,
	counters: Arc<WorkerCounters>,
	cancel: CancellationToken,
}

impl Worker {
	pub(super) fn new(index: usize, config: &ActorConfig, events: broadcast::Sender<WorkerEvent>, cancel: CancellationToken) -> (Self, WorkerPorts) {
		let (query_tx, query_rx) = Mailbox::new(config.queue_capacity).split();
		// Single slot: `update_cache` returns once the worker has taken the
		// previous table, not once it has applied the new one.
		let (update_tx, update_rx) = Mailbox::new(1).split();
		let counters = Arc::new(WorkerCounters::default());

		let worker = Self {
			index,
			table: None,
			queries: query_rx,
			updates: update_rx,
			storeroom: BoundedDelayQueue::new(config.storeroom_capacity, config.io_delay),
			events,
			counters: Arc::clone(&counters),
			cancel,
		};
		let ports = WorkerPorts {
			queries: query_tx,
			updates: update_tx,
			counters,
		};
		(worker, ports)
	}

	/// Runs until cancelled, or until the query mailbox is closed and every
	/// query parked in the storeroom has been answered.
	///
	/// Branch order matters: a pending table is installed before any further
	/// query is admitted, and parked queries are finished before new ones
	/// start.
	pub(super) async fn run(mut self) {
		let mut accepting = true;
		loop {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => {
					let abandoned = self.storeroom.len() + self.queries.drain().await.len();
					tracing::debug!(worker = self.index, abandoned, "serve.actor.worker.cancelled");
					break;
				}
				Some(table) = self.updates.recv() => self.install(table),
				Some(query) = self.storeroom.next_expired(), if !self.storeroom.is_empty() => self.finish(query),
				msg = self.queries.recv(), if accepting && self.storeroom.has_capacity() => match msg {
					Some(query) => self.admit(query),
					None => accepting = false,
				},
				else => break,
			}

			if !accepting && self.storeroom.is_empty() {
				break;
			}
		}
		tracing::debug!(worker = self.index, served = self.counters.served.load(Ordering::Relaxed), "serve.actor.worker.exit");
	}

	fn install(&mut self, table: Arc<SkuTable>) {
		let version = table.version();
		// The last owner frees the old table on the blocking pool.
		if let Some(previous) = self.table.replace(table).and_then(Arc::into_inner) {
			swapmatch_worker::spawn_blocking(TaskClass::CpuBlocking, move || drop(previous));
		}
		self.counters.version.store(version, Ordering::Release);
		tracing::debug!(worker = self.index, version, "serve.actor.worker.table_installed");
		let _ = self.events.send(WorkerEvent::TableInstalled { worker: self.index, version });
	}

	/// Phase 1: CPU match, then park the query for the simulated I/O wait.
	fn admit(&mut self, query: Query) {
		let Some(table) = self.table.as_ref() else {
			let count = self.counters.uninitialized.fetch_add(1, Ordering::Relaxed);
			if count % 1024 == 0 {
				tracing::warn!(worker = self.index, occurrences = count + 1, "query arrived before any table was installed");
			}
			self.emit(|| WorkerEvent::Uninitialized {
				worker: self.index,
				ticket: query.ticket,
			});
			let _ = query.reply.send(String::new());
			return;
		};

		black_box(table.lookup(&query.key));
		let version = table.version();
		self.emit(|| WorkerEvent::PhaseOne {
			worker: self.index,
			ticket: query.ticket,
			version,
		});

		// The select guard only admits queries while there is room.
		if let Err(query) = self.storeroom.push(query) {
			self.finish(query);
		}
	}

	/// Phase 2: CPU match against whatever table this worker holds now.
	fn finish(&mut self, query: Query) {
		let (value, version) = match self.table.as_ref() {
			Some(table) => (table.lookup(&query.key).to_owned(), table.version()),
			None => (String::new(), 0),
		};
		self.counters.served.fetch_add(1, Ordering::Relaxed);
		self.emit(|| WorkerEvent::PhaseTwo {
			worker: self.index,
			ticket: query.ticket,
			version,
		});
		// The caller may have given up; nothing to do then.
		let _ = query.reply.send(value);
	}

	fn emit(&self, event: impl FnOnce() -> WorkerEvent) {
		if self.events.receiver_count() > 0 {
			let _ = self.events.send(event());
		}
	}
}
