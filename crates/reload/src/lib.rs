//! Double-buffered cache reloader.
//!
//! [`CacheReloader`] owns two table buffers. On every tick of a fixed
//! interval it rebuilds the inactive buffer from a [`TableSource`], publishes
//! it as the new active table and hands it to a [`Matcher`]. Readers only
//! ever receive an `Arc` to a complete table.
//!
//! Ticks are dropped, not queued, while a cycle is still running: each
//! dropped tick is logged and reported as [`ReloadEvent::MissedTick`].

use std::sync::Arc;
use std::time::Duration;

use swapmatch_serve::Matcher;
use swapmatch_table::TableSource;
use swapmatch_worker::{GenerationClock, Mailbox, MailboxSender, TaskClass, WorkerJoinSet};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio_util::sync::CancellationToken;

mod buffer;
mod cycle;
mod error;
mod event;
mod timer;

pub use error::ReloadError;
pub use event::{ReloadEvent, ReloadOutcome, ReloadStats};

use crate::buffer::DoubleBuffer;
use crate::cycle::{Shared, run_cycle};
use crate::timer::{ReplySlot, TimerTask};

const EVENT_BUFFER: usize = 256;
const COMMAND_BUFFER: usize = 8;

#[derive(Debug, Clone)]
pub struct ReloaderConfig {
	/// Time between scheduled cycles.
	pub interval: Duration,
	/// Copy the freshly published table into the reclaimed inactive buffer.
	pub prime_inactive: bool,
}

impl Default for ReloaderConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(10),
			prime_inactive: true,
		}
	}
}

/// Handle to a running reloader.
pub struct CacheReloader {
	shared: Arc<Shared>,
	commands: MailboxSender<ReplySlot>,
	cancel: CancellationToken,
	timer: Mutex<WorkerJoinSet<()>>,
}

impl CacheReloader {
	/// Runs one cycle to completion, then starts the timer.
	///
	/// The matcher has a table before this returns. A failure of that first
	/// cycle is returned and nothing is left running.
	pub async fn start(source: Arc<dyn TableSource>, matcher: Arc<dyn Matcher>, config: ReloaderConfig) -> Result<Self, ReloadError> {
		let (events, _) = broadcast::channel(EVENT_BUFFER);
		let shared = Arc::new(Shared {
			source,
			matcher,
			clock: GenerationClock::new(),
			events,
			counters: Default::default(),
			prime_inactive: config.prime_inactive,
		});

		let first = run_cycle(Arc::clone(&shared), DoubleBuffer::default(), 0).await;
		first.result?;

		let (commands, command_rx) = Mailbox::new(COMMAND_BUFFER).split();
		let cancel = CancellationToken::new();
		let task = TimerTask::new(Arc::clone(&shared), first.buffers, command_rx, cancel.clone(), config.interval);
		let mut timer = WorkerJoinSet::new(TaskClass::Background);
		timer.spawn(task.run());

		tracing::info!(matcher = shared.matcher.name(), interval = ?config.interval, prime_inactive = config.prime_inactive, "reloader started");
		Ok(Self {
			shared,
			commands,
			cancel,
			timer: Mutex::new(timer),
		})
	}

	/// Triggers a cycle now, subject to the same drop policy as scheduled
	/// ticks.
	pub async fn reload_now(&self) -> Result<ReloadOutcome, ReloadError> {
		let (reply, rx) = oneshot::channel();
		self.commands.send(reply).await.map_err(|_| ReloadError::Stopped)?;
		rx.await.map_err(|_| ReloadError::Stopped)
	}

	/// Stops the timer. A cycle that is already running completes first.
	pub async fn stop(&self) {
		self.commands.close().await;
		self.cancel.cancel();
		self.timer.lock().await.join_all().await;
		tracing::info!(stats = ?self.stats(), "reloader stopped");
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
		self.shared.events.subscribe()
	}

	pub fn stats(&self) -> ReloadStats {
		self.shared.counters.snapshot()
	}
}

impl Drop for CacheReloader {
	fn drop(&mut self) {
		self.cancel.cancel();
		self.commands.close_now();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, Ordering};

	use swapmatch_serve::{LockMatcher, MatchError};
	use swapmatch_table::{SkuTable, SourceError, StaticSource};

	use super::*;

	/// Static source that can be switched into failing.
	#[derive(Default)]
	struct Flaky {
		inner: StaticSource,
		failing: AtomicBool,
	}

	impl TableSource for Flaky {
		fn populate(&self, table: &mut SkuTable) -> Result<(), SourceError> {
			if self.failing.load(Ordering::SeqCst) {
				return Err(SourceError::Unavailable("feed offline".into()));
			}
			self.inner.populate(table)
		}
	}

	fn quiet() -> ReloaderConfig {
		ReloaderConfig {
			interval: Duration::from_secs(3600),
			..ReloaderConfig::default()
		}
	}

	#[tokio::test]
	async fn start_publishes_first_table() {
		let source = Arc::new(Flaky::default());
		source.inner.set("a", "1");
		let matcher = Arc::new(LockMatcher::default());

		let reloader = CacheReloader::start(source, matcher.clone(), quiet()).await.unwrap();
		assert_eq!(matcher.find_match("a").await, Ok("1".into()));
		assert_eq!(matcher.current_version().await, Some(1));
		assert_eq!(reloader.stats(), ReloadStats { cycles: 1, missed_ticks: 0, failures: 0, active_version: 1 });
		reloader.stop().await;
	}

	#[tokio::test]
	async fn start_fails_when_first_cycle_fails() {
		let source = Arc::new(Flaky::default());
		source.failing.store(true, Ordering::SeqCst);
		let matcher = Arc::new(LockMatcher::default());

		let err = CacheReloader::start(source, matcher.clone(), quiet()).await.err();
		assert_eq!(err, Some(ReloadError::Source(SourceError::Unavailable("feed offline".into()))));
		assert_eq!(matcher.current_version().await, None);
	}

	#[tokio::test]
	async fn reload_now_publishes_next_version() {
		let source = Arc::new(Flaky::default());
		source.inner.set("a", "1");
		let matcher = Arc::new(LockMatcher::default());
		let reloader = CacheReloader::start(source.clone(), matcher.clone(), quiet()).await.unwrap();
		let mut events = reloader.subscribe();

		source.inner.set("a", "2");
		assert_eq!(reloader.reload_now().await, Ok(ReloadOutcome::Completed { version: 2 }));
		assert_eq!(matcher.find_match("a").await, Ok("2".into()));

		assert_eq!(events.recv().await.unwrap(), ReloadEvent::CycleStarted { tick: 0 });
		assert_eq!(events.recv().await.unwrap(), ReloadEvent::CacheUpdated { version: 2, entries: 1 });
		reloader.stop().await;
	}

	#[tokio::test]
	async fn failed_cycle_keeps_previous_table() {
		let source = Arc::new(Flaky::default());
		source.inner.set("a", "1");
		let matcher = Arc::new(LockMatcher::default());
		let reloader = CacheReloader::start(source.clone(), matcher.clone(), quiet()).await.unwrap();
		let mut events = reloader.subscribe();

		source.inner.set("a", "2");
		source.failing.store(true, Ordering::SeqCst);
		let outcome = reloader.reload_now().await.unwrap();
		assert!(matches!(outcome, ReloadOutcome::Failed { .. }));
		assert_eq!(matcher.find_match("a").await, Ok("1".into()));
		assert_eq!(matcher.current_version().await, Some(1));

		assert_eq!(events.recv().await.unwrap(), ReloadEvent::CycleStarted { tick: 0 });
		assert!(matches!(events.recv().await.unwrap(), ReloadEvent::Failed { reason } if reason.contains("feed offline")));

		source.failing.store(false, Ordering::SeqCst);
		assert_eq!(reloader.reload_now().await, Ok(ReloadOutcome::Completed { version: 2 }));
		assert_eq!(matcher.find_match("a").await, Ok("2".into()));

		let stats = reloader.stats();
		assert_eq!((stats.cycles, stats.failures, stats.active_version), (2, 1, 2));
		reloader.stop().await;
	}

	#[tokio::test]
	async fn closed_matcher_fails_the_cycle() {
		let source = Arc::new(Flaky::default());
		let matcher = Arc::new(swapmatch_serve::ActorMatcher::new(Default::default()).unwrap());
		let reloader = CacheReloader::start(source, matcher.clone(), quiet()).await.unwrap();

		matcher.shutdown(swapmatch_worker::ShutdownMode::Immediate).await;
		let outcome = reloader.reload_now().await.unwrap();
		assert_eq!(outcome, ReloadOutcome::Failed { reason: ReloadError::Matcher(MatchError::Closed).to_string() });
		reloader.stop().await;
	}

	#[tokio::test]
	async fn reload_now_after_stop_is_rejected() {
		let source = Arc::new(Flaky::default());
		let reloader = CacheReloader::start(source, Arc::new(LockMatcher::default()), quiet()).await.unwrap();
		reloader.stop().await;
		assert_eq!(reloader.reload_now().await, Err(ReloadError::Stopped));
	}
}
