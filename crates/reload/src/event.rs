use std::sync::atomic::{AtomicU64, Ordering};

/// Reload lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
	/// A cycle began rebuilding the inactive buffer. Tick 0 is the cycle run by
	/// [`CacheReloader::start`](crate::CacheReloader::start).
	CycleStarted { tick: u64 },
	/// A rebuilt table was published and handed to the matcher.
	CacheUpdated { version: u64, entries: usize },
	/// A scheduled tick found the previous cycle still running and was dropped.
	MissedTick { tick: u64 },
	/// A cycle was abandoned; the previous table keeps serving.
	Failed { reason: String },
}

/// Result of a manually triggered cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
	Completed { version: u64 },
	Failed { reason: String },
	/// Another cycle was in flight.
	Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
	/// Cycles that published a table, including the startup cycle.
	pub cycles: u64,
	pub missed_ticks: u64,
	pub failures: u64,
	/// Version of the table most recently handed to the matcher.
	pub active_version: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
	cycles: AtomicU64,
	missed_ticks: AtomicU64,
	failures: AtomicU64,
	active_version: AtomicU64,
}

impl Counters {
	pub(crate) fn record_published(&self, version: u64) {
		self.cycles.fetch_add(1, Ordering::Relaxed);
		self.active_version.store(version, Ordering::Release);
	}

	pub(crate) fn record_missed_tick(&self) {
		self.missed_ticks.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self) -> ReloadStats {
		ReloadStats {
			cycles: self.cycles.load(Ordering::Relaxed),
			missed_ticks: self.missed_ticks.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
			active_version: self.active_version.load(Ordering::Acquire),
		}
	}
}
