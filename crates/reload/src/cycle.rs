use std::sync::Arc;

use swapmatch_serve::Matcher;
use swapmatch_table::TableSource;
use swapmatch_worker::{GenerationClock, TaskClass};
use tokio::sync::broadcast;

use crate::buffer::{self, DoubleBuffer, Reclaim};
use crate::event::Counters;
use crate::{ReloadError, ReloadEvent};

/// State shared by the reloader handle, the timer task and running cycles.
pub(crate) struct Shared {
	pub(crate) source: Arc<dyn TableSource>,
	pub(crate) matcher: Arc<dyn Matcher>,
	pub(crate) clock: GenerationClock,
	pub(crate) events: broadcast::Sender<ReloadEvent>,
	pub(crate) counters: Counters,
	pub(crate) prime_inactive: bool,
}

impl Shared {
	pub(crate) fn emit(&self, event: ReloadEvent) {
		// No subscribers is fine.
		let _ = self.events.send(event);
	}
}

/// Buffers handed back by a cycle along with what it published.
pub(crate) struct CycleOutput {
	pub(crate) buffers: DoubleBuffer,
	pub(crate) result: Result<u64, ReloadError>,
}

/// One rebuild-and-swap.
///
/// Filling the inactive buffer and reclaiming the replaced one both run on
/// the blocking pool. Nothing is swapped
/// unless the source produced a complete table; on failure the previously
/// published table keeps serving.
pub(crate) async fn run_cycle(shared: Arc<Shared>, mut buffers: DoubleBuffer, tick: u64) -> CycleOutput {
	shared.emit(ReloadEvent::CycleStarted { tick });
	tracing::debug!(tick, active_version = buffers.active().version(), "reload.cycle.start");

	let result = rebuild_and_swap(&shared, &mut buffers).await;
	if let Err(err) = &result {
		shared.counters.record_failure();
		tracing::warn!(tick, error = %err, "reload cycle failed");
		shared.emit(ReloadEvent::Failed { reason: err.to_string() });
	}
	CycleOutput { buffers, result }
}

async fn rebuild_and_swap(shared: &Shared, buffers: &mut DoubleBuffer) -> Result<u64, ReloadError> {
	let inactive = buffers.take_inactive();
	let source = Arc::clone(&shared.source);
	let populated = swapmatch_worker::spawn_blocking(TaskClass::CpuBlocking, move || {
		let mut table = inactive;
		let result = source.populate(&mut table);
		(table, result)
	})
	.await;

	let mut table = match populated {
		Ok((table, Ok(()))) => table,
		Ok((table, Err(err))) => {
			buffers.restore_inactive(table);
			return Err(err.into());
		}
		// The buffer went down with the task; `take_inactive` already left a
		// fresh one in its place.
		Err(join) => return Err(ReloadError::TaskFailed(join.to_string())),
	};

	let version = shared.clock.next();
	table.set_version(version);
	let entries = table.len();

	let (next, previous) = buffers.publish(table);
	let delivered = shared.matcher.update_cache(next).await;

	let active = Arc::clone(buffers.active());
	let prime = shared.prime_inactive;
	match swapmatch_worker::spawn_blocking(TaskClass::CpuBlocking, move || buffer::reclaim(previous, &active, prime)).await {
		Ok((table, how)) => {
			if how == Reclaim::Allocated {
				tracing::debug!(version, "reload.buffer.allocated");
			}
			buffers.restore_inactive(table);
		}
		// The next cycle fills the empty buffer `take_inactive` left behind.
		Err(join) => tracing::warn!(version, error = %join, "buffer reclaim failed"),
	}
	delivered?;

	shared.counters.record_published(version);
	tracing::info!(matcher = shared.matcher.name(), version, entries, "cache updated");
	shared.emit(ReloadEvent::CacheUpdated { version, entries });
	Ok(version)
}
