use std::sync::Arc;

use swapmatch_table::SkuTable;

/// The two table buffers of a reloader.
///
/// The active buffer is shared with readers and never written again. The
/// inactive buffer is owned here and is the only table a cycle may fill.
#[derive(Debug, Default)]
pub(crate) struct DoubleBuffer {
	active: Arc<SkuTable>,
	inactive: SkuTable,
}

impl DoubleBuffer {
	pub(crate) fn active(&self) -> &Arc<SkuTable> {
		&self.active
	}

	/// Moves the inactive buffer out for rebuilding, leaving an empty one.
	pub(crate) fn take_inactive(&mut self) -> SkuTable {
		std::mem::take(&mut self.inactive)
	}

	/// Returns an unpublished buffer, e.g. after a failed rebuild.
	pub(crate) fn restore_inactive(&mut self, table: SkuTable) {
		self.inactive = table;
	}

	/// Makes `built` the active buffer and returns it together with the
	/// buffer it replaced.
	pub(crate) fn publish(&mut self, built: SkuTable) -> (Arc<SkuTable>, Arc<SkuTable>) {
		let next = Arc::new(built);
		let previous = std::mem::replace(&mut self.active, Arc::clone(&next));
		(next, previous)
	}

	#[cfg(test)]
	pub(crate) fn inactive(&self) -> &SkuTable {
		&self.inactive
	}
}

/// Turns the previously active buffer into the next inactive one.
///
/// A buffer some reader still holds is left to them; a fresh table sized
/// like `active` takes its place. With `prime`, the result starts as a copy
/// of `active`. Proportional to the table size, so callers run it on the
/// blocking pool.
pub(crate) fn reclaim(previous: Arc<SkuTable>, active: &SkuTable, prime: bool) -> (SkuTable, Reclaim) {
	let (mut table, reclaim) = match Arc::try_unwrap(previous) {
		Ok(table) => (table, Reclaim::Reused),
		Err(shared) => {
			tracing::debug!(version = shared.version(), holders = Arc::strong_count(&shared) - 1, "reload.buffer.still_shared");
			(SkuTable::with_capacity(active.len()), Reclaim::Allocated)
		}
	};
	if prime {
		table.copy_from(active);
	}
	(table, reclaim)
}

/// How the inactive buffer was obtained after a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reclaim {
	Reused,
	Allocated,
}
