use std::sync::atomic::{AtomicU64, Ordering};

/// Round-robin ticket dispatcher.
///
/// Each call to [`next`](Self::next) takes one ticket from the counter and
/// maps it onto a pool slot as `ticket % pool_size`. Given a known starting
/// value the assignment is a deterministic cycle over the pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
	next: AtomicU64,
}

impl RoundRobin {
	pub fn new() -> Self {
		Self::default()
	}

	/// Dispatcher whose first ticket is `start`.
	pub fn starting_at(start: u64) -> Self {
		Self {
			next: AtomicU64::new(start),
		}
	}

	/// Takes the next ticket and returns it with its pool slot.
	///
	/// # Panics
	///
	/// Panics if `pool_size` is zero.
	pub fn next(&self, pool_size: usize) -> (u64, usize) {
		assert!(pool_size > 0, "round robin over an empty pool");
		let ticket = self.next.fetch_add(1, Ordering::Relaxed);
		let slot = (ticket % pool_size as u64) as usize;
		(ticket, slot)
	}
}
