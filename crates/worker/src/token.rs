use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic generation clock.
///
/// Generation 0 is reserved for "never issued"; the first call to
/// [`next`](Self::next) returns 1. Clones share the same counter.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generations_are_monotonic_and_shared() {
		let clock = GenerationClock::new();
		assert_eq!(clock.next(), 1);

		let shared = clock.clone();
		assert_eq!(shared.next(), 2);
		assert_eq!(clock.next(), 3);
	}
}
