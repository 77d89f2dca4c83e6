use std::time::Duration;

/// How a service should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
	/// Cancel immediately; queued work is dropped and its waiters see a
	/// closed error.
	Immediate,
	/// Stop admitting work, finish what is queued, and wait up to `timeout`.
	Graceful { timeout: Duration },
}

/// Outcome of a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
	completed: bool,
	timed_out: bool,
}

impl ShutdownReport {
	pub const fn new(completed: bool, timed_out: bool) -> Self {
		Self { completed, timed_out }
	}

	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		self.timed_out
	}
}
