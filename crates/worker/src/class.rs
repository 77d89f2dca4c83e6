/// Execution classes used to tag spawned work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Lookup serving: matcher workers and the callers that feed them.
	Interactive,
	/// Timer-driven maintenance such as the reload loop.
	Background,
	/// CPU-heavy blocking work executed on the blocking pool (table rebuilds).
	CpuBlocking,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::CpuBlocking => "cpu_blocking",
		}
	}
}
