use thiserror::Error;

/// Errors surfaced by [`Matcher`](crate::Matcher) operations.
///
/// A missing key is not an error; it yields an empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
	/// The matcher was shut down, or the worker owning the query went away
	/// before replying.
	#[error("matcher closed")]
	Closed,
	/// An actor matcher was configured with zero workers.
	#[error("worker pool must contain at least one worker")]
	EmptyPool,
}
