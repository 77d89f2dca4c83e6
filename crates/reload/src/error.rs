use swapmatch_serve::MatchError;
use swapmatch_table::SourceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReloadError {
	#[error("table source failed: {0}")]
	Source(#[from] SourceError),
	#[error("matcher rejected update: {0}")]
	Matcher(#[from] MatchError),
	#[error("reloader stopped")]
	Stopped,
	/// The rebuild task panicked or was cancelled.
	#[error("reload task failed: {0}")]
	TaskFailed(String),
}
