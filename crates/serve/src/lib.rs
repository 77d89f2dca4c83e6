//! Lookup-serving strategies.
//!
//! Two [`Matcher`] implementations answer point lookups against the
//! currently published [`SkuTable`] while a reloader swaps new tables in:
//!
//! * [`ActorMatcher`]: a fixed pool of worker tasks, each owning its own
//!   table handle; lookups are dispatched round robin over mailboxes.
//! * [`LockMatcher`]: one shared table handle behind a reader-writer lock
//!   that callers read directly.
//!
//! Callers should depend on `Arc<dyn Matcher>` only.

use std::sync::Arc;

use async_trait::async_trait;
use swapmatch_table::SkuTable;

mod actor;
mod error;
mod lock;

pub use actor::{ActorConfig, ActorMatcher, RoundRobin, WorkerEvent, WorkerStats};
pub use error::MatchError;
pub use lock::{LockConfig, LockGranularity, LockMatcher};

/// Capability set shared by every serving strategy.
#[async_trait]
pub trait Matcher: Send + Sync + 'static {
	/// Publishes a fully built table to the matcher.
	///
	/// Returning does not imply every subsequent lookup already sees the new
	/// table; see the consistency notes on each implementation.
	async fn update_cache(&self, table: Arc<SkuTable>) -> Result<(), MatchError>;

	/// Looks up `key`, returning the empty string when it is absent.
	async fn find_match(&self, key: &str) -> Result<String, MatchError>;

	/// Short strategy name used in logs.
	fn name(&self) -> &'static str;
}
