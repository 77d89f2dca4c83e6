//! Shared-state matcher.
//!
//! Every caller reads one table handle behind a [`tokio::sync::RwLock`]. The
//! reloader takes the write lock only to replace the handle; building the
//! next table happens elsewhere.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swapmatch_table::SkuTable;
use tokio::sync::RwLock;

use crate::{MatchError, Matcher};

/// How long a lookup holds the read lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockGranularity {
	/// One read guard spans phase 1, the simulated I/O wait and phase 2.
	/// Both phases see the same table and an update waits for in-flight
	/// lookups.
	Coarse,
	/// A read guard is taken around each phase and released during the
	/// wait, so an update can land between the two phases.
	#[default]
	Fine,
}

impl LockGranularity {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Coarse => "coarse",
			Self::Fine => "fine",
		}
	}
}

#[derive(Debug, Clone)]
pub struct LockConfig {
	pub granularity: LockGranularity,
	pub io_delay: Duration,
}

impl Default for LockConfig {
	fn default() -> Self {
		Self {
			granularity: LockGranularity::default(),
			io_delay: Duration::from_micros(10),
		}
	}
}

/// Reader-writer lock matcher.
///
/// Updates are linearizable: a lookup that acquires its read guard after
/// [`update_cache`](Matcher::update_cache) returned sees the new table.
pub struct LockMatcher {
	slot: RwLock<Option<Arc<SkuTable>>>,
	config: LockConfig,
}

impl LockMatcher {
	pub fn new(config: LockConfig) -> Self {
		tracing::debug!(granularity = config.granularity.as_str(), io_delay = ?config.io_delay, "serve.lock.created");
		Self { slot: RwLock::new(None), config }
	}

	/// Version of the installed table, or `None` before the first update.
	pub async fn current_version(&self) -> Option<u64> {
		self.slot.read().await.as_ref().map(|table| table.version())
	}

	async fn find_coarse(&self, key: &str) -> String {
		let guard = self.slot.read().await;
		let Some(table) = guard.as_ref() else {
			return String::new();
		};
		black_box(table.lookup(key));
		tokio::time::sleep(self.config.io_delay).await;
		table.lookup(key).to_owned()
	}

	async fn find_fine(&self, key: &str) -> String {
		{
			let guard = self.slot.read().await;
			let Some(table) = guard.as_ref() else {
				return String::new();
			};
			black_box(table.lookup(key));
		}
		tokio::time::sleep(self.config.io_delay).await;
		let guard = self.slot.read().await;
		guard.as_ref().map(|table| table.lookup(key).to_owned()).unwrap_or_default()
	}
}

impl Default for LockMatcher {
	fn default() -> Self {
		Self::new(LockConfig::default())
	}
}

#[async_trait]
impl Matcher for LockMatcher {
	async fn update_cache(&self, table: Arc<SkuTable>) -> Result<(), MatchError> {
		let version = table.version();
		let previous = self.slot.write().await.replace(table);
		tracing::info!(matcher = "passive", version, replaced = previous.map(|t| t.version()), "cache updated");
		Ok(())
	}

	async fn find_match(&self, key: &str) -> Result<String, MatchError> {
		Ok(match self.config.granularity {
			LockGranularity::Coarse => self.find_coarse(key).await,
			LockGranularity::Fine => self.find_fine(key).await,
		})
	}

	fn name(&self) -> &'static str {
		"passive"
	}
}
