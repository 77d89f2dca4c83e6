use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::SkuTable;

/// Errors a data source can report while filling a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
	/// The backing feed could not produce a complete table.
	#[error("table source unavailable: {0}")]
	Unavailable(String),
}

/// Backing data for reload cycles.
///
/// `populate` must leave `table` holding exactly the source's current
/// contents: anything the buffer held before is replaced. It runs on the
/// blocking pool, so implementations may do slow synchronous work.
pub trait TableSource: Send + Sync + 'static {
	fn populate(&self, table: &mut SkuTable) -> Result<(), SourceError>;
}

/// Generates keys `"0".."entries"` whose values are the wall-clock time in
/// microseconds at generation.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
	entries: usize,
}

impl SyntheticSource {
	pub fn new(entries: usize) -> Self {
		Self { entries }
	}
}

impl TableSource for SyntheticSource {
	fn populate(&self, table: &mut SkuTable) -> Result<(), SourceError> {
		table.clear();
		for i in 0..self.entries {
			let micros = SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map_err(|e| SourceError::Unavailable(format!("system clock before epoch: {e}")))?
				.as_micros();
			table.insert(i.to_string(), micros.to_string());
		}
		tracing::debug!(entries = self.entries, "table.synthetic.populated");
		Ok(())
	}
}

/// In-memory source whose contents can be edited between reload cycles.
#[derive(Debug, Default)]
pub struct StaticSource {
	entries: RwLock<FxHashMap<String, String>>,
}

impl StaticSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets one entry; takes effect on the next populate.
	pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
		self.entries.write().insert(key.into(), value.into());
	}

	/// Removes one entry; takes effect on the next populate.
	pub fn remove(&self, key: &str) -> Option<String> {
		self.entries.write().remove(key)
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for StaticSource
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let entries = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
		Self {
			entries: RwLock::new(entries),
		}
	}
}

impl TableSource for StaticSource {
	fn populate(&self, table: &mut SkuTable) -> Result<(), SourceError> {
		let entries = self.entries.read();
		table.clear();
		table.extend(entries.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		Ok(())
	}
}
