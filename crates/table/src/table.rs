use std::hint::black_box;

use rustc_hash::FxHashMap;

/// Number of repeated hash lookups performed by [`SkuTable::lookup`].
///
/// Stands in for a matching algorithm heavier than a single hash lookup so
/// both serving strategies are measured against the same CPU cost.
pub const LOOKUP_ROUNDS: usize = 50;

/// In-memory key to value table with a publication version.
///
/// Version 0 means the table has never been published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkuTable {
	entries: FxHashMap<String, String>,
	version: u64,
}

impl SkuTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
			version: 0,
		}
	}

	/// Matches `key` against the table, looking it up [`LOOKUP_ROUNDS`] times.
	///
	/// Returns the empty string for a missing key.
	pub fn lookup(&self, key: &str) -> &str {
		let mut found = "";
		for _ in 0..LOOKUP_ROUNDS {
			found = black_box(self.entries.get(black_box(key)).map_or("", String::as_str));
		}
		found
	}

	/// One hash lookup.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.get(key).map(String::as_str)
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.entries.insert(key.into(), value.into())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Removes every entry, keeping the allocation.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn set_version(&mut self, version: u64) {
		self.version = version;
	}

	/// Replaces this table's contents and version with a copy of `other`.
	pub fn copy_from(&mut self, other: &SkuTable) {
		self.entries.clone_from(&other.entries);
		self.version = other.version;
	}
}

impl<K, V> FromIterator<(K, V)> for SkuTable
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut table = SkuTable::new();
		table.extend(iter);
		table
	}
}

impl<K, V> Extend<(K, V)> for SkuTable
where
	K: Into<String>,
	V: Into<String>,
{
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		self.entries.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
	}
}
