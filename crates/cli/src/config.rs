//! TOML settings file, merged with command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use swapmatch_reload::ReloaderConfig;
use swapmatch_serve::{ActorConfig, LockConfig};
use thiserror::Error;

use crate::cli::{Cli, Granularity};
use crate::load::LoadConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {}: {error}", path.display())]
	Io { path: PathBuf, error: std::io::Error },
	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid config: {0}")]
	Invalid(String),
}

/// Resolved settings. Every key is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub table: TableSection,
	pub reload: ReloadSection,
	pub actor: ActorSection,
	pub lock: LockSection,
	pub load: LoadSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableSection {
	pub entries: usize,
}

/// One million synthetic entries unless overridden.
impl Default for TableSection {
	fn default() -> Self {
		Self { entries: 1_000_000 }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReloadSection {
	pub interval_ms: u64,
	pub prime_inactive: bool,
}

impl Default for ReloadSection {
	fn default() -> Self {
		Self {
			interval_ms: 10_000,
			prime_inactive: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActorSection {
	pub workers: usize,
	pub queue_capacity: usize,
	pub storeroom_capacity: usize,
	pub io_delay_us: u64,
}

impl Default for ActorSection {
	fn default() -> Self {
		Self {
			workers: 10,
			queue_capacity: 1000,
			storeroom_capacity: 1000,
			io_delay_us: 50,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSection {
	pub granularity: Granularity,
	pub io_delay_us: u64,
}

impl Default for LockSection {
	fn default() -> Self {
		Self {
			granularity: Granularity::Fine,
			io_delay_us: 10,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadSection {
	pub producers: usize,
	pub requests: usize,
	pub max_in_flight: usize,
}

impl Default for LoadSection {
	fn default() -> Self {
		Self {
			producers: 2,
			requests: 500_000,
			max_in_flight: 10_000,
		}
	}
}

impl Config {
	/// Reads `path`, or returns defaults when no file is given.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let Some(path) = path else {
			return Ok(Self::default());
		};
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io { path: path.to_path_buf(), error })?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	pub fn parse(content: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(content)?)
	}

	/// Loads the file named on the command line, applies flag overrides and
	/// validates the result.
	pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
		let mut config = Self::load(cli.config.as_deref())?;
		config.apply(cli);
		config.validate()?;
		Ok(config)
	}

	pub fn apply(&mut self, cli: &Cli) {
		if let Some(granularity) = cli.granularity {
			self.lock.granularity = granularity;
		}
		if let Some(workers) = cli.workers {
			self.actor.workers = workers;
		}
		if let Some(producers) = cli.producers {
			self.load.producers = producers;
		}
		if let Some(requests) = cli.requests {
			self.load.requests = requests;
		}
		if let Some(entries) = cli.entries {
			self.table.entries = entries;
		}
		if let Some(interval_ms) = cli.interval_ms {
			self.reload.interval_ms = interval_ms;
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let positive = [
			("actor.workers", self.actor.workers),
			("actor.queue_capacity", self.actor.queue_capacity),
			("actor.storeroom_capacity", self.actor.storeroom_capacity),
			("load.producers", self.load.producers),
			("load.max_in_flight", self.load.max_in_flight),
		];
		if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
			return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
		}
		if self.reload.interval_ms == 0 {
			return Err(ConfigError::Invalid("reload.interval_ms must be at least 1".into()));
		}
		if u32::try_from(self.load.max_in_flight).is_err() {
			return Err(ConfigError::Invalid(format!("load.max_in_flight must not exceed {}", u32::MAX)));
		}
		Ok(())
	}

	pub fn actor_config(&self) -> ActorConfig {
		ActorConfig {
			workers: self.actor.workers,
			queue_capacity: self.actor.queue_capacity,
			storeroom_capacity: self.actor.storeroom_capacity,
			io_delay: Duration::from_micros(self.actor.io_delay_us),
		}
	}

	pub fn lock_config(&self) -> LockConfig {
		LockConfig {
			granularity: self.lock.granularity.into(),
			io_delay: Duration::from_micros(self.lock.io_delay_us),
		}
	}

	pub fn reloader_config(&self) -> ReloaderConfig {
		ReloaderConfig {
			interval: Duration::from_millis(self.reload.interval_ms),
			prime_inactive: self.reload.prime_inactive,
		}
	}

	pub fn load_config(&self) -> LoadConfig {
		LoadConfig {
			producers: self.load.producers,
			requests: self.load.requests,
			max_in_flight: self.load.max_in_flight,
			..LoadConfig::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use swapmatch_serve::LockGranularity;

	use super::*;

	const FULL: &str = r#"
[table]
entries = 500

[reload]
interval_ms = 250
prime_inactive = false

[actor]
workers = 3
queue_capacity = 16
storeroom_capacity = 8
io_delay_us = 100

[lock]
granularity = "coarse"
io_delay_us = 20

[load]
producers = 4
requests = 1000
max_in_flight = 64
"#;

	#[test]
	fn parses_every_section() {
		let config = Config::parse(FULL).unwrap();
		assert_eq!(config.table.entries, 500);
		assert!(!config.reload.prime_inactive);
		assert_eq!(config.actor_config().io_delay, Duration::from_micros(100));
		assert_eq!(config.actor_config().storeroom_capacity, 8);
		assert_eq!(config.lock_config().granularity, LockGranularity::Coarse);
		assert_eq!(config.reloader_config().interval, Duration::from_millis(250));
		assert_eq!(config.load_config().max_in_flight, 64);
		config.validate().unwrap();
	}

	#[test]
	fn missing_keys_fall_back_to_defaults() {
		let config = Config::parse("[actor]\nworkers = 4\n").unwrap();
		assert_eq!(config.actor.workers, 4);
		assert_eq!(config.actor.queue_capacity, 1000);
		assert_eq!(config.load, LoadSection::default());
		assert_eq!(Config::parse("").unwrap(), Config::default());
	}

	#[test]
	fn default_table_holds_one_million_entries() {
		assert_eq!(Config::default().table.entries, 1_000_000);
		let cli = Cli::try_parse_from(["swapmatch", "--entries", "10000000"]).unwrap();
		assert_eq!(Config::resolve(&cli).unwrap().table.entries, 10_000_000);
	}

	#[test]
	fn rejects_unknown_keys() {
		assert!(matches!(Config::parse("[actor]\nthreads = 4\n"), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn flags_override_file_values() {
		let mut config = Config::parse(FULL).unwrap();
		let cli = Cli::try_parse_from(["swapmatch", "--workers", "7", "--granularity", "fine", "--entries", "9"]).unwrap();
		config.apply(&cli);

		assert_eq!(config.actor.workers, 7);
		assert_eq!(config.lock.granularity, Granularity::Fine);
		assert_eq!(config.table.entries, 9);
		assert_eq!(config.load.producers, 4, "untouched keys keep file values");
	}

	#[test]
	fn zero_sized_pool_is_invalid() {
		let config = Config::parse("[actor]\nworkers = 0\n").unwrap();
		let err = config.validate().unwrap_err();
		assert_eq!(err.to_string(), "invalid config: actor.workers must be at least 1");
	}

	#[test]
	fn missing_file_reports_path() {
		let err = Config::load(Some(Path::new("/nonexistent/swapmatch.toml"))).unwrap_err();
		assert!(matches!(&err, ConfigError::Io { path, .. } if path.ends_with("swapmatch.toml")));
	}
}
