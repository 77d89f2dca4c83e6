use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use swapmatch_serve::LockGranularity;

#[derive(Parser, Debug)]
#[command(name = "swapmatch")]
#[command(about = "Serve lookups against a periodically rebuilt table and measure throughput")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Serving model: `passive` uses the shared-lock matcher, anything else the actor pool
	pub model: Option<String>,

	/// TOML configuration file
	#[arg(long, short = 'c', value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Read-lock granularity for the passive model
	#[arg(long, value_enum)]
	pub granularity: Option<Granularity>,

	/// Actor pool size
	#[arg(long)]
	pub workers: Option<usize>,

	/// Concurrent request producers
	#[arg(long)]
	pub producers: Option<usize>,

	/// Lookups issued by each producer
	#[arg(long)]
	pub requests: Option<usize>,

	/// Entries in the synthetic table
	#[arg(long)]
	pub entries: Option<usize>,

	/// Milliseconds between reload cycles
	#[arg(long, value_name = "MS")]
	pub interval_ms: Option<u64>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Model {
	#[default]
	Actor,
	Passive,
}

impl Cli {
	pub fn model(&self) -> Model {
		match self.model.as_deref() {
			Some("passive") => Model::Passive,
			_ => Model::Actor,
		}
	}
}

#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
	Coarse,
	#[default]
	Fine,
}

impl From<Granularity> for LockGranularity {
	fn from(value: Granularity) -> Self {
		match value {
			Granularity::Coarse => LockGranularity::Coarse,
			Granularity::Fine => LockGranularity::Fine,
		}
	}
}
