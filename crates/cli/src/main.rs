//! swapmatch binary.
//!
//! Starts one matcher, keeps its table fresh with a background reloader and
//! drives lookup load against it:
//! - `swapmatch` serves from a pool of worker actors
//! - `swapmatch passive` serves from a reader-writer locked table

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use swapmatch_reload::CacheReloader;
use swapmatch_serve::{ActorMatcher, LockMatcher, Matcher};
use swapmatch_table::SyntheticSource;
use swapmatch_worker::ShutdownMode;
use tracing::info;

mod cli;
mod config;
mod load;

use crate::cli::{Cli, Model};
use crate::config::Config;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

enum Serving {
	Actor(Arc<ActorMatcher>),
	Passive(Arc<LockMatcher>),
}

impl Serving {
	fn build(model: Model, config: &Config) -> anyhow::Result<Self> {
		Ok(match model {
			Model::Actor => Self::Actor(Arc::new(ActorMatcher::new(config.actor_config()).context("failed to start actor pool")?)),
			Model::Passive => Self::Passive(Arc::new(LockMatcher::new(config.lock_config()))),
		})
	}

	fn matcher(&self) -> Arc<dyn Matcher> {
		match self {
			Self::Actor(actor) => actor.clone(),
			Self::Passive(lock) => lock.clone(),
		}
	}

	async fn shutdown(&self) {
		if let Self::Actor(actor) = self {
			let report = actor.shutdown(ShutdownMode::Graceful { timeout: SHUTDOWN_GRACE }).await;
			if report.timed_out() {
				tracing::warn!("actor pool did not drain before the grace period ended");
			}
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	setup_tracing(cli.verbose);

	let config = Config::resolve(&cli)?;
	let serving = Serving::build(cli.model(), &config)?;
	let matcher = serving.matcher();
	info!(matcher = matcher.name(), entries = config.table.entries, "starting swapmatch");

	let source = Arc::new(SyntheticSource::new(config.table.entries));
	let reloader = CacheReloader::start(source, Arc::clone(&matcher), config.reloader_config())
		.await
		.context("initial table load failed")?;

	let report = load::run(Arc::clone(&matcher), &config.load_config()).await;
	info!(
		took = ?report.took,
		issued = report.issued,
		hits = report.hits,
		misses = report.misses,
		failed = report.failed,
		"took"
	);

	reloader.stop().await;
	let stats = reloader.stats();
	info!(cycles = stats.cycles, missed_ticks = stats.missed_ticks, failures = stats.failures, "reloads");
	serving.shutdown().await;

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let default_filter = || {
		if verbose {
			EnvFilter::new("swapmatch=debug,swapmatch_reload=debug,swapmatch_serve=debug,info")
		} else {
			EnvFilter::new("info")
		}
	};

	// SWAPMATCH_LOG_DIR sends logs to a per-process file instead of stderr.
	if let Some(log_dir) = std::env::var("SWAPMATCH_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("swapmatch.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);

			tracing_subscriber::registry().with(filter).with(file_layer).init();
			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
