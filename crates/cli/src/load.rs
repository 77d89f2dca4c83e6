//! Lookup load driver.
//!
//! Each producer issues `requests` lookups for keys `"0"` upward, every
//! lookup on its own task, pausing briefly after every tenth submission.
//! A semaphore caps the number of lookups in flight across producers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use swapmatch_serve::Matcher;
use swapmatch_worker::{TaskClass, WorkerJoinSet};
use tokio::sync::Semaphore;

const PACE_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct LoadConfig {
	pub producers: usize,
	pub requests: usize,
	pub max_in_flight: usize,
	/// Pause after every tenth submission. Tokio sleeps at millisecond
	/// resolution, so sub-millisecond values round up.
	pub pace: Duration,
}

impl Default for LoadConfig {
	fn default() -> Self {
		Self {
			producers: 2,
			requests: 500_000,
			max_in_flight: 10_000,
			pace: Duration::from_micros(10),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
	pub issued: u64,
	pub hits: u64,
	pub misses: u64,
	pub failed: u64,
	pub took: Duration,
}

#[derive(Default)]
struct Tally {
	issued: AtomicU64,
	hits: AtomicU64,
	misses: AtomicU64,
	failed: AtomicU64,
}

pub async fn run(matcher: Arc<dyn Matcher>, config: &LoadConfig) -> LoadReport {
	let start = Instant::now();
	let limit = config.max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
	let permits = Arc::new(Semaphore::new(limit));
	let tally = Arc::new(Tally::default());

	let mut producers = WorkerJoinSet::new(TaskClass::Background);
	for producer in 0..config.producers {
		let matcher = Arc::clone(&matcher);
		let permits = Arc::clone(&permits);
		let tally = Arc::clone(&tally);
		let (requests, pace) = (config.requests, config.pace);
		producers.spawn(async move {
			for i in 0..requests {
				let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
					break;
				};
				let matcher = Arc::clone(&matcher);
				let tally = Arc::clone(&tally);
				tally.issued.fetch_add(1, Ordering::Relaxed);
				swapmatch_worker::spawn(TaskClass::Interactive, async move {
					let counter = match matcher.find_match(&i.to_string()).await {
						Ok(value) if value.is_empty() => &tally.misses,
						Ok(_) => &tally.hits,
						Err(_) => &tally.failed,
					};
					counter.fetch_add(1, Ordering::Relaxed);
					drop(permit);
				});
				if (i + 1) % PACE_EVERY == 0 {
					tokio::time::sleep(pace).await;
				}
			}
			tracing::debug!(producer, requests, "load.producer.done");
		});
	}

	let (_, panicked) = producers.join_all().await;
	if panicked > 0 {
		tracing::warn!(panicked, "load producers failed");
	}
	// Every lookup holds a permit until it has been counted.
	if let Ok(all) = permits.acquire_many(limit as u32).await {
		drop(all);
	}

	LoadReport {
		issued: tally.issued.load(Ordering::Relaxed),
		hits: tally.hits.load(Ordering::Relaxed),
		misses: tally.misses.load(Ordering::Relaxed),
		failed: tally.failed.load(Ordering::Relaxed),
		took: start.elapsed(),
	}
}
