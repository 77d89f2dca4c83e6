use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::broadcast;

use super::*;

fn table(version: u64, pairs: &[(&str, &str)]) -> Arc<SkuTable> {
	let mut table: SkuTable = pairs.iter().copied().collect();
	table.set_version(version);
	Arc::new(table)
}

fn numbered(version: u64, n: usize) -> Arc<SkuTable> {
	let mut table: SkuTable = (0..n).map(|i| (i.to_string(), format!("v{i}"))).collect();
	table.set_version(version);
	Arc::new(table)
}

fn config(workers: usize, io_delay: Duration) -> ActorConfig {
	ActorConfig {
		workers,
		io_delay,
		..ActorConfig::default()
	}
}

async fn next_event(rx: &mut broadcast::Receiver<WorkerEvent>) -> WorkerEvent {
	loop {
		match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
			Ok(Ok(evt)) => return evt,
			Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
			Ok(Err(broadcast::error::RecvError::Closed)) => panic!("event channel closed"),
			Err(_) => panic!("timed out waiting for worker event"),
		}
	}
}

/// Broadcasts `table` and waits until every worker has installed it.
async fn install(matcher: &ActorMatcher, table: Arc<SkuTable>) {
	let mut events = matcher.subscribe();
	let version = table.version();
	matcher.update_cache(table).await.unwrap();

	let mut pending: HashSet<usize> = (0..matcher.pool_size()).collect();
	while !pending.is_empty() {
		if let WorkerEvent::TableInstalled { worker, version: installed } = next_event(&mut events).await
			&& installed == version
		{
			pending.remove(&worker);
		}
	}
}

#[tokio::test]
async fn find_match_returns_table_values() {
	let matcher = ActorMatcher::new(config(3, Duration::from_micros(50))).unwrap();
	matcher.update_cache(numbered(1, 100)).await.unwrap();

	for i in [0usize, 5, 42, 99] {
		assert_eq!(matcher.find_match(&i.to_string()).await.unwrap(), format!("v{i}"));
	}
	assert_eq!(matcher.find_match("missing").await.unwrap(), "");
}

#[tokio::test]
async fn query_before_any_table_returns_empty() {
	let matcher = ActorMatcher::new(config(2, Duration::from_micros(50))).unwrap();
	let mut events = matcher.subscribe();

	assert_eq!(matcher.find_match("0").await.unwrap(), "");
	assert!(matches!(next_event(&mut events).await, WorkerEvent::Uninitialized { worker: 0, ticket: 0 }));
}

#[tokio::test]
async fn rejects_empty_pool() {
	let result = ActorMatcher::new(config(0, Duration::from_micros(50)));
	assert_eq!(result.err(), Some(MatchError::EmptyPool));
}

#[tokio::test]
async fn round_robin_assigns_tickets_cyclically() {
	const POOL: usize = 4;
	let matcher = ActorMatcher::with_dispatch(config(POOL, Duration::from_micros(50)), RoundRobin::starting_at(1)).unwrap();
	matcher.update_cache(numbered(1, 10)).await.unwrap();
	let mut events = matcher.subscribe();

	for i in 0..40usize {
		matcher.find_match(&(i % 10).to_string()).await.unwrap();
	}

	let mut seen = 0;
	while seen < 40 {
		if let WorkerEvent::PhaseTwo { worker, ticket, .. } = next_event(&mut events).await {
			assert_eq!(worker, (ticket % POOL as u64) as usize, "ticket {ticket} went to the wrong worker");
			seen += 1;
		}
	}

	let served: Vec<u64> = matcher.worker_stats().iter().map(|s| s.served).collect();
	assert_eq!(served, vec![10; POOL]);
}

#[tokio::test]
async fn phase_one_completes_before_phase_two() {
	let matcher = Arc::new(ActorMatcher::new(config(3, Duration::from_millis(2))).unwrap());
	matcher.update_cache(numbered(1, 50)).await.unwrap();
	let mut events = matcher.subscribe();

	let mut callers = Vec::new();
	for i in 0..50usize {
		let matcher = Arc::clone(&matcher);
		callers.push(swapmatch_worker::spawn(TaskClass::Interactive, async move {
			matcher.find_match(&i.to_string()).await
		}));
	}
	for caller in callers {
		assert!(caller.await.unwrap().is_ok());
	}

	let mut phase_one: HashMap<u64, usize> = HashMap::new();
	let mut phase_two: HashMap<u64, usize> = HashMap::new();
	let mut position = 0usize;
	while phase_two.len() < 50 {
		match next_event(&mut events).await {
			WorkerEvent::PhaseOne { ticket, .. } => {
				phase_one.insert(ticket, position);
			}
			WorkerEvent::PhaseTwo { ticket, .. } => {
				phase_two.insert(ticket, position);
			}
			_ => {}
		}
		position += 1;
	}

	for (ticket, two) in &phase_two {
		let one = phase_one.get(ticket).unwrap_or_else(|| panic!("ticket {ticket} finished without phase 1"));
		assert!(one < two, "ticket {ticket}: phase 1 at {one}, phase 2 at {two}");
	}
}

#[tokio::test]
async fn phase_two_uses_table_installed_during_delay() {
	let matcher = Arc::new(ActorMatcher::new(config(1, Duration::from_millis(200))).unwrap());
	install(&matcher, table(1, &[("sku", "old")])).await;
	let mut events = matcher.subscribe();

	let pending = swapmatch_worker::spawn(TaskClass::Interactive, {
		let matcher = Arc::clone(&matcher);
		async move { matcher.find_match("sku").await }
	});

	assert_eq!(next_event(&mut events).await, WorkerEvent::PhaseOne { worker: 0, ticket: 0, version: 1 });
	matcher.update_cache(table(2, &[("sku", "new")])).await.unwrap();

	assert_eq!(pending.await.unwrap(), Ok("new".to_string()));
	assert_eq!(next_event(&mut events).await, WorkerEvent::TableInstalled { worker: 0, version: 2 });
	assert_eq!(next_event(&mut events).await, WorkerEvent::PhaseTwo { worker: 0, ticket: 0, version: 2 });
}

#[tokio::test]
async fn workers_converge_after_broadcast() {
	const POOL: usize = 4;
	let matcher = ActorMatcher::new(config(POOL, Duration::from_micros(50))).unwrap();
	matcher.update_cache(table(1, &[("5", "old")])).await.unwrap();
	let mut events = matcher.subscribe();

	matcher.update_cache(table(2, &[("5", "new")])).await.unwrap();

	let mut installed = [false; POOL];
	while !installed.iter().all(|done| *done) {
		if let WorkerEvent::TableInstalled { worker, version: 2 } = next_event(&mut events).await {
			installed[worker] = true;
		}
	}

	for _ in 0..POOL * 3 {
		assert_eq!(matcher.find_match("5").await.unwrap(), "new");
	}
	assert!(matcher.worker_stats().iter().all(|s| s.table_version == 2));
}

/// Holds on the current-thread runtime: a worker polls its update mailbox
/// before its query mailbox, so a table accepted before a lookup is sent is
/// installed before that lookup is admitted.
#[tokio::test]
async fn lookups_after_update_returns_see_new_table() {
	let matcher = ActorMatcher::new(config(4, Duration::from_micros(50))).unwrap();
	matcher.update_cache(table(1, &[("5", "old")])).await.unwrap();
	matcher.update_cache(table(2, &[("5", "new")])).await.unwrap();

	for _ in 0..16 {
		assert_eq!(matcher.find_match("5").await.unwrap(), "new");
	}
}

#[tokio::test]
async fn tiny_queues_apply_backpressure_without_losing_queries() {
	let matcher = Arc::new(
		ActorMatcher::new(ActorConfig {
			workers: 2,
			queue_capacity: 1,
			storeroom_capacity: 1,
			io_delay: Duration::from_millis(1),
		})
		.unwrap(),
	);
	matcher.update_cache(numbered(1, 40)).await.unwrap();

	let mut callers = Vec::new();
	for i in 0..40usize {
		let matcher = Arc::clone(&matcher);
		callers.push(swapmatch_worker::spawn(TaskClass::Interactive, async move {
			(i, matcher.find_match(&i.to_string()).await)
		}));
	}

	for caller in callers {
		let (i, result) = tokio::time::timeout(Duration::from_secs(5), caller).await.unwrap().unwrap();
		assert_eq!(result, Ok(format!("v{i}")));
	}
	let total: u64 = matcher.worker_stats().iter().map(|s| s.served).sum();
	assert_eq!(total, 40);
}

#[tokio::test]
async fn graceful_shutdown_answers_parked_queries() {
	let matcher = Arc::new(ActorMatcher::new(config(2, Duration::from_millis(100))).unwrap());
	install(&matcher, numbered(1, 4)).await;
	let mut events = matcher.subscribe();

	let pending = swapmatch_worker::spawn(TaskClass::Interactive, {
		let matcher = Arc::clone(&matcher);
		async move { matcher.find_match("3").await }
	});
	assert!(matches!(next_event(&mut events).await, WorkerEvent::PhaseOne { .. }));

	let report = matcher.shutdown(ShutdownMode::Graceful { timeout: Duration::from_secs(2) }).await;
	assert!(report.completed());
	assert_eq!(pending.await.unwrap(), Ok("v3".to_string()));
	assert_eq!(matcher.find_match("3").await, Err(MatchError::Closed));
	assert_eq!(matcher.update_cache(numbered(2, 4)).await, Err(MatchError::Closed));
}

#[tokio::test]
async fn immediate_shutdown_fails_pending_callers() {
	let matcher = Arc::new(ActorMatcher::new(config(1, Duration::from_secs(30))).unwrap());
	install(&matcher, numbered(1, 4)).await;
	let mut events = matcher.subscribe();

	let pending = swapmatch_worker::spawn(TaskClass::Interactive, {
		let matcher = Arc::clone(&matcher);
		async move { matcher.find_match("1").await }
	});
	assert!(matches!(next_event(&mut events).await, WorkerEvent::PhaseOne { .. }));

	let report = tokio::time::timeout(Duration::from_secs(2), matcher.shutdown(ShutdownMode::Immediate))
		.await
		.expect("immediate shutdown should not wait for the delay");
	assert!(report.completed());
	assert_eq!(pending.await.unwrap(), Err(MatchError::Closed));
}

#[tokio::test]
async fn update_cache_returns_once_accepted_not_applied() {
	const POOL: usize = 3;
	let matcher = ActorMatcher::new(config(POOL, Duration::from_micros(50))).unwrap();
	install(&matcher, table(1, &[("k", "old")])).await;
	let mut events = matcher.subscribe();

	matcher.update_cache(table(2, &[("k", "new")])).await.unwrap();
	// No worker has run since the hand-off.
	assert!(matcher.worker_stats().iter().all(|s| s.table_version == 1));

	let mut installed = HashSet::new();
	while installed.len() < POOL {
		if let WorkerEvent::TableInstalled { worker, version: 2 } = next_event(&mut events).await {
			installed.insert(worker);
		}
	}
	assert!(matcher.worker_stats().iter().all(|s| s.table_version == 2));
}

#[tokio::test]
async fn replaced_table_is_released() {
	let matcher = ActorMatcher::new(config(2, Duration::from_micros(50))).unwrap();
	let first = numbered(1, 1_000);
	let released = Arc::downgrade(&first);
	install(&matcher, first).await;
	assert!(released.upgrade().is_some());

	install(&matcher, numbered(2, 10)).await;
	tokio::time::timeout(Duration::from_secs(2), async {
		while released.strong_count() > 0 {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	})
	.await
	.expect("old table should be freed once every worker dropped it");
	assert_eq!(matcher.find_match("5").await.unwrap(), "v5");
}
