use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use swapmatch_worker::{MailboxReceiver, TaskClass};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ReloadEvent;
use crate::buffer::DoubleBuffer;
use crate::cycle::{CycleOutput, Shared, run_cycle};
use crate::event::ReloadOutcome;

pub(crate) type ReplySlot = oneshot::Sender<ReloadOutcome>;

struct InFlight {
	handle: JoinHandle<CycleOutput>,
	reply: Option<ReplySlot>,
}

/// The single task that owns the buffers between cycles.
///
/// At most one cycle runs at a time. `in_flight` is the in-progress flag:
/// while it is set, scheduled ticks are dropped and manual triggers are
/// answered with [`ReloadOutcome::Skipped`].
pub(crate) struct TimerTask {
	shared: Arc<Shared>,
	buffers: Option<DoubleBuffer>,
	in_flight: Option<InFlight>,
	commands: MailboxReceiver<ReplySlot>,
	cancel: CancellationToken,
	period: Duration,
	tick: u64,
}

impl TimerTask {
	pub(crate) fn new(shared: Arc<Shared>, buffers: DoubleBuffer, commands: MailboxReceiver<ReplySlot>, cancel: CancellationToken, period: Duration) -> Self {
		Self {
			shared,
			buffers: Some(buffers),
			in_flight: None,
			commands,
			cancel,
			period,
			tick: 0,
		}
	}

	pub(crate) async fn run(mut self) {
		// The startup cycle already ran; the first scheduled tick is one period out.
		let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => break,
				output = wait_in_flight(&mut self.in_flight) => self.finish(output),
				_ = ticker.tick() => {
					self.tick += 1;
					self.on_tick();
				}
				Some(reply) = self.commands.recv() => self.on_manual(reply),
			}
		}

		// Let a running cycle land so the matcher is never left mid-update.
		if self.in_flight.is_some() {
			let output = wait_in_flight(&mut self.in_flight).await;
			self.finish(output);
		}
		for reply in self.commands.drain().await {
			let _ = reply.send(ReloadOutcome::Skipped);
		}
		tracing::debug!(ticks = self.tick, "reload.timer.exit");
	}

	fn on_tick(&mut self) {
		if self.in_flight.is_some() {
			self.shared.counters.record_missed_tick();
			tracing::warn!(tick = self.tick, "reload missed tick");
			self.shared.emit(ReloadEvent::MissedTick { tick: self.tick });
			return;
		}
		self.start_cycle(None);
	}

	fn on_manual(&mut self, reply: ReplySlot) {
		if self.in_flight.is_some() {
			tracing::debug!(tick = self.tick, "reload.manual.skipped");
			let _ = reply.send(ReloadOutcome::Skipped);
			return;
		}
		self.start_cycle(Some(reply));
	}

	fn start_cycle(&mut self, reply: Option<ReplySlot>) {
		let buffers = self.buffers.take().unwrap_or_default();
		let handle = swapmatch_worker::spawn(TaskClass::Background, run_cycle(Arc::clone(&self.shared), buffers, self.tick));
		self.in_flight = Some(InFlight { handle, reply });
	}

	fn finish(&mut self, (output, reply): (Result<CycleOutput, JoinError>, Option<ReplySlot>)) {
		let outcome = match output {
			Ok(CycleOutput { buffers, result }) => {
				self.buffers = Some(buffers);
				match result {
					Ok(version) => ReloadOutcome::Completed { version },
					Err(err) => ReloadOutcome::Failed { reason: err.to_string() },
				}
			}
			Err(join) => {
				// The buffers were lost with the task; start over with empty ones.
				tracing::error!(error = %join, "reload.cycle.panicked");
				self.shared.counters.record_failure();
				let reason = format!("reload task failed: {join}");
				self.shared.emit(ReloadEvent::Failed { reason: reason.clone() });
				self.buffers = Some(DoubleBuffer::default());
				ReloadOutcome::Failed { reason }
			}
		};
		if let Some(reply) = reply {
			let _ = reply.send(outcome);
		}
	}
}

/// Resolves when the in-flight cycle finishes, clearing the slot. Pending
/// forever when nothing is in flight.
async fn wait_in_flight(slot: &mut Option<InFlight>) -> (Result<CycleOutput, JoinError>, Option<ReplySlot>) {
	let Some(in_flight) = slot.as_mut() else {
		return pending().await;
	};
	let output = (&mut in_flight.handle).await;
	let reply = slot.take().and_then(|done| done.reply);
	(output, reply)
}
