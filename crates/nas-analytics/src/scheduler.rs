// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush scheduling.
//!
//! One background task per client watches three triggers:
//!
//! - a repeating timer every `flush_interval`
//! - size-threshold notifications from `track`
//! - visibility transitions to [`Visibility::Hidden`]
//!
//! The task never runs a flush itself. It hands each trigger to a callback
//! that spawns the flush as its own task, so cancelling the scheduler never
//! cancels a delivery already in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Host visibility, e.g. window shown/hidden or app foreground/background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
	#[default]
	Visible,
	Hidden,
}

/// What caused a flush to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
	Interval,
	BatchSize,
	Hidden,
	Manual,
}

impl FlushTrigger {
	pub fn as_str(&self) -> &'static str {
		match self {
			FlushTrigger::Interval => "interval",
			FlushTrigger::BatchSize => "batch_size",
			FlushTrigger::Hidden => "hidden",
			FlushTrigger::Manual => "manual",
		}
	}
}

/// Callback invoked for every trigger.
pub type FlushCallback = Arc<dyn Fn(FlushTrigger) + Send + Sync>;

/// Owns the background trigger task and its cancel handle.
pub struct Scheduler {
	runtime: Handle,
	notify: Arc<Notify>,
	visibility: watch::Receiver<Visibility>,
	on_flush: FlushCallback,
	interval: Duration,
	cancel: Option<CancellationToken>,
}

impl Scheduler {
	pub fn new(
		runtime: Handle,
		notify: Arc<Notify>,
		visibility: watch::Receiver<Visibility>,
		on_flush: FlushCallback,
	) -> Self {
		Self {
			runtime,
			notify,
			visibility,
			on_flush,
			interval: Duration::ZERO,
			cancel: None,
		}
	}

	/// Starts the trigger task, stopping any task started earlier.
	pub fn start(&mut self, interval: Duration) {
		self.stop();
		self.interval = interval;

		// Transitions that happened before this start were already handled.
		let mut visibility = self.visibility.clone();
		visibility.borrow_and_update();

		let cancel = CancellationToken::new();
		let task = TriggerTask {
			interval,
			notify: self.notify.clone(),
			visibility,
			on_flush: self.on_flush.clone(),
			cancel: cancel.clone(),
		};
		self.runtime.spawn(task.run());
		self.cancel = Some(cancel);
	}

	/// Stops the trigger task. Idempotent.
	pub fn stop(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel.cancel();
		}
	}

	pub fn is_running(&self) -> bool {
		self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}
}

impl Drop for Scheduler {
	fn drop(&mut self) {
		self.stop();
	}
}

struct TriggerTask {
	interval: Duration,
	notify: Arc<Notify>,
	visibility: watch::Receiver<Visibility>,
	on_flush: FlushCallback,
	cancel: CancellationToken,
}

impl TriggerTask {
	async fn run(mut self) {
		info!(
			flush_interval_ms = self.interval.as_millis() as u64,
			"Starting analytics flush scheduler"
		);

		let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut lifecycle_open = true;

		loop {
			tokio::select! {
				biased;

				_ = self.cancel.cancelled() => break,
				_ = ticker.tick() => (self.on_flush)(FlushTrigger::Interval),
				_ = self.notify.notified() => (self.on_flush)(FlushTrigger::BatchSize),
				changed = self.visibility.changed(), if lifecycle_open => {
					match changed {
						Ok(()) => {
							let visibility = *self.visibility.borrow_and_update();
							debug!(?visibility, "Visibility changed");
							if visibility == Visibility::Hidden {
								(self.on_flush)(FlushTrigger::Hidden);
							}
						}
						Err(_) => lifecycle_open = false,
					}
				}
			}
		}

		info!("Analytics flush scheduler stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	struct Harness {
		scheduler: Scheduler,
		notify: Arc<Notify>,
		visibility: watch::Sender<Visibility>,
		triggers: Arc<Mutex<Vec<FlushTrigger>>>,
	}

	impl Harness {
		fn new() -> Self {
			let notify = Arc::new(Notify::new());
			let (visibility, rx) = watch::channel(Visibility::Visible);
			let triggers = Arc::new(Mutex::new(Vec::new()));
			let sink = triggers.clone();
			let on_flush: FlushCallback =
				Arc::new(move |trigger| sink.lock().unwrap().push(trigger));
			let scheduler = Scheduler::new(Handle::current(), notify.clone(), rx, on_flush);
			Self {
				scheduler,
				notify,
				visibility,
				triggers,
			}
		}

		fn count(&self, trigger: FlushTrigger) -> usize {
			self
				.triggers
				.lock()
				.unwrap()
				.iter()
				.filter(|t| **t == trigger)
				.count()
		}
	}

	async fn settle() {
		tokio::time::sleep(Duration::from_millis(50)).await;
	}

	#[tokio::test]
	async fn test_interval_fires_repeatedly() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_millis(20));

		tokio::time::sleep(Duration::from_millis(150)).await;

		assert!(h.count(FlushTrigger::Interval) >= 2);
	}

	#[tokio::test]
	async fn test_first_tick_waits_one_interval() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_secs(60));

		settle().await;

		assert_eq!(h.count(FlushTrigger::Interval), 0);
	}

	#[tokio::test]
	async fn test_notify_triggers_batch_flush() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_secs(60));

		h.notify.notify_one();
		settle().await;

		assert_eq!(h.count(FlushTrigger::BatchSize), 1);
	}

	#[tokio::test]
	async fn test_hidden_triggers_flush_visible_does_not() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_secs(60));
		settle().await;

		h.visibility.send_replace(Visibility::Hidden);
		settle().await;
		h.visibility.send_replace(Visibility::Visible);
		settle().await;

		assert_eq!(h.count(FlushTrigger::Hidden), 1);
		assert_eq!(h.triggers.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_stop_halts_triggers() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_millis(10));
		settle().await;

		h.scheduler.stop();
		assert!(!h.scheduler.is_running());
		settle().await;
		let after_stop = h.triggers.lock().unwrap().len();
		tokio::time::sleep(Duration::from_millis(60)).await;

		assert_eq!(h.triggers.lock().unwrap().len(), after_stop);
	}

	#[tokio::test]
	async fn test_restart_replaces_previous_timer() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_millis(10));
		h.scheduler.start(Duration::from_secs(60));
		assert_eq!(h.scheduler.interval(), Duration::from_secs(60));
		assert!(h.scheduler.is_running());

		tokio::time::sleep(Duration::from_millis(80)).await;

		assert_eq!(h.count(FlushTrigger::Interval), 0);
	}

	#[tokio::test]
	async fn test_restart_does_not_replay_earlier_hidden() {
		let mut h = Harness::new();
		h.scheduler.start(Duration::from_secs(60));
		settle().await;
		h.visibility.send_replace(Visibility::Hidden);
		settle().await;

		h.scheduler.start(Duration::from_secs(30));
		settle().await;

		assert_eq!(h.count(FlushTrigger::Hidden), 1);
	}

	#[tokio::test]
	async fn test_closed_lifecycle_channel_is_ignored() {
		let Harness {
			mut scheduler,
			notify,
			visibility,
			triggers,
		} = Harness::new();
		scheduler.start(Duration::from_secs(60));
		drop(visibility);
		settle().await;

		notify.notify_one();
		settle().await;

		assert_eq!(*triggers.lock().unwrap(), vec![FlushTrigger::BatchSize]);
	}
}
