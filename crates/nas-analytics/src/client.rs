// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client: event collection, queueing and delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use nas_analytics_core::{DeviceId, Event, EventContext, EventType, SessionId};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::properties::Properties;
use crate::queue::EventQueue;
use crate::sampling::Sampler;
use crate::scheduler::{FlushCallback, FlushTrigger, Scheduler, Visibility};
use crate::storage::{default_store, KeyValueStore, Persistence};
use crate::transport::{BatchSender, DeliveryOutcome, HttpSender};

/// Event id emitted on startup when auto-tracking is enabled.
pub const PAGE_VIEW_EVENT: &str = "page_view";

/// Builder for constructing an [`AnalyticsClient`].
pub struct AnalyticsClientBuilder {
	config: AnalyticsConfig,
	sender: Option<Arc<dyn BatchSender>>,
	store: Option<Arc<dyn KeyValueStore>>,
}

impl AnalyticsClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			config: AnalyticsConfig::default(),
			sender: None,
			store: None,
		}
	}

	/// Replaces the whole configuration, e.g. one loaded from TOML.
	pub fn config(mut self, config: AnalyticsConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the delivery URL. Required.
	pub fn endpoint(mut self, url: impl Into<String>) -> Self {
		self.config.endpoint = url.into();
		self
	}

	pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
		self.config.app_id = app_id.into();
		self
	}

	/// Logs every tracked event at debug level.
	pub fn debug(mut self, enabled: bool) -> Self {
		self.config.debug = enabled;
		self
	}

	/// Sets the probability (0.0-1.0) that a non-key event is kept.
	pub fn sample_rate(mut self, rate: f64) -> Self {
		self.config.sample_rate = rate;
		self
	}

	pub fn auto_track(mut self, enabled: bool) -> Self {
		self.config.auto_track = enabled;
		self
	}

	pub fn batch_size(mut self, size: usize) -> Self {
		self.config.batch_size = size;
		self
	}

	pub fn flush_interval(mut self, interval: Duration) -> Self {
		self.config.flush_interval = interval;
		self
	}

	pub fn max_queue_size(mut self, size: usize) -> Self {
		self.config.max_queue_size = size;
		self
	}

	pub fn retry_limit(mut self, limit: u32) -> Self {
		self.config.retry_limit = limit;
		self
	}

	pub fn client_type(mut self, client_type: nas_analytics_core::ClientType) -> Self {
		self.config.client_type = client_type;
		self
	}

	/// Sets the storage key prefix. Give each concurrently running client on
	/// one store its own namespace.
	pub fn storage_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.config.storage_namespace = namespace.into();
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Replaces the event-id substrings that bypass sampling.
	pub fn key_events<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.key_events = keys.into_iter().map(Into::into).collect();
		self
	}

	/// Uses a custom delivery transport instead of HTTP.
	pub fn sender(mut self, sender: Arc<dyn BatchSender>) -> Self {
		self.sender = Some(sender);
		self
	}

	/// Uses a custom key-value store instead of the data-directory file store.
	pub fn storage(mut self, store: Arc<dyn KeyValueStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Builds the client, recovers any persisted queue and starts the flush
	/// scheduler. Must be called inside a Tokio runtime.
	pub fn build(self) -> Result<AnalyticsClient> {
		let config = self.config.validated()?;
		let runtime = Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?;

		let sender = match self.sender {
			Some(sender) => sender,
			None => Arc::new(HttpSender::new(
				&config.endpoint,
				&config.app_id,
				config.request_timeout,
			)?),
		};
		let store = self.store.unwrap_or_else(default_store);

		let inner = Arc::new(ClientInner::new(config, sender, store));

		let weak = Arc::downgrade(&inner);
		let on_flush: FlushCallback = Arc::new(move |trigger| {
			if let Some(inner) = weak.upgrade() {
				tokio::spawn(async move {
					inner.flush(trigger).await;
				});
			}
		});
		let (lifecycle, visibility) = watch::channel(Visibility::Visible);
		let mut scheduler =
			Scheduler::new(runtime, inner.flush_notify.clone(), visibility, on_flush);
		scheduler.start(inner.config.flush_interval);

		info!(
			endpoint = %inner.config.endpoint,
			batch_size = inner.config.batch_size,
			flush_interval_ms = inner.config.flush_interval.as_millis() as u64,
			retry_limit = inner.config.retry_limit,
			recovered = inner.queue_size(),
			"Analytics client initialized"
		);

		let client = AnalyticsClient {
			inner,
			scheduler: Mutex::new(scheduler),
			lifecycle,
			destroyed: AtomicBool::new(false),
		};

		if client.inner.config.auto_track {
			client.inner.track_page_view();
		}

		Ok(client)
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Releases the in-flight flag when dropped, including on panic or when the
/// flush future is cancelled.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// State shared between the client handle, the scheduler and spawned flushes.
pub(crate) struct ClientInner {
	config: AnalyticsConfig,
	sender: Arc<dyn BatchSender>,
	persistence: Persistence,
	sampler: Sampler,
	queue: Mutex<EventQueue>,
	// At most one delivery in flight. The queue lock is never held across
	// the delivery await; reconciliation relies on batch sequence numbers.
	flushing: AtomicBool,
	flush_notify: Arc<Notify>,
	session_id: SessionId,
	device_id: DeviceId,
	user_id: RwLock<Option<String>>,
}

impl ClientInner {
	fn new(
		config: AnalyticsConfig,
		sender: Arc<dyn BatchSender>,
		store: Arc<dyn KeyValueStore>,
	) -> Self {
		let persistence = Persistence::new(store, config.queue_key(), config.device_id_key());
		let queue = EventQueue::from_events(persistence.load_queue(), config.max_queue_size);
		let device_id = persistence.device_id();
		let sampler = Sampler::new(config.sample_rate, config.key_events.clone());

		Self {
			sender,
			persistence,
			sampler,
			queue: Mutex::new(queue),
			flushing: AtomicBool::new(false),
			flush_notify: Arc::new(Notify::new()),
			session_id: SessionId::generate(),
			device_id,
			user_id: RwLock::new(None),
			config,
		}
	}

	fn lock_queue(&self) -> MutexGuard<'_, EventQueue> {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn context(&self) -> EventContext {
		EventContext {
			session_id: self.session_id.to_string(),
			device_id: self.device_id.to_string(),
			user_id: self.current_user_id(),
			client_type: self.config.client_type,
		}
	}

	fn current_user_id(&self) -> Option<String> {
		self
			.user_id
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn identify(&self, user_id: String) {
		*self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id);
	}

	fn persist(&self, queue: &EventQueue) {
		match queue.to_json() {
			Ok(snapshot) => self.persistence.save_queue(&snapshot),
			Err(e) => warn!(error = %e, "Failed to serialize queue"),
		}
	}

	fn track(&self, event_id: String, event_type: EventType, extra: Properties) {
		if !self.sampler.should_sample(&event_id) {
			if self.config.debug {
				debug!(event_id = %event_id, "Event sampled out");
			}
			return;
		}

		let event = Event::new(event_id, event_type, &self.context(), extra.into_map());
		if self.config.debug {
			debug!(
				event_id = %event.event_id,
				event_type = %event.event_type,
				timestamp = event.timestamp,
				user_id = ?event.user_id,
				"Tracked event"
			);
		}

		let len = {
			let mut queue = self.lock_queue();
			if let Some(evicted) = queue.push(event) {
				debug!(event_id = %evicted.event_id, "Queue full, evicted oldest event");
			}
			self.persist(&queue);
			queue.len()
		};

		if len >= self.config.batch_size {
			self.flush_notify.notify_one();
		}
	}

	fn track_page_view(&self) {
		let extra = Properties::new()
			.insert("app_id", self.config.app_id.clone())
			.insert("sdk_version", nas_common_http::SDK_VERSION)
			.insert("platform", nas_common_http::platform());
		self.track(PAGE_VIEW_EVENT.to_string(), EventType::Generic, extra);
	}

	fn queue_size(&self) -> usize {
		self.lock_queue().len()
	}

	fn queue_snapshot(&self) -> Vec<Event> {
		self.lock_queue().snapshot()
	}

	/// Attempts delivery of the head batch. Returns `None` when the attempt
	/// was skipped because the queue was empty or a flush was in progress.
	async fn flush(&self, trigger: FlushTrigger) -> Option<DeliveryOutcome> {
		if self.lock_queue().is_empty() {
			return None;
		}
		let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
			debug!(trigger = trigger.as_str(), "Flush already in progress, skipping");
			return None;
		};

		let batch = self.lock_queue().take_batch(self.config.batch_size);
		if batch.is_empty() {
			return None;
		}

		debug!(
			count = batch.len(),
			trigger = trigger.as_str(),
			"Flushing event batch"
		);

		let result = self.sender.send_batch(batch.events()).await;
		let outcome = DeliveryOutcome::classify(&result);

		let mut queue = self.lock_queue();
		match outcome {
			DeliveryOutcome::Delivered => {
				queue.remove_batch(&batch);
				self.persist(&queue);
				debug!(remaining = queue.len(), "Flush succeeded");
			}
			DeliveryOutcome::Rejected => {
				let dropped = queue.remove_batch(&batch);
				self.persist(&queue);
				if let Err(e) = &result {
					error!(
						status = ?e.status(),
						error = %e,
						dropped,
						"Ingestion endpoint rejected batch, dropping it"
					);
				}
			}
			DeliveryOutcome::Failed => {
				let retry = queue.retry_batch(&batch, self.config.retry_limit);
				self.persist(&queue);
				if let Err(e) = &result {
					warn!(
						error = %e,
						retained = retry.retained,
						"Flush failed, events kept for retry"
					);
				}
				if !retry.dropped.is_empty() {
					warn!(
						count = retry.dropped.len(),
						event_ids = ?retry.dropped,
						retry_limit = self.config.retry_limit,
						"Dropped events after exhausting retries"
					);
				}
			}
		}

		Some(outcome)
	}
}

/// Client for collecting analytics events and delivering them in batches.
///
/// # Example
///
/// ```ignore
/// use nas_analytics::{AnalyticsClient, EventType, Properties, Visibility};
///
/// let client = AnalyticsClient::builder()
///     .endpoint("https://collect.example.com/v1/events")
///     .app_id("nas-console")
///     .sample_rate(0.5)
///     .build()?;
///
/// client.identify("user_123");
/// client.track(
///     "upgrade_status",
///     EventType::System,
///     Properties::new().insert("status", "completed"),
/// );
///
/// // App is being backgrounded: deliver what we can.
/// client.set_visibility(Visibility::Hidden);
///
/// client.destroy();
/// ```
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
	scheduler: Mutex<Scheduler>,
	lifecycle: watch::Sender<Visibility>,
	destroyed: AtomicBool,
}

impl AnalyticsClient {
	/// Creates a new builder for constructing an AnalyticsClient.
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Records an event.
	///
	/// Never blocks on the network and never fails. The event may be sampled
	/// out, and when the queue is full the oldest queued event is evicted.
	/// Reaching the batch size schedules a background flush.
	pub fn track(
		&self,
		event_id: impl Into<String>,
		event_type: EventType,
		extra: impl Into<Properties>,
	) {
		self.inner.track(event_id.into(), event_type, extra.into());
	}

	/// Sets the user id for events tracked from now on. Already-queued events
	/// are not modified.
	pub fn identify(&self, user_id: impl Into<String>) {
		self.inner.identify(user_id.into());
	}

	/// Attempts delivery of one batch from the head of the queue.
	///
	/// Resolves once the attempt has settled, whatever the outcome; inspect
	/// [`queue_size`](Self::queue_size) to see what is still pending.
	pub async fn flush(&self) {
		self.inner.flush(FlushTrigger::Manual).await;
	}

	pub fn queue_size(&self) -> usize {
		self.inner.queue_size()
	}

	/// Owned copy of the pending events, oldest first.
	pub fn queue(&self) -> Vec<Event> {
		self.inner.queue_snapshot()
	}

	/// Reports a host visibility change. Becoming hidden triggers an
	/// immediate flush in addition to the timer.
	pub fn set_visibility(&self, visibility: Visibility) {
		self.lifecycle.send_replace(visibility);
	}

	/// Restarts the flush timer with a new period.
	pub fn set_flush_interval(&self, interval: Duration) -> Result<()> {
		if self.is_destroyed() {
			return Err(AnalyticsError::ClientDestroyed);
		}
		if interval.is_zero() {
			return Err(AnalyticsError::InvalidConfig(
				"flush_interval must be greater than zero".to_string(),
			));
		}
		self.lock_scheduler().start(interval);
		Ok(())
	}

	pub fn session_id(&self) -> &SessionId {
		&self.inner.session_id
	}

	pub fn device_id(&self) -> &DeviceId {
		&self.inner.device_id
	}

	pub fn user_id(&self) -> Option<String> {
		self.inner.current_user_id()
	}

	pub fn config(&self) -> &AnalyticsConfig {
		&self.inner.config
	}

	/// Stops the flush timer and lifecycle listener.
	///
	/// Pending events stay in storage for the next client to recover. A
	/// delivery already in flight is not cancelled and still updates the
	/// persisted queue when it settles.
	pub fn destroy(&self) {
		if self.destroyed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.lock_scheduler().stop();
		info!(pending = self.queue_size(), "Analytics client destroyed");
	}

	pub fn is_destroyed(&self) -> bool {
		self.destroyed.load(Ordering::SeqCst)
	}

	fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler> {
		self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Drop for AnalyticsClient {
	fn drop(&mut self) {
		self.destroy();
	}
}
