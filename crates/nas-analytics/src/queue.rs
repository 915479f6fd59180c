// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded FIFO of pending events.
//!
//! Insertion order is delivery order. Every entry carries a sequence number
//! that is unique within one queue and never persisted. A flush takes a
//! [`Batch`] from the head and later reconciles it by sequence number, so
//! events appended or evicted while the delivery was in flight never shift
//! the bookkeeping onto the wrong entries.

use std::collections::{HashSet, VecDeque};

use nas_analytics_core::Event;
use serde::ser::{Serialize, Serializer};

#[derive(Debug, Clone)]
struct QueuedEvent {
	seq: u64,
	event: Event,
}

/// Head-of-queue events taken for one delivery attempt.
#[derive(Debug, Clone)]
pub struct Batch {
	seqs: HashSet<u64>,
	events: Vec<Event>,
}

impl Batch {
	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

/// Events dropped while reconciling a failed batch.
#[derive(Debug, Default)]
pub struct RetryOutcome {
	/// Events still queued with an incremented retry count.
	pub retained: usize,
	/// Ids of events that exceeded the retry limit.
	pub dropped: Vec<String>,
}

/// Bounded, ordered event queue.
#[derive(Debug)]
pub struct EventQueue {
	entries: VecDeque<QueuedEvent>,
	max_size: usize,
	next_seq: u64,
}

impl EventQueue {
	pub fn new(max_size: usize) -> Self {
		Self {
			entries: VecDeque::new(),
			max_size: max_size.max(1),
			next_seq: 0,
		}
	}

	/// Builds a queue from recovered events, keeping the newest `max_size`.
	pub fn from_events(events: Vec<Event>, max_size: usize) -> Self {
		let mut queue = Self::new(max_size);
		let skip = events.len().saturating_sub(queue.max_size);
		for event in events.into_iter().skip(skip) {
			queue.push_entry(event);
		}
		queue
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Appends an event, evicting and returning the oldest one when full.
	pub fn push(&mut self, event: Event) -> Option<Event> {
		let evicted = if self.entries.len() >= self.max_size {
			self.entries.pop_front().map(|entry| entry.event)
		} else {
			None
		};
		self.push_entry(event);
		evicted
	}

	fn push_entry(&mut self, event: Event) {
		let seq = self.next_seq;
		self.next_seq += 1;
		self.entries.push_back(QueuedEvent { seq, event });
	}

	/// Copies up to `size` events from the head without removing them.
	pub fn take_batch(&self, size: usize) -> Batch {
		let capacity = size.min(self.entries.len());
		let mut seqs = HashSet::with_capacity(capacity);
		let mut events = Vec::with_capacity(capacity);
		for entry in self.entries.iter().take(size) {
			seqs.insert(entry.seq);
			events.push(entry.event.clone());
		}
		Batch { seqs, events }
	}

	/// Removes every still-queued event of a settled batch. Returns how many
	/// were removed.
	pub fn remove_batch(&mut self, batch: &Batch) -> usize {
		let before = self.entries.len();
		self.entries.retain(|entry| !batch.seqs.contains(&entry.seq));
		before - self.entries.len()
	}

	/// Records a failed attempt for every still-queued event of `batch`.
	///
	/// Events whose retry count rises above `retry_limit` are dropped. The
	/// rest keep their position, so the queue stays: retried survivors in
	/// insertion order, then everything that was not part of the batch.
	pub fn retry_batch(&mut self, batch: &Batch, retry_limit: u32) -> RetryOutcome {
		let mut outcome = RetryOutcome::default();
		self.entries.retain_mut(|entry| {
			if !batch.seqs.contains(&entry.seq) {
				return true;
			}
			if entry.event.record_failed_attempt() <= retry_limit {
				outcome.retained += 1;
				true
			} else {
				outcome.dropped.push(entry.event.event_id.clone());
				false
			}
		});
		outcome
	}

	/// Owned copy of the queued events in order.
	pub fn snapshot(&self) -> Vec<Event> {
		self.entries.iter().map(|entry| entry.event.clone()).collect()
	}

	/// Serializes the queue in its persisted form, a JSON array of events.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

impl Serialize for EventQueue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_seq(self.entries.iter().map(|entry| &entry.event))
	}
}
