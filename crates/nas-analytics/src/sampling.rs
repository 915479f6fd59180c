// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-event sampling.
//!
//! Each decision is an independent Bernoulli trial; the sampler keeps no
//! memory of earlier events. Event ids containing a key-event substring are
//! exempt and always kept.

/// Decides whether a tracked event enters the queue.
#[derive(Debug, Clone)]
pub struct Sampler {
	rate: f64,
	key_events: Vec<String>,
}

impl Sampler {
	pub fn new(rate: f64, key_events: Vec<String>) -> Self {
		Self {
			rate: rate.clamp(0.0, 1.0),
			key_events,
		}
	}

	/// Returns true if `event_id` matches a protected substring.
	pub fn is_key_event(&self, event_id: &str) -> bool {
		self
			.key_events
			.iter()
			.any(|key| !key.is_empty() && event_id.contains(key.as_str()))
	}

	/// Makes a sampling decision using the thread-local RNG.
	pub fn should_sample(&self, event_id: &str) -> bool {
		self.decide(event_id, fastrand::f64())
	}

	/// Makes a sampling decision for a given roll in `[0.0, 1.0)`.
	///
	/// A rate of 0 keeps nothing and a rate of 1 keeps everything.
	pub fn decide(&self, event_id: &str, roll: f64) -> bool {
		self.is_key_event(event_id) || roll < self.rate
	}
}
