// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The analytics event record and its tag types.
//!
//! An [`Event`] has one shape everywhere: the in-memory queue, the persisted
//! queue snapshot and the delivery body all use the same JSON encoding, so a
//! queue written by one SDK instance can be read back verbatim by the next.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Category of a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
	#[default]
	Generic,
	Business,
	System,
	Error,
}

impl EventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventType::Generic => "generic",
			EventType::Business => "business",
			EventType::System => "system",
			EventType::Error => "error",
		}
	}
}

impl std::fmt::Display for EventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for EventType {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"generic" => Ok(EventType::Generic),
			"business" => Ok(EventType::Business),
			"system" => Ok(EventType::System),
			"error" => Ok(EventType::Error),
			other => Err(CoreError::UnknownEventType(other.to_string())),
		}
	}
}

/// Surface an event originated from. Fixed for the lifetime of an SDK instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
	Web,
	#[default]
	Desktop,
	Mobile,
	Server,
}

impl ClientType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ClientType::Web => "web",
			ClientType::Desktop => "desktop",
			ClientType::Mobile => "mobile",
			ClientType::Server => "server",
		}
	}
}

impl std::fmt::Display for ClientType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for ClientType {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"web" => Ok(ClientType::Web),
			"desktop" => Ok(ClientType::Desktop),
			"mobile" => Ok(ClientType::Mobile),
			"server" => Ok(ClientType::Server),
			other => Err(CoreError::UnknownClientType(other.to_string())),
		}
	}
}

/// Identity fields stamped onto every event at track time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
	pub session_id: String,
	pub device_id: String,
	pub user_id: Option<String>,
	pub client_type: ClientType,
}

/// One recorded occurrence of user or system behavior.
///
/// Everything except the retry counter is fixed at creation. The retry
/// counter is owned by delivery bookkeeping and is only ever incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// Free-form identifier; not unique across events.
	pub event_id: String,
	#[serde(default)]
	pub event_type: EventType,
	/// Milliseconds since the Unix epoch.
	pub timestamp: i64,
	pub session_id: String,
	pub device_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(default)]
	pub client_type: ClientType,
	#[serde(default, deserialize_with = "null_as_empty_map")]
	pub extra: Map<String, Value>,
	#[serde(default, alias = "_retryCount")]
	retry_count: u32,
}

impl Event {
	/// Creates a fresh event timestamped now with a zero retry count.
	pub fn new(
		event_id: impl Into<String>,
		event_type: EventType,
		context: &EventContext,
		extra: Map<String, Value>,
	) -> Self {
		Self {
			event_id: event_id.into(),
			event_type,
			timestamp: Utc::now().timestamp_millis(),
			session_id: context.session_id.clone(),
			device_id: context.device_id.clone(),
			user_id: context.user_id.clone(),
			client_type: context.client_type,
			extra,
			retry_count: 0,
		}
	}

	/// Number of failed delivery attempts recorded for this event.
	pub fn retry_count(&self) -> u32 {
		self.retry_count
	}

	/// Records one more failed delivery attempt and returns the new count.
	pub fn record_failed_attempt(&mut self) -> u32 {
		self.retry_count = self.retry_count.saturating_add(1);
		self.retry_count
	}
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request body for the ingestion endpoint: `{ "batch": [Event, ...] }`.
#[derive(Debug, Serialize)]
pub struct BatchPayload<'a> {
	pub batch: &'a [Event],
}

impl<'a> BatchPayload<'a> {
	pub fn new(batch: &'a [Event]) -> Self {
		Self { batch }
	}
}
