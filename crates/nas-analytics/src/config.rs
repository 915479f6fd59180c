// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Configuration is fixed once a client is built. It can be assembled through
//! [`crate::AnalyticsClientBuilder`] or loaded from TOML:
//!
//! ```toml
//! endpoint = "https://collect.example.com/v1/events"
//! app_id = "nas-console"
//! sample_rate = 0.25
//! batch_size = 10
//! flush_interval_ms = 5000
//! ```

use std::time::Duration;

use nas_analytics_core::ClientType;
use reqwest::Url;
use serde::{Deserialize, Deserializer};

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 200;
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORAGE_NAMESPACE: &str = "nas_analytics";

/// Event-id substrings that are never sampled out.
pub const DEFAULT_KEY_EVENTS: &[&str] = &["nas_version", "upgrade_status", "error"];

/// Configuration for an analytics client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
	/// Delivery URL for event batches.
	pub endpoint: String,
	/// Application identifier sent with every delivery.
	pub app_id: String,
	/// Logs every tracked event when set.
	pub debug: bool,
	/// Probability in `[0.0, 1.0]` that a non-key event is kept.
	pub sample_rate: f64,
	/// Emits a `page_view` event when the client starts.
	pub auto_track: bool,
	/// Events per delivery attempt, and the queue size that triggers a flush.
	pub batch_size: usize,
	#[serde(rename = "flush_interval_ms", deserialize_with = "duration_from_millis")]
	pub flush_interval: Duration,
	/// Queue ceiling; the oldest event is evicted beyond it.
	pub max_queue_size: usize,
	/// Failed attempts an event survives before it is dropped.
	pub retry_limit: u32,
	pub client_type: ClientType,
	/// Prefix for storage keys, so several clients can share one store.
	pub storage_namespace: String,
	#[serde(rename = "request_timeout_ms", deserialize_with = "duration_from_millis")]
	pub request_timeout: Duration,
	pub key_events: Vec<String>,
}

impl Default for AnalyticsConfig {
	fn default() -> Self {
		Self {
			endpoint: String::new(),
			app_id: String::new(),
			debug: false,
			sample_rate: 1.0,
			auto_track: true,
			batch_size: DEFAULT_BATCH_SIZE,
			flush_interval: DEFAULT_FLUSH_INTERVAL,
			max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
			retry_limit: DEFAULT_RETRY_LIMIT,
			client_type: ClientType::default(),
			storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			key_events: DEFAULT_KEY_EVENTS.iter().map(|s| s.to_string()).collect(),
		}
	}
}

impl AnalyticsConfig {
	/// Creates a default configuration pointing at `endpoint`.
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			..Self::default()
		}
	}

	/// Parses a TOML document, filling unspecified fields with defaults.
	pub fn from_toml_str(s: &str) -> Result<Self> {
		let config: Self = toml::from_str(s)?;
		Ok(config)
	}

	/// Checks every field and returns the normalized configuration.
	///
	/// `sample_rate` is clamped into `[0.0, 1.0]`; all other out-of-range
	/// values are rejected.
	pub fn validated(mut self) -> Result<Self> {
		let url = Url::parse(&self.endpoint)
			.map_err(|e| AnalyticsError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(AnalyticsError::InvalidEndpoint(format!(
				"unsupported scheme '{}'",
				url.scheme()
			)));
		}

		if self.sample_rate.is_nan() {
			return Err(AnalyticsError::InvalidConfig(
				"sample_rate must be a number".to_string(),
			));
		}
		self.sample_rate = self.sample_rate.clamp(0.0, 1.0);

		if self.batch_size == 0 {
			return Err(AnalyticsError::InvalidConfig(
				"batch_size must be at least 1".to_string(),
			));
		}
		if self.max_queue_size == 0 {
			return Err(AnalyticsError::InvalidConfig(
				"max_queue_size must be at least 1".to_string(),
			));
		}
		if self.flush_interval.is_zero() {
			return Err(AnalyticsError::InvalidConfig(
				"flush_interval must be greater than zero".to_string(),
			));
		}
		if self.request_timeout.is_zero() {
			return Err(AnalyticsError::InvalidConfig(
				"request_timeout must be greater than zero".to_string(),
			));
		}
		if self.storage_namespace.trim().is_empty() {
			return Err(AnalyticsError::InvalidConfig(
				"storage_namespace must not be empty".to_string(),
			));
		}

		Ok(self)
	}

	pub(crate) fn queue_key(&self) -> String {
		format!("{}_queue", self.storage_namespace)
	}

	pub(crate) fn device_id_key(&self) -> String {
		format!("{}_device_id", self.storage_namespace)
	}
}

fn duration_from_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Duration::from_millis(u64::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_sdk_contract() {
		let config = AnalyticsConfig::default();
		assert_eq!(config.batch_size, 5);
		assert_eq!(config.flush_interval, Duration::from_millis(5000));
		assert_eq!(config.max_queue_size, 200);
		assert_eq!(config.retry_limit, 3);
		assert_eq!(config.sample_rate, 1.0);
		assert!(config.auto_track);
		assert!(!config.debug);
	}

	#[test]
	fn test_validated_requires_endpoint() {
		let result = AnalyticsConfig::default().validated();
		assert!(matches!(result, Err(AnalyticsError::InvalidEndpoint(_))));
	}

	#[test]
	fn test_validated_rejects_non_http_scheme() {
		let result = AnalyticsConfig::new("ftp://example.com/events").validated();
		assert!(matches!(result, Err(AnalyticsError::InvalidEndpoint(_))));
	}

	#[test]
	fn test_validated_clamps_sample_rate() {
		let mut config = AnalyticsConfig::new("https://example.com/events");
		config.sample_rate = 7.5;
		assert_eq!(config.validated().unwrap().sample_rate, 1.0);

		let mut config = AnalyticsConfig::new("https://example.com/events");
		config.sample_rate = -1.0;
		assert_eq!(config.validated().unwrap().sample_rate, 0.0);
	}

	#[test]
	fn test_validated_rejects_zero_batch_size() {
		let mut config = AnalyticsConfig::new("https://example.com/events");
		config.batch_size = 0;
		assert!(matches!(
			config.validated(),
			Err(AnalyticsError::InvalidConfig(_))
		));
	}

	#[test]
	fn test_validated_rejects_zero_interval() {
		let mut config = AnalyticsConfig::new("https://example.com/events");
		config.flush_interval = Duration::ZERO;
		assert!(matches!(
			config.validated(),
			Err(AnalyticsError::InvalidConfig(_))
		));
	}

	#[test]
	fn test_validated_rejects_zero_request_timeout() {
		let mut config = AnalyticsConfig::new("https://example.com/events");
		config.request_timeout = Duration::ZERO;
		assert!(matches!(
			config.validated(),
			Err(AnalyticsError::InvalidConfig(_))
		));

		let result = AnalyticsConfig::from_toml_str(
			"endpoint = \"https://example.com/events\"\nrequest_timeout_ms = 0",
		)
		.and_then(AnalyticsConfig::validated);
		assert!(matches!(result, Err(AnalyticsError::InvalidConfig(_))));
	}

	#[test]
	fn test_from_toml_merges_defaults() {
		let config = AnalyticsConfig::from_toml_str(
			r#"
endpoint = "https://collect.example.com/v1/events"
app_id = "nas-console"
sample_rate = 0.25
flush_interval_ms = 1500
client_type = "web"
key_events = ["checkout"]
"#,
		)
		.unwrap();

		assert_eq!(config.endpoint, "https://collect.example.com/v1/events");
		assert_eq!(config.app_id, "nas-console");
		assert_eq!(config.sample_rate, 0.25);
		assert_eq!(config.flush_interval, Duration::from_millis(1500));
		assert_eq!(config.client_type, ClientType::Web);
		assert_eq!(config.key_events, vec!["checkout".to_string()]);
		assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
		assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
	}

	#[test]
	fn test_from_toml_rejects_bad_types() {
		let result = AnalyticsConfig::from_toml_str("batch_size = \"lots\"");
		assert!(matches!(result, Err(AnalyticsError::ConfigParse(_))));
	}

	#[test]
	fn test_storage_keys_are_namespaced() {
		let mut config = AnalyticsConfig::new("https://example.com");
		config.storage_namespace = "tenant_a".to_string();
		assert_eq!(config.queue_key(), "tenant_a_queue");
		assert_eq!(config.device_id_key(), "tenant_a_device_id");
	}
}
