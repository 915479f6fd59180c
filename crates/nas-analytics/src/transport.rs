// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch delivery to the ingestion endpoint.

use std::time::Duration;

use nas_analytics_core::{BatchPayload, Event};
use reqwest::Client;
use tracing::debug;

use crate::error::{AnalyticsError, Result};

/// Header carrying the configured application id.
pub const APP_ID_HEADER: &str = "X-App-Id";

/// Handler for sending batched events to the server.
#[async_trait::async_trait]
pub trait BatchSender: Send + Sync {
	/// Sends one batch. `Ok` means the server acknowledged it.
	async fn send_batch(&self, batch: &[Event]) -> Result<()>;
}

/// How a delivery attempt settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
	/// Acknowledged with a 2xx response.
	Delivered,
	/// Refused as unacceptable (4xx). Retrying cannot help.
	Rejected,
	/// Anything else: 5xx, network failure, timeout.
	Failed,
}

impl DeliveryOutcome {
	pub fn classify(result: &Result<()>) -> Self {
		match result {
			Ok(()) => DeliveryOutcome::Delivered,
			Err(e) if e.is_permanent() => DeliveryOutcome::Rejected,
			Err(_) => DeliveryOutcome::Failed,
		}
	}
}

/// Sends batches as `POST {endpoint}` with a JSON `{"batch": [...]}` body.
pub struct HttpSender {
	http_client: Client,
	endpoint: String,
	app_id: String,
}

impl HttpSender {
	pub fn new(
		endpoint: impl Into<String>,
		app_id: impl Into<String>,
		timeout: Duration,
	) -> Result<Self> {
		let http_client = nas_common_http::builder()
			.timeout(timeout)
			.build()
			.map_err(AnalyticsError::RequestFailed)?;

		Ok(Self {
			http_client,
			endpoint: endpoint.into(),
			app_id: app_id.into(),
		})
	}
}

#[async_trait::async_trait]
impl BatchSender for HttpSender {
	async fn send_batch(&self, batch: &[Event]) -> Result<()> {
		debug!(url = %self.endpoint, count = batch.len(), "Sending event batch");

		let mut request = self
			.http_client
			.post(&self.endpoint)
			.json(&BatchPayload::new(batch));
		if !self.app_id.is_empty() {
			request = request.header(APP_ID_HEADER, &self.app_id);
		}

		let response = request.send().await?;
		let status = response.status();
		if status.is_success() {
			return Ok(());
		}

		let message = response.text().await.unwrap_or_default();
		let status = status.as_u16();
		if (400..500).contains(&status) {
			Err(AnalyticsError::ClientError { status, message })
		} else {
			Err(AnalyticsError::ServerError { status, message })
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nas_analytics_core::{ClientType, EventContext, EventType};
	use serde_json::{json, Map};
	use wiremock::matchers::{body_partial_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn events(n: usize) -> Vec<Event> {
		let ctx = EventContext {
			session_id: "sess_w".to_string(),
			device_id: "dev_w".to_string(),
			user_id: Some("user_w".to_string()),
			client_type: ClientType::Web,
		};
		(0..n)
			.map(|i| Event::new(format!("event_{i}"), EventType::Business, &ctx, Map::new()))
			.collect()
	}

	async fn sender_for(server: &MockServer) -> HttpSender {
		HttpSender::new(
			format!("{}/v1/events", server.uri()),
			"nas-console",
			Duration::from_secs(5),
		)
		.unwrap()
	}

	#[test]
	fn test_classify_outcomes() {
		assert_eq!(DeliveryOutcome::classify(&Ok(())), DeliveryOutcome::Delivered);
		assert_eq!(
			DeliveryOutcome::classify(&Err(AnalyticsError::ClientError {
				status: 400,
				message: String::new(),
			})),
			DeliveryOutcome::Rejected
		);
		assert_eq!(
			DeliveryOutcome::classify(&Err(AnalyticsError::ServerError {
				status: 503,
				message: String::new(),
			})),
			DeliveryOutcome::Failed
		);
	}

	#[tokio::test]
	async fn test_posts_batch_as_json() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/events"))
			.and(header("content-type", "application/json"))
			.and(header(APP_ID_HEADER, "nas-console"))
			.and(body_partial_json(json!({
				"batch": [
					{
						"event_id": "event_0",
						"event_type": "business",
						"retry_count": 0,
						"user_id": "user_w"
					},
					{ "event_id": "event_1", "client_type": "web" }
				]
			})))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let result = sender_for(&server).await.send_batch(&events(2)).await;

		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn test_sends_user_agent() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(header("user-agent", nas_common_http::user_agent().as_str()))
			.respond_with(ResponseTemplate::new(204))
			.expect(1)
			.mount(&server)
			.await;

		assert!(sender_for(&server).await.send_batch(&events(1)).await.is_ok());
	}

	#[tokio::test]
	async fn test_4xx_is_client_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("bad batch"))
			.mount(&server)
			.await;

		let result = sender_for(&server).await.send_batch(&events(1)).await;

		match result {
			Err(AnalyticsError::ClientError { status, message }) => {
				assert_eq!(status, 400);
				assert_eq!(message, "bad batch");
			}
			other => panic!("expected client error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_5xx_is_server_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let result = sender_for(&server).await.send_batch(&events(1)).await;

		assert!(matches!(
			result,
			Err(AnalyticsError::ServerError { status: 503, .. })
		));
		assert_eq!(DeliveryOutcome::classify(&result), DeliveryOutcome::Failed);
	}

	#[tokio::test]
	async fn test_connection_failure_is_transient() {
		let sender =
			HttpSender::new("http://127.0.0.1:9/v1/events", "", Duration::from_secs(2)).unwrap();

		let result = sender.send_batch(&events(1)).await;

		assert!(matches!(result, Err(AnalyticsError::RequestFailed(_))));
		assert_eq!(DeliveryOutcome::classify(&result), DeliveryOutcome::Failed);
	}

	#[tokio::test]
	async fn test_slow_response_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
			.mount(&server)
			.await;
		let sender = HttpSender::new(server.uri(), "", Duration::from_millis(100)).unwrap();

		let result = sender.send_batch(&events(1)).await;

		assert_eq!(DeliveryOutcome::classify(&result), DeliveryOutcome::Failed);
	}
}
