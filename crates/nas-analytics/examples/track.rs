// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: track a few events and deliver them with the nas-analytics SDK.
//!
//! Run with:
//!   NAS_ANALYTICS_ENDPOINT=http://localhost:8080/v1/events \
//!     cargo run --example track -p nas-analytics

use std::time::Duration;

use nas_analytics::{AnalyticsClient, EventType, FileStore, Properties, Visibility};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("nas_analytics=debug")),
		)
		.init();

	let endpoint = std::env::var("NAS_ANALYTICS_ENDPOINT")
		.unwrap_or_else(|_| "http://localhost:8080/v1/events".to_string());
	let store_dir = std::env::temp_dir().join("nas-analytics-example");

	println!("Initializing analytics client...");
	println!("  Endpoint: {}", endpoint);
	println!("  Store: {}", store_dir.display());

	let client = AnalyticsClient::builder()
		.endpoint(&endpoint)
		.app_id("nas-analytics-example")
		.debug(true)
		.batch_size(3)
		.flush_interval(Duration::from_secs(2))
		.storage(std::sync::Arc::new(FileStore::new(&store_dir)))
		.build()?;

	println!("  Device ID: {}", client.device_id());
	println!("  Session ID: {}", client.session_id());
	println!("  Recovered events: {}", client.queue_size());

	client.identify("user_example_123");

	client.track(
		"nas_version",
		EventType::System,
		Properties::new().insert("version", "7.2.0"),
	);
	client.track(
		"upgrade_status",
		EventType::Business,
		Properties::new()
			.insert("from_version", "7.1.2")
			.insert("status", "completed"),
	);
	client.track(
		"settings_opened",
		EventType::Generic,
		Properties::new().insert("tab", "network"),
	);

	tokio::time::sleep(Duration::from_secs(3)).await;

	// Simulate the host going to the background.
	client.set_visibility(Visibility::Hidden);
	tokio::time::sleep(Duration::from_millis(500)).await;

	println!("\nPending after delivery attempts: {}", client.queue_size());
	client.destroy();
	println!("Client destroyed; pending events stay in {}", store_dir.display());

	Ok(())
}
