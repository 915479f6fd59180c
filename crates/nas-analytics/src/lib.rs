// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for NAS product analytics.
//!
//! Tracked events are sampled, queued in memory, mirrored to durable storage
//! after every change, and delivered in batches to an ingestion endpoint.
//!
//! - A flush runs every `flush_interval`, whenever the queue reaches
//!   `batch_size`, and when the host reports it is being hidden.
//! - At most one delivery is in flight per client.
//! - A 4xx response drops the batch; any other failure increments each
//!   event's retry count, and events over `retry_limit` are dropped.
//! - A client built on the same storage recovers whatever an earlier one left
//!   queued.
//!
//! # Example
//!
//! ```ignore
//! use nas_analytics::{AnalyticsClient, EventType, Properties};
//!
//! let client = AnalyticsClient::builder()
//!     .endpoint("https://collect.example.com/v1/events")
//!     .app_id("nas-console")
//!     .build()?;
//!
//! client.track(
//!     "nas_version",
//!     EventType::System,
//!     Properties::new().insert("version", "7.2.0"),
//! );
//! client.flush().await;
//! ```

mod client;
pub mod config;
mod error;
mod properties;
pub mod queue;
pub mod sampling;
pub mod scheduler;
pub mod storage;
pub mod transport;

pub use client::{AnalyticsClient, AnalyticsClientBuilder, PAGE_VIEW_EVENT};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use properties::Properties;
pub use scheduler::Visibility;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{BatchSender, DeliveryOutcome, HttpSender};

pub use nas_analytics_core::{ClientType, DeviceId, Event, EventType, SessionId};
