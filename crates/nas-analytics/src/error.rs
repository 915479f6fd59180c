// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use thiserror::Error;

/// Analytics SDK errors.
///
/// Only construction and configuration errors reach callers. Delivery and
/// storage errors are produced internally and resolved by the flush and
/// persistence paths.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Endpoint is missing or not an http(s) URL.
	#[error("invalid endpoint: {0}")]
	InvalidEndpoint(String),

	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The client was built outside a Tokio runtime.
	#[error("analytics client must be built inside a Tokio runtime")]
	NoRuntime,

	/// The client has been destroyed.
	#[error("analytics client has been destroyed")]
	ClientDestroyed,

	/// HTTP request failed before a response arrived.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Ingestion endpoint rejected the batch (4xx).
	#[error("batch rejected ({status}): {message}")]
	ClientError { status: u16, message: String },

	/// Ingestion endpoint failed (5xx or any other non-success status).
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Key-value store failure.
	#[error("storage error: {0}")]
	Storage(String),

	/// Filesystem failure in a file-backed store.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Configuration file could not be parsed.
	#[error("config parse error: {0}")]
	ConfigParse(#[from] toml::de::Error),
}

impl AnalyticsError {
	/// Returns true if retrying the same batch can never succeed.
	///
	/// Only client-error responses are permanent. Network failures, timeouts
	/// and every other status are treated as transient.
	pub fn is_permanent(&self) -> bool {
		matches!(self, AnalyticsError::ClientError { .. })
	}

	/// HTTP status of the response, if one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			AnalyticsError::ClientError { status, .. }
			| AnalyticsError::ServerError { status, .. } => Some(*status),
			AnalyticsError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
