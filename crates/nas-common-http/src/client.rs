// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client builders with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// SDK version baked in at compile time.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platform string in `{os}-{arch}` format, e.g. "linux-x86_64".
pub fn platform() -> String {
	format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Creates a new HTTP client builder with the standard SDK User-Agent header.
///
/// Connection pooling and keep-alive are left at reqwest's defaults so a
/// delivery issued while the host is shutting down can reuse a warm
/// connection.
///
/// # Example
/// ```ignore
/// let client = nas_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the standard SDK User-Agent string.
///
/// Format: `nas-analytics/{version} ({platform})`
pub fn user_agent() -> String {
	format!("nas-analytics/{SDK_VERSION} ({})", platform())
}
