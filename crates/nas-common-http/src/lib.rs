// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the NAS analytics SDK.
//!
//! Every outbound request carries the same `User-Agent`, so the ingestion
//! side can tell SDK builds and platforms apart.

mod client;

pub use client::{builder, platform, user_agent, SDK_VERSION};
