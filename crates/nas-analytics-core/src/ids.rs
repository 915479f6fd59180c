// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device and session identifiers.
//!
//! A device id is created once and persisted, so it survives restarts. Its
//! UUIDv7 body embeds the creation time, which keeps ids from different
//! devices collision-improbable even with a weak random source. A session id
//! is random and lives only as long as one SDK instance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEVICE_ID_PREFIX: &str = "dev_";
pub const SESSION_ID_PREFIX: &str = "sess_";

/// Stable identifier for the device, shared by every SDK instance on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
	/// Generates a new time-ordered device id.
	pub fn generate() -> Self {
		Self(format!("{DEVICE_ID_PREFIX}{}", Uuid::now_v7().simple()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for DeviceId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl std::fmt::Display for DeviceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identifier for one SDK instance lifetime. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	pub fn generate() -> Self {
		Self(format!("{SESSION_ID_PREFIX}{}", Uuid::new_v4().simple()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for SessionId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn device_id_has_prefix_and_uuid_body() {
		let id = DeviceId::generate();
		let body = id.as_str().strip_prefix(DEVICE_ID_PREFIX).unwrap();
		assert_eq!(body.len(), 32);
		assert!(Uuid::parse_str(body).is_ok());
	}

	#[test]
	fn device_ids_are_unique() {
		assert_ne!(DeviceId::generate(), DeviceId::generate());
	}

	#[test]
	fn session_id_has_prefix() {
		let id = SessionId::generate();
		assert!(id.as_str().starts_with(SESSION_ID_PREFIX));
		assert_ne!(id, SessionId::generate());
	}

	#[test]
	fn stored_device_id_is_reused_verbatim() {
		let id = DeviceId::from("dev_legacy123".to_string());
		assert_eq!(id.to_string(), "dev_legacy123");
	}
}
