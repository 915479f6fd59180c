// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builder for the free-form `extra` payload attached to an event.

use serde_json::{Map, Value};

/// Arbitrary key/value data carried on an event. Not validated.
///
/// # Example
///
/// ```
/// use nas_analytics::Properties;
///
/// let extra = Properties::new()
///     .insert("from_version", "7.1.2")
///     .insert("to_version", "7.2.0")
///     .insert("duration_ms", 48_210)
///     .insert("reboot_required", false);
/// assert_eq!(extra.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a value.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(inner: Map<String, Value>) -> Self {
		Self { inner }
	}
}

/// Objects are taken as-is. `null` becomes empty; any other value is kept
/// under the key `"value"`.
impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(inner) => Self { inner },
			Value::Null => Self::new(),
			other => Self::new().insert("value", other),
		}
	}
}

impl From<Properties> for Map<String, Value> {
	fn from(props: Properties) -> Self {
		props.inner
	}
}
