// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable key-value storage for the event queue and device id.
//!
//! The SDK only needs a synchronous string store. [`MemoryStore`] keeps
//! values for the life of the process (and can be shared between client
//! instances through an `Arc`); [`FileStore`] keeps one file per key so the
//! queue survives restarts and crashes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use nas_analytics_core::{DeviceId, Event};
use tracing::{debug, warn};

use crate::error::{AnalyticsError, Result};

/// A synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>>;
	fn set(&self, key: &str, value: &str) -> Result<()>;
	fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
		Ok(values.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
		values.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
		values.remove(key);
		Ok(())
	}
}

/// Store that writes each key to `{dir}/{key}.json`.
///
/// The directory is created on first write. Writes go to a temporary file
/// that is then renamed over the target, so a crash mid-write leaves the
/// previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
	dir: PathBuf,
}

impl FileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Store under the platform data directory, e.g.
	/// `~/.local/share/nas-analytics` on Linux.
	pub fn in_data_dir() -> Option<Self> {
		dirs::data_dir().map(|p| Self::new(p.join("nas-analytics")))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn path_for(&self, key: &str) -> Result<PathBuf> {
		let valid = !key.is_empty()
			&& key
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
			&& !key.starts_with('.');
		if !valid {
			return Err(AnalyticsError::Storage(format!("invalid storage key: {key:?}")));
		}
		Ok(self.dir.join(format!("{key}.json")))
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		let path = self.path_for(key)?;
		match std::fs::read_to_string(&path) {
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let path = self.path_for(key)?;
		std::fs::create_dir_all(&self.dir)?;
		let tmp = path.with_extension("json.tmp");
		std::fs::write(&tmp, value)?;
		std::fs::rename(&tmp, &path)?;
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		let path = self.path_for(key)?;
		match std::fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// Default store: file-backed under the data directory when one exists,
/// otherwise in-memory.
pub fn default_store() -> Arc<dyn KeyValueStore> {
	match FileStore::in_data_dir() {
		Some(store) => Arc::new(store),
		None => {
			warn!("No data directory available, analytics queue will not survive restarts");
			Arc::new(MemoryStore::new())
		}
	}
}

/// Queue and device-id persistence on top of a [`KeyValueStore`].
///
/// Every operation here is infallible from the caller's point of view:
/// failures are logged and the SDK carries on with in-memory state.
pub struct Persistence {
	store: Arc<dyn KeyValueStore>,
	queue_key: String,
	device_id_key: String,
}

impl Persistence {
	pub fn new(store: Arc<dyn KeyValueStore>, queue_key: String, device_id_key: String) -> Self {
		Self {
			store,
			queue_key,
			device_id_key,
		}
	}

	/// Loads the persisted queue, or an empty one if nothing usable is stored.
	pub fn load_queue(&self) -> Vec<Event> {
		let raw = match self.store.get(&self.queue_key) {
			Ok(Some(raw)) => raw,
			Ok(None) => return Vec::new(),
			Err(e) => {
				warn!(error = %e, key = %self.queue_key, "Failed to read persisted queue");
				return Vec::new();
			}
		};

		match serde_json::from_str::<Vec<Event>>(&raw) {
			Ok(events) => {
				debug!(count = events.len(), "Recovered persisted events");
				events
			}
			Err(e) => {
				warn!(error = %e, key = %self.queue_key, "Discarding malformed persisted queue");
				Vec::new()
			}
		}
	}

	/// Overwrites the persisted queue with an already-serialized snapshot.
	pub fn save_queue(&self, snapshot: &str) {
		if let Err(e) = self.store.set(&self.queue_key, snapshot) {
			warn!(error = %e, key = %self.queue_key, "Failed to persist queue");
		}
	}

	/// Returns the stored device id, creating and storing one if absent.
	pub fn device_id(&self) -> DeviceId {
		match self.store.get(&self.device_id_key) {
			Ok(Some(id)) if !id.trim().is_empty() => return DeviceId::from(id),
			Ok(_) => {}
			Err(e) => warn!(error = %e, "Failed to read device id"),
		}

		let id = DeviceId::generate();
		if let Err(e) = self.store.set(&self.device_id_key, id.as_str()) {
			warn!(error = %e, "Failed to persist device id");
		}
		id
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nas_analytics_core::{ClientType, EventContext, EventType};
	use serde_json::Map;

	struct FailingStore;

	impl KeyValueStore for FailingStore {
		fn get(&self, _key: &str) -> Result<Option<String>> {
			Err(AnalyticsError::Storage("unavailable".to_string()))
		}

		fn set(&self, _key: &str, _value: &str) -> Result<()> {
			Err(AnalyticsError::Storage("quota exceeded".to_string()))
		}

		fn remove(&self, _key: &str) -> Result<()> {
			Err(AnalyticsError::Storage("unavailable".to_string()))
		}
	}

	fn persistence(store: Arc<dyn KeyValueStore>) -> Persistence {
		Persistence::new(store, "t_queue".to_string(), "t_device_id".to_string())
	}

	fn event(id: &str) -> Event {
		let ctx = EventContext {
			session_id: "sess_1".to_string(),
			device_id: "dev_1".to_string(),
			user_id: None,
			client_type: ClientType::Desktop,
		};
		Event::new(id, EventType::Generic, &ctx, Map::new())
	}

	#[test]
	fn memory_store_roundtrip() {
		let store = MemoryStore::new();
		assert_eq!(store.get("k").unwrap(), None);
		store.set("k", "v").unwrap();
		assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
		store.remove("k").unwrap();
		assert_eq!(store.get("k").unwrap(), None);
	}

	#[test]
	fn file_store_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path().join("nested"));

		assert_eq!(store.get("nas_queue").unwrap(), None);
		store.set("nas_queue", "[1,2]").unwrap();
		assert_eq!(store.get("nas_queue").unwrap(), Some("[1,2]".to_string()));
		store.set("nas_queue", "[]").unwrap();
		assert_eq!(store.get("nas_queue").unwrap(), Some("[]".to_string()));
		store.remove("nas_queue").unwrap();
		store.remove("nas_queue").unwrap();
		assert_eq!(store.get("nas_queue").unwrap(), None);
	}

	#[test]
	fn file_store_rejects_path_like_keys() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileStore::new(dir.path());
		assert!(matches!(
			store.set("../escape", "x"),
			Err(AnalyticsError::Storage(_))
		));
		assert!(matches!(store.get(""), Err(AnalyticsError::Storage(_))));
	}

	#[test]
	fn load_queue_missing_is_empty() {
		let p = persistence(Arc::new(MemoryStore::new()));
		assert!(p.load_queue().is_empty());
	}

	#[test]
	fn load_queue_malformed_is_empty() {
		let store = Arc::new(MemoryStore::new());
		store.set("t_queue", "{not json").unwrap();
		let p = persistence(store);
		assert!(p.load_queue().is_empty());
	}

	#[test]
	fn save_then_load_queue() {
		let store = Arc::new(MemoryStore::new());
		let p = persistence(store);
		let events = vec![event("a"), event("b")];

		p.save_queue(&serde_json::to_string(&events).unwrap());

		assert_eq!(p.load_queue(), events);
	}

	#[test]
	fn storage_failures_are_swallowed() {
		let p = persistence(Arc::new(FailingStore));
		p.save_queue("[]");
		assert!(p.load_queue().is_empty());
		assert!(p.device_id().as_str().starts_with("dev_"));
	}

	#[test]
	fn device_id_is_created_once() {
		let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
		let first = persistence(store.clone()).device_id();
		let second = persistence(store.clone()).device_id();

		assert_eq!(first, second);
		assert_eq!(
			store.get("t_device_id").unwrap(),
			Some(first.as_str().to_string())
		);
	}

	#[test]
	fn existing_device_id_is_reused() {
		let store = Arc::new(MemoryStore::new());
		store.set("t_device_id", "dev_from_web").unwrap();
		assert_eq!(persistence(store).device_id().as_str(), "dev_from_web");
	}
}
