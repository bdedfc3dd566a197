//! Thread-safe in-process [`Cache`] for single-process deployments and tests.

// self
use crate::{_prelude::*, cache::Cache, store::StoreError};

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: OffsetDateTime,
}
impl Entry {
	fn new(value: String, ttl: Duration, now: OffsetDateTime) -> Self {
		Self { value, expires_at: now + ttl }
	}

	fn is_live(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}

type EntryMap = Arc<RwLock<HashMap<String, Entry>>>;

/// In-memory cache whose clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(EntryMap);
impl MemoryCache {
	/// Number of stored entries, including expired ones not yet evicted.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops expired entries.
	pub fn evict_expired(&self) {
		let now = OffsetDateTime::now_utc();

		self.0.write().retain(|_, entry| entry.is_live(now));
	}
}
impl Cache for MemoryCache {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		let now = OffsetDateTime::now_utc();

		Ok(self.0.read().get(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value.clone()))
	}

	fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();

		self.0.write().insert(key.to_owned(), Entry::new(value, ttl, now));

		Ok(())
	}

	fn add(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.0.write();

		if guard.get(key).is_some_and(|entry| entry.is_live(now)) {
			return Ok(false);
		}

		guard.insert(key.to_owned(), Entry::new(value, ttl, now));

		Ok(true)
	}

	fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.0.write();
		let current = match guard.get(key).filter(|entry| entry.is_live(now)) {
			Some(entry) => Some((
				entry.value.parse::<u64>().map_err(|e| StoreError::Serialization {
					message: format!("Counter `{key}` is not numeric: {e}"),
				})?,
				entry.expires_at,
			)),
			None => None,
		};
		let (next, expires_at) = match current {
			Some((count, expires_at)) => (count.saturating_add(1), expires_at),
			None => (1, now + ttl),
		};

		guard.insert(key.to_owned(), Entry { value: next.to_string(), expires_at });

		Ok(next)
	}

	fn forget(&self, key: &str) -> Result<bool, StoreError> {
		let now = OffsetDateTime::now_utc();

		Ok(self.0.write().remove(key).is_some_and(|entry| entry.is_live(now)))
	}

	fn pull(&self, key: &str) -> Result<Option<String>, StoreError> {
		let now = OffsetDateTime::now_utc();

		Ok(self.0.write().remove(key).filter(|entry| entry.is_live(now)).map(|entry| entry.value))
	}
}
