//! Shared key/value and counter store consumed by the rate-limit gate, PKCE state tracking,
//! and the volatile token storage.
//!
//! In production the [`Cache`] is usually a network cache shared by every process that talks to
//! the same API identity. Implementations own their consistency boundary: [`Cache::increment`],
//! [`Cache::add`], and [`Cache::pull`] must be atomic with respect to concurrent callers because
//! nothing above this layer takes a lock.

pub mod memory;

pub use memory::MemoryCache;

// self
use crate::{_prelude::*, store::StoreError};

/// Key/value store with per-entry time-to-live.
pub trait Cache
where
	Self: Send + Sync,
{
	/// Returns the live value for `key`.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes `value` under `key`, replacing any previous entry.
	fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

	/// Writes `value` only when no live entry exists; returns whether the write happened.
	fn add(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError>;

	/// Increments the counter under `key` and returns the new value.
	///
	/// A missing or expired counter starts at 1 and lives for `ttl`; an existing counter keeps
	/// its original expiry.
	fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

	/// Removes `key`; returns whether a live entry was removed.
	fn forget(&self, key: &str) -> Result<bool, StoreError>;

	/// Removes `key` and returns its live value in one step.
	fn pull(&self, key: &str) -> Result<Option<String>, StoreError>;
}
