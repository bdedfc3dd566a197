//! Volatile [`TokenStorage`] on top of a shared [`Cache`].

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenIdentity},
	cache::Cache,
	obs,
	store::{StoreError, TokenStorage},
};

const KEY_PREFIX: &str = "oauth2_token";
/// Extra lifetime kept past the token's expiry so one more read cycle still sees it.
const TTL_GRACE: Duration = Duration::seconds(300);
const TTL_FLOOR: Duration = Duration::seconds(60);

/// Keeps tokens in a cache entry whose TTL outlives the token itself.
///
/// An entry that no longer parses is purged on read and reported as absent, so a schema change
/// or a corrupted write heals itself on the next successful exchange.
#[derive(Clone)]
pub struct CacheTokenStorage {
	cache: Arc<dyn Cache>,
}
impl CacheTokenStorage {
	/// Creates storage backed by the provided cache.
	pub fn new(cache: Arc<dyn Cache>) -> Self {
		Self { cache }
	}

	/// Cache key used for `identity`.
	pub fn key(identity: &TokenIdentity) -> String {
		format!("{KEY_PREFIX}:{identity}")
	}

	/// TTL applied when writing `token` at `now`: `max(remaining + 300s, 60s)`.
	pub fn ttl_for(token: &AccessToken, now: OffsetDateTime) -> Duration {
		(token.remaining_at(now) + TTL_GRACE).max(TTL_FLOOR)
	}
}
impl TokenStorage for CacheTokenStorage {
	fn store(&self, identity: &TokenIdentity, token: &AccessToken) -> Result<(), StoreError> {
		let payload = serde_json::to_string(token).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token for {identity}: {e}"),
		})?;
		let ttl = Self::ttl_for(token, OffsetDateTime::now_utc());

		self.cache.put(&Self::key(identity), payload, ttl)
	}

	fn get(&self, identity: &TokenIdentity) -> Result<Option<AccessToken>, StoreError> {
		let key = Self::key(identity);
		let Some(payload) = self.cache.get(&key)? else {
			return Ok(None);
		};

		match serde_json::from_str::<AccessToken>(&payload) {
			Ok(token) => Ok(Some(token)),
			Err(e) => {
				obs::storage_purged(identity, &e);
				self.cache.forget(&key)?;

				Ok(None)
			},
		}
	}

	fn clear(&self, identity: &TokenIdentity) -> Result<(), StoreError> {
		self.cache.forget(&Self::key(identity)).map(|_| ())
	}
}
impl Debug for CacheTokenStorage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CacheTokenStorage(..)")
	}
}
