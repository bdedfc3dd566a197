//! Storage contract and built-in backends for the token pair kept per identity.
//!
//! Every backend holds at most one live token per [`TokenIdentity`]: `store` is an upsert,
//! `get` returns the current token, and `clear` removes it. Backends are interchangeable,
//! so the dispatcher and the token manager only ever see `Arc<dyn TokenStorage>`.

pub mod cache;
pub mod file;

pub use cache::CacheTokenStorage;
pub use file::FileTokenStorage;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenIdentity},
};

/// Persistence contract for OAuth 2.0 tokens.
pub trait TokenStorage
where
	Self: Send + Sync,
{
	/// Persists or replaces the token kept for `identity`.
	fn store(&self, identity: &TokenIdentity, token: &AccessToken) -> Result<(), StoreError>;

	/// Fetches the token kept for `identity`, if present.
	fn get(&self, identity: &TokenIdentity) -> Result<Option<AccessToken>, StoreError>;

	/// Removes the token kept for `identity`; clearing an absent token is not an error.
	fn clear(&self, identity: &TokenIdentity) -> Result<(), StoreError>;
}

/// Error type produced by [`TokenStorage`] and [`Cache`](crate::cache::Cache) implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
