//! Validated configuration consumed by the dispatcher and the token manager.
//!
//! Every type here deserializes with serde so callers can load settings from whatever source
//! they prefer; loading itself is left to the application.

/// OAuth 2.0 application registration settings.
pub mod oauth2;

pub use oauth2::*;

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	cache::Cache,
	error::ConfigError,
	retry::{
		DEFAULT_BASE_DELAY_MICROS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MICROS,
		ExponentialBackoffRetryPolicy,
	},
	store::{CacheTokenStorage, FileTokenStorage, StoreError, TokenStorage},
};

/// Settings for [`ExponentialBackoffRetryPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
	/// Attempts per request, counting the first one.
	pub max_attempts: u32,
	/// First backoff delay in microseconds.
	pub base_delay_micros: u64,
	/// Backoff ceiling in microseconds.
	pub max_delay_micros: u64,
}
impl RetrySettings {
	/// Validates the settings and builds the policy.
	pub fn policy(&self) -> Result<ExponentialBackoffRetryPolicy, ConfigError> {
		ExponentialBackoffRetryPolicy::new(
			self.max_attempts,
			self.base_delay_micros,
			self.max_delay_micros,
		)
	}
}
impl Default for RetrySettings {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			base_delay_micros: DEFAULT_BASE_DELAY_MICROS,
			max_delay_micros: DEFAULT_MAX_DELAY_MICROS,
		}
	}
}

/// Client-side rate limit applied before each request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
	/// Cache key naming the rate-limit identity.
	pub key: String,
	/// Calls allowed per 60-second window.
	pub max_per_window: u64,
}

/// Token storage backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum StorageDriver {
	/// Volatile storage inside the shared cache.
	#[default]
	Cache,
	/// Durable JSON file storage.
	File {
		/// Location of the token file.
		path: PathBuf,
	},
}
impl StorageDriver {
	/// Instantiates the selected backend.
	pub fn build(&self, cache: Arc<dyn Cache>) -> Result<Arc<dyn TokenStorage>, StoreError> {
		Ok(match self {
			Self::Cache => Arc::new(CacheTokenStorage::new(cache)),
			Self::File { path } => Arc::new(FileTokenStorage::open(path.clone())?),
		})
	}
}

/// Connection settings for one remote API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL every endpoint is resolved against; always ends with `/`.
	#[serde(deserialize_with = "deserialize_base_url")]
	pub base_url: Url,
	/// Static API key sent as a bearer token when no OAuth 2.0 manager is attached.
	#[serde(default)]
	pub api_key: Option<TokenSecret>,
	/// Retry behavior.
	#[serde(default)]
	pub retry: RetrySettings,
	/// Optional client-side rate limit.
	#[serde(default)]
	pub rate_limit: Option<RateLimitSettings>,
	/// Token storage backend used when an OAuth 2.0 manager is built from this config.
	#[serde(default)]
	pub storage: StorageDriver,
	/// Per-attempt transport timeout in milliseconds.
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	/// OAuth 2.0 registration; enables bearer tokens managed by the crate.
	#[serde(default)]
	pub oauth2: Option<OAuth2Config>,
}
impl ClientConfig {
	/// Creates a config for `base_url` with default retry settings and no credentials.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
		Ok(Self {
			base_url: parse_base_url("base_url", base_url.as_ref())?,
			api_key: None,
			retry: RetrySettings::default(),
			rate_limit: None,
			storage: StorageDriver::default(),
			timeout_ms: None,
			oauth2: None,
		})
	}

	/// Sets a static API key.
	pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(TokenSecret::new(key));

		self
	}

	/// Overrides the retry settings.
	pub fn with_retry(mut self, retry: RetrySettings) -> Self {
		self.retry = retry;

		self
	}

	/// Enables the client-side rate limit.
	pub fn with_rate_limit(mut self, key: impl Into<String>, max_per_window: u64) -> Self {
		self.rate_limit = Some(RateLimitSettings { key: key.into(), max_per_window });

		self
	}

	/// Selects the token storage backend.
	pub fn with_storage(mut self, storage: StorageDriver) -> Self {
		self.storage = storage;

		self
	}

	/// Sets the per-attempt transport timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));

		self
	}

	/// Attaches an OAuth 2.0 registration.
	pub fn with_oauth2(mut self, oauth2: OAuth2Config) -> Self {
		self.oauth2 = Some(oauth2);

		self
	}

	/// Per-attempt timeout, if configured.
	pub fn timeout(&self) -> Option<StdDuration> {
		self.timeout_ms.map(StdDuration::from_millis)
	}

	/// Resolves an endpoint relative to [`base_url`](Self::base_url).
	///
	/// Leading slashes are ignored so `"/contacts"` and `"contacts"` land on the same URL.
	/// Endpoints that resolve outside the base URL (absolute URLs, `..` segments climbing above
	/// its path) are rejected.
	pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ConfigError> {
		let outside = || ConfigError::EndpointOutsideBase { endpoint: endpoint.to_owned() };

		if Url::parse(endpoint).is_ok() {
			return Err(outside());
		}

		let url = self
			.base_url
			.join(endpoint.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidUrl { field: "endpoint", source })?;

		if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
			return Err(outside());
		}

		Ok(url)
	}
}

/// Parses `raw` into a URL usable as a base for relative joins, forcing a trailing `/`.
pub(crate) fn parse_base_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeABase { field, url: raw.to_owned() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn deserialize_base_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse_base_url("base_url", &raw).map_err(serde::de::Error::custom)
}
