//! Error types shared by the dispatcher, the OAuth 2.0 token manager, and the storage layer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No response was received (DNS, connect, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The API answered with a status code of 400 or above.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// The local rate-limit gate rejected the call before it reached the network.
	#[error(transparent)]
	RateLimited(#[from] RateLimitError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Response payload could not be decoded into the requested type.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// The PKCE `state` is unknown or its verifier already expired.
	#[error("Authorization state is unknown or has expired.")]
	InvalidState,
	/// A refresh was requested but no refresh token is available.
	#[error("No refresh token is available.")]
	NoRefreshToken,
	/// Token endpoint answered successfully but the payload is unusable.
	#[error("Token endpoint returned a malformed response: {reason}.")]
	MalformedTokenResponse {
		/// What was wrong with the payload.
		reason: String,
	},
	/// Authorization code exchange failed.
	#[error("Authorization code exchange failed.")]
	AuthExchange {
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
	/// Refresh token grant failed.
	#[error("Access token refresh failed.")]
	AuthRefresh {
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Wraps a failure that happened while exchanging an authorization code.
	pub fn auth_exchange(source: impl Into<Error>) -> Self {
		Self::AuthExchange { source: Box::new(source.into()) }
	}

	/// Wraps a failure that happened while refreshing an access token.
	pub fn auth_refresh(source: impl Into<Error>) -> Self {
		Self::AuthRefresh { source: Box::new(source.into()) }
	}

	/// Returns the API error when the failure carries an HTTP response.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(e) => Some(e),
			_ => None,
		}
	}
}

/// Response with a status code of 400 or above.
///
/// Status and body are kept exactly as received so callers can make their own decision.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("API request failed with status {status}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: String,
	/// `Retry-After` hint in seconds, if the server supplied one.
	pub retry_after: Option<u64>,
	/// Response headers with lowercase names.
	pub headers: BTreeMap<String, String>,
}
impl ApiError {
	/// Creates an error for the provided status and body.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into(), retry_after: None, headers: BTreeMap::new() }
	}

	/// Attaches a `Retry-After` hint in seconds.
	pub fn with_retry_after(mut self, seconds: u64) -> Self {
		self.retry_after = Some(seconds);

		self
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Returns `true` for `429 Too Many Requests`.
	pub fn is_too_many_requests(&self) -> bool {
		self.status == 429
	}
}

/// Local pre-flight rejection issued by the rate-limit gate.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Local rate limit for `{key}` exhausted; retry in {retry_after_seconds} seconds.")]
pub struct RateLimitError {
	/// Rate-limit key that ran out of budget.
	pub key: String,
	/// Seconds until the current window closes.
	pub retry_after_seconds: u64,
}

/// Transport-level failures where no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not complete before the per-attempt timeout.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Target URL.
		url: String,
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Timeout { url: url.into(), source: Box::new(src) }
	}

	/// Returns `true` when the failure was a timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let url = e.url().map(|url| url.to_string()).unwrap_or_default();

		if e.is_timeout() { Self::timeout(url, e) } else { Self::network(url, e) }
	}
}

/// Payload decoding failure with the JSON path that failed.
#[derive(Debug, ThisError)]
#[error("Response body could not be decoded (status {status}).")]
pub struct DecodeError {
	/// Structured parsing failure.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status code of the decoded response.
	pub status: u16,
}
impl DecodeError {
	/// JSON path at which decoding failed.
	pub fn path(&self) -> String {
		self.source.path().to_string()
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed or joined.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Which setting failed validation.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A URL cannot serve as a base for relative endpoints.
	#[error("The {field} URL cannot be used as a base URL: {url}.")]
	CannotBeABase {
		/// Which setting failed validation.
		field: &'static str,
		/// Offending URL.
		url: String,
	},
	/// An endpoint resolves outside the configured base URL.
	#[error("Endpoint `{endpoint}` resolves outside the configured base URL.")]
	EndpointOutsideBase {
		/// Endpoint as supplied by the caller.
		endpoint: String,
	},
	/// A required setting was not supplied.
	#[error("Missing required setting `{0}`.")]
	Missing(&'static str),
	/// Retry settings are inconsistent.
	#[error("Retry settings are invalid: {reason}.")]
	InvalidRetry {
		/// What was wrong with the settings.
		reason: &'static str,
	},
	/// Request scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Storage identity cannot be used.
	#[error("Token identity is invalid.")]
	InvalidIdentity(#[from] crate::auth::IdentifierError),
	/// Token builder validation failed.
	#[error("Unable to build access token.")]
	TokenBuild(#[from] crate::auth::AccessTokenBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
