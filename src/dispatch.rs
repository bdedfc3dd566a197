//! Authenticated, retrying request pipeline.
//!
//! [`RequestDispatcher::send`] runs one state machine per call:
//!
//! 1. The rate-limit gate is checked; an exhausted window fails with [`Error::RateLimited`]
//!    before any network traffic and is never retried here.
//! 2. Headers are assembled: `Accept: application/json` plus a bearer token from the static API
//!    key or from [`OAuth2TokenManager::valid_access_token`].
//! 3. The transport runs one attempt. Statuses below 400 record a gate hit and return.
//! 4. A `401` with an OAuth 2.0 manager attached triggers exactly one refresh per call, then the
//!    loop continues without consulting the retry policy. A failed refresh ends the call with
//!    the refresh error.
//! 5. Every other failure goes to the [`RetryPolicy`]; a retry sleeps and loops, anything else
//!    surfaces the last error verbatim.

mod metrics;
mod request;
mod response;

pub use metrics::DispatchMetrics;
pub use request::ApiRequest;
pub use response::Response;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	cache::{Cache, MemoryCache},
	config::ClientConfig,
	error::ConfigError,
	http::{Transport, TransportRequest},
	oauth::OAuth2TokenManager,
	obs::{self, OperationKind},
	rate_limit::RateLimitGate,
	retry::RetryPolicy,
	sleep::{Sleeper, ThreadSleeper},
	store::TokenStorage,
};

/// How requests are authenticated.
#[derive(Clone)]
pub enum Credentials {
	/// No `Authorization` header.
	None,
	/// Static API key sent as a bearer token.
	ApiKey(TokenSecret),
	/// Bearer tokens managed by an OAuth 2.0 token manager.
	OAuth2(Arc<OAuth2TokenManager>),
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::None => f.write_str("None"),
			Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
			Self::OAuth2(_) => f.write_str("OAuth2(..)"),
		}
	}
}

/// Sends [`ApiRequest`]s with authentication, rate limiting, retries, and refresh-on-401.
pub struct RequestDispatcher {
	config: ClientConfig,
	transport: Arc<dyn Transport>,
	credentials: Credentials,
	retry_policy: Arc<dyn RetryPolicy>,
	sleeper: Arc<dyn Sleeper>,
	gate: RateLimitGate,
	metrics: DispatchMetrics,
}
impl RequestDispatcher {
	/// Starts a builder for `config`.
	pub fn builder(config: ClientConfig) -> DispatcherBuilder {
		DispatcherBuilder::new(config)
	}

	/// Configuration in use.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// OAuth 2.0 manager, when requests use managed bearer tokens.
	pub fn token_manager(&self) -> Option<&Arc<OAuth2TokenManager>> {
		match &self.credentials {
			Credentials::OAuth2(manager) => Some(manager),
			_ => None,
		}
	}

	/// Client-side rate-limit gate.
	pub fn rate_limit_gate(&self) -> &RateLimitGate {
		&self.gate
	}

	/// Dispatcher counters.
	pub fn metrics(&self) -> &DispatchMetrics {
		&self.metrics
	}

	/// `GET endpoint`.
	pub fn get(&self, endpoint: &str) -> Result<Response> {
		self.send(&ApiRequest::get(endpoint))
	}

	/// `POST endpoint` with a JSON body.
	pub fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<Response> {
		self.send(&ApiRequest::post(endpoint).json(body))
	}

	/// `PUT endpoint` with a JSON body.
	pub fn put(&self, endpoint: &str, body: serde_json::Value) -> Result<Response> {
		self.send(&ApiRequest::put(endpoint).json(body))
	}

	/// `DELETE endpoint`.
	pub fn delete(&self, endpoint: &str) -> Result<Response> {
		self.send(&ApiRequest::delete(endpoint))
	}

	/// Sends `request`, retrying and refreshing as needed.
	pub fn send(&self, request: &ApiRequest) -> Result<Response> {
		self.metrics.record_send();

		obs::observe(OperationKind::Send, "send", || self.run(request))
			.inspect_err(|_| self.metrics.record_failure())
	}

	fn run(&self, request: &ApiRequest) -> Result<Response> {
		let url = self.config.endpoint_url(&request.endpoint)?;
		let mut attempt = 1;
		let mut refreshed = false;

		loop {
			if let Some(limit) = &self.config.rate_limit {
				self.gate.ensure_available(&limit.key, limit.max_per_window)?;
			}

			let outgoing = self.prepare(request, &url)?;

			self.metrics.record_attempt();

			let api_error = match self.transport.request(&outgoing) {
				Ok(response) => match response.error_for_status() {
					Ok(response) => {
						if let Some(limit) = &self.config.rate_limit {
							self.gate.hit(&limit.key)?;
						}

						return Ok(response.into());
					},
					Err(api_error) => api_error,
				},
				Err(transport_error) => {
					let decision =
						self.retry_policy.decide(request.method, attempt, None, Some(&transport_error));

					if !decision.should_retry {
						return Err(transport_error.into());
					}

					self.pause(request, attempt, decision.delay_micros, &transport_error);

					attempt += 1;

					continue;
				},
			};

			match &self.credentials {
				Credentials::OAuth2(manager) if api_error.is_unauthorized() && !refreshed => {
					obs::auth_refresh_triggered(request.method, attempt);
					self.metrics.record_auth_refresh();
					manager.refresh_token(None)?;

					refreshed = true;
					attempt += 1;

					continue;
				},
				_ => (),
			}

			let decision = self.retry_policy.decide(request.method, attempt, Some(&api_error), None);

			if !decision.should_retry {
				return Err(api_error.into());
			}

			self.pause(request, attempt, decision.delay_micros, &api_error);

			attempt += 1;
		}
	}

	fn prepare(&self, request: &ApiRequest, url: &Url) -> Result<TransportRequest> {
		let mut outgoing = TransportRequest::new(request.method, url.clone())
			.with_header("Accept", "application/json")
			.with_query(request.query.iter().cloned())
			.with_body(request.body.clone())
			.with_timeout(self.config.timeout());

		for (name, value) in &request.headers {
			outgoing = outgoing.with_header(name.as_str(), value.as_str());
		}

		let authorization = match &self.credentials {
			Credentials::None => None,
			Credentials::ApiKey(key) => Some(key.bearer()),
			Credentials::OAuth2(manager) =>
				manager.valid_access_token()?.map(|token| token.authorization()),
		};

		if let Some(authorization) = authorization {
			outgoing = outgoing.with_header("Authorization", authorization);
		}

		Ok(outgoing)
	}

	fn pause(&self, request: &ApiRequest, attempt: u32, delay_micros: u64, cause: &dyn Display) {
		obs::retry_scheduled(request.method, attempt, delay_micros, cause);
		self.metrics.record_retry();
		self.sleeper.sleep_micros(delay_micros);
	}
}
impl Debug for RequestDispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDispatcher")
			.field("base_url", &self.config.base_url.as_str())
			.field("credentials", &self.credentials)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

/// Builder for [`RequestDispatcher`].
///
/// Unset collaborators fall back to defaults: a [`ReqwestTransport`](crate::http::ReqwestTransport)
/// (with the `reqwest` feature), an in-process [`MemoryCache`], a [`ThreadSleeper`], the policy
/// described by [`ClientConfig::retry`], and the storage selected by [`ClientConfig::storage`].
pub struct DispatcherBuilder {
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
	cache: Option<Arc<dyn Cache>>,
	sleeper: Option<Arc<dyn Sleeper>>,
	retry_policy: Option<Arc<dyn RetryPolicy>>,
	storage: Option<Arc<dyn TokenStorage>>,
	token_manager: Option<Arc<OAuth2TokenManager>>,
}
impl DispatcherBuilder {
	/// Creates a builder for `config`.
	pub fn new(config: ClientConfig) -> Self {
		Self {
			config,
			transport: None,
			cache: None,
			sleeper: None,
			retry_policy: None,
			storage: None,
			token_manager: None,
		}
	}

	/// Overrides the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the shared cache used by the gate, PKCE state, and cache-backed storage.
	pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Overrides the sleeper used between retries.
	pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = Some(sleeper);

		self
	}

	/// Overrides the retry policy.
	pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
		self.retry_policy = Some(policy);

		self
	}

	/// Overrides the token storage of the manager built from [`ClientConfig::oauth2`].
	pub fn storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
		self.storage = Some(storage);

		self
	}

	/// Attaches an existing token manager instead of building one from the config.
	pub fn token_manager(mut self, manager: Arc<OAuth2TokenManager>) -> Self {
		self.token_manager = Some(manager);

		self
	}

	/// Validates the configuration and assembles the dispatcher.
	pub fn build(self) -> Result<RequestDispatcher> {
		let transport = match self.transport {
			Some(transport) => transport,
			None => default_transport()?,
		};
		let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryCache::default()));
		let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper));
		let retry_policy = match self.retry_policy {
			Some(policy) => policy,
			None => Arc::new(self.config.retry.policy()?),
		};
		let credentials = match (self.token_manager, &self.config.oauth2, &self.config.api_key) {
			(Some(manager), _, _) => Credentials::OAuth2(manager),
			(None, Some(oauth2), _) => {
				let storage = match self.storage {
					Some(storage) => storage,
					None => self.config.storage.build(cache.clone())?,
				};
				let manager =
					OAuth2TokenManager::new(oauth2.clone(), transport.clone(), cache.clone(), storage)
						.with_timeout(self.config.timeout());

				Credentials::OAuth2(Arc::new(manager))
			},
			(None, None, Some(key)) => Credentials::ApiKey(key.clone()),
			(None, None, None) => Credentials::None,
		};

		Ok(RequestDispatcher {
			gate: RateLimitGate::new(cache),
			config: self.config,
			transport,
			credentials,
			retry_policy,
			sleeper,
			metrics: DispatchMetrics::default(),
		})
	}
}
impl Debug for DispatcherBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DispatcherBuilder").field("config", &self.config).finish_non_exhaustive()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn Transport>, ConfigError> {
	Ok(Arc::new(crate::http::ReqwestTransport::new()?))
}
#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn Transport>, ConfigError> {
	Err(ConfigError::Missing("transport"))
}
