//! OAuth 2.0 token lifecycle: authorization code + PKCE, refresh, and revocation.
//!
//! [`OAuth2TokenManager`] keeps one access/refresh token pair per app registration in an injected
//! [`TokenStorage`]. Pending PKCE verifiers live in the shared [`Cache`] under
//! `oauth2_pkce:<state>` for ten minutes and are consumed exactly once by
//! [`exchange_code_for_token`](OAuth2TokenManager::exchange_code_for_token).
//!
//! The manager takes no locks. Two processes refreshing at the same time both call the token
//! endpoint and the last write wins; a provider that rotates refresh tokens strictly may then
//! reject the loser's next refresh, which surfaces as [`Error::AuthRefresh`].

mod metrics;
mod response;

pub mod pkce;

pub use metrics::TokenMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSecret, TokenState},
	cache::Cache,
	config::OAuth2Config,
	http::{HttpMethod, RequestBody, Transport, TransportRequest, TransportResponse},
	obs::{self, OperationKind},
	oauth::{
		pkce::PkcePair,
		response::{Fallbacks, parse_token_response},
	},
	store::TokenStorage,
};

/// Authorization redirect prepared by [`OAuth2TokenManager::authorization_url`].
#[derive(Clone)]
pub struct AuthorizationRequest {
	/// URL the user agent should be sent to.
	pub url: Url,
	/// Opaque `state` that must come back with the redirect.
	pub state: String,
	/// PKCE verifier also parked in the cache for the exchange.
	pub code_verifier: String,
}
impl Debug for AuthorizationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationRequest")
			.field("url", &self.url)
			.field("state", &self.state)
			.field("code_verifier", &"<redacted>")
			.finish()
	}
}

/// Keeps the OAuth 2.0 token pair of one app registration valid.
pub struct OAuth2TokenManager {
	config: OAuth2Config,
	transport: Arc<dyn Transport>,
	cache: Arc<dyn Cache>,
	storage: Arc<dyn TokenStorage>,
	timeout: Option<StdDuration>,
	metrics: TokenMetrics,
}
impl OAuth2TokenManager {
	/// Creates a manager over the provided collaborators.
	pub fn new(
		config: OAuth2Config,
		transport: Arc<dyn Transport>,
		cache: Arc<dyn Cache>,
		storage: Arc<dyn TokenStorage>,
	) -> Self {
		Self { config, transport, cache, storage, timeout: None, metrics: TokenMetrics::default() }
	}

	/// Sets the per-call timeout used for identity-provider requests.
	pub fn with_timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Registration this manager serves.
	pub fn config(&self) -> &OAuth2Config {
		&self.config
	}

	/// Operation counters.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Builds the authorization redirect and parks its PKCE verifier under `state`.
	///
	/// A random 32-character state is generated when `state` is `None` or empty.
	pub fn authorization_url(&self, state: Option<&str>) -> Result<AuthorizationRequest> {
		obs::observe(OperationKind::AuthorizationUrl, "authorization_url", || -> Result<_> {
			let state = match state.filter(|s| !s.is_empty()) {
				Some(state) => state.to_owned(),
				None => pkce::random_string(pkce::STATE_LEN),
			};
			let pair = PkcePair::generate();

			self.cache.put(&pkce::state_key(&state), pair.verifier.clone(), pkce::STATE_TTL)?;

			let mut url = self.config.authorize_url.clone();

			{
				let mut pairs = url.query_pairs_mut();

				pairs.append_pair("response_type", "code");
				pairs.append_pair("client_id", &self.config.client_id);
				pairs.append_pair("redirect_uri", self.config.redirect_uri.as_str());

				if !self.config.scopes.is_empty() {
					pairs.append_pair("scope", &self.config.scopes.normalized());
				}

				pairs.append_pair("state", &state);
				pairs.append_pair("code_challenge", &pair.challenge);
				pairs.append_pair("code_challenge_method", pair.method.as_str());
			}

			Ok(AuthorizationRequest { url, state, code_verifier: pair.verifier })
		})
	}

	/// Exchanges an authorization code, consuming the verifier parked under `state`.
	///
	/// Unknown or expired state fails with [`Error::InvalidState`] before any network call.
	pub fn exchange_code_for_token(&self, code: &str, state: &str) -> Result<AccessToken> {
		obs::observe(OperationKind::ExchangeCode, "exchange_code_for_token", || -> Result<_> {
			let verifier =
				self.cache.pull(&pkce::state_key(state))?.ok_or(Error::InvalidState)?;
			let form = vec![
				("grant_type".to_owned(), "authorization_code".to_owned()),
				("client_id".to_owned(), self.config.client_id.clone()),
				("client_secret".to_owned(), self.config.client_secret.expose().to_owned()),
				("redirect_uri".to_owned(), self.config.redirect_uri.to_string()),
				("code".to_owned(), code.to_owned()),
				("code_verifier".to_owned(), verifier),
			];
			let fallbacks = Fallbacks { refresh_token: None, scopes: Some(&self.config.scopes) };
			let token = self
				.request_token(form, fallbacks)
				.inspect_err(|_| self.metrics.record_failure())
				.map_err(Error::auth_exchange)?;

			self.storage.store(&self.config.identity, &token)?;
			self.metrics.record_exchange();

			Ok(token)
		})
	}

	/// Runs the refresh grant and stores the resulting token as a full replacement.
	///
	/// Without an explicit `refresh_token` the stored one is used; none available fails with
	/// [`Error::NoRefreshToken`].
	pub fn refresh_token(&self, refresh_token: Option<&str>) -> Result<AccessToken> {
		let previous = self.storage.get(&self.config.identity)?;
		let refresh = match refresh_token {
			Some(token) => token.to_owned(),
			None => previous
				.as_ref()
				.and_then(AccessToken::refresh_token)
				.map(|secret| secret.expose().to_owned())
				.ok_or(Error::NoRefreshToken)?,
		};

		self.refresh_with(previous.as_ref(), refresh)
	}

	/// Returns a usable access token, refreshing it once when it expired.
	///
	/// `None` means nothing is stored, or the stored token expired without a refresh token.
	pub fn valid_access_token(&self) -> Result<Option<AccessToken>> {
		let Some(current) = self.storage.get(&self.config.identity)? else {
			return Ok(None);
		};

		match TokenState::of(Some(&current), OffsetDateTime::now_utc()) {
			TokenState::Valid => Ok(Some(current)),
			TokenState::ExpiredWithRefresh => {
				let refresh = current
					.refresh_token()
					.map(|secret| secret.expose().to_owned())
					.ok_or(Error::NoRefreshToken)?;

				self.refresh_with(Some(&current), refresh).map(Some)
			},
			TokenState::ExpiredNoRefresh | TokenState::NoToken => Ok(None),
		}
	}

	/// Revokes `token` (the stored access token by default) and clears local storage.
	///
	/// Storage is cleared whatever the provider answers. Returns whether the provider accepted
	/// the call; with nothing to revoke it returns `false` without a network call.
	pub fn revoke_token(&self, token: Option<&str>) -> Result<bool> {
		obs::observe(OperationKind::Revoke, "revoke_token", || -> Result<_> {
			let target = match token {
				Some(token) => Some(token.to_owned()),
				None => self
					.storage
					.get(&self.config.identity)?
					.map(|current| current.access_token().expose().to_owned()),
			};
			let Some(target) = target else {
				self.storage.clear(&self.config.identity)?;

				return Ok(false);
			};
			let form = vec![
				("token".to_owned(), target),
				("client_id".to_owned(), self.config.client_id.clone()),
				("client_secret".to_owned(), self.config.client_secret.expose().to_owned()),
			];
			let accepted = match self
				.post_form(&self.config.revoke_url, form)
				.and_then(|response| response.error_for_status().map_err(Error::from))
			{
				Ok(_) => {
					self.metrics.record_revocation();

					true
				},
				Err(e) => {
					obs::revoke_failed(&e);
					self.metrics.record_failure();

					false
				},
			};

			self.storage.clear(&self.config.identity)?;

			Ok(accepted)
		})
	}

	/// Stored token, without refreshing.
	pub fn current_token(&self) -> Result<Option<AccessToken>> {
		Ok(self.storage.get(&self.config.identity)?)
	}

	/// Lifecycle state of the stored token.
	pub fn token_state(&self) -> Result<TokenState> {
		let current = self.current_token()?;

		Ok(TokenState::of(current.as_ref(), OffsetDateTime::now_utc()))
	}

	fn refresh_with(&self, previous: Option<&AccessToken>, refresh: String) -> Result<AccessToken> {
		obs::observe(OperationKind::Refresh, "refresh_token", || -> Result<_> {
			let used = TokenSecret::new(refresh.clone());
			let form = vec![
				("grant_type".to_owned(), "refresh_token".to_owned()),
				("client_id".to_owned(), self.config.client_id.clone()),
				("client_secret".to_owned(), self.config.client_secret.expose().to_owned()),
				("redirect_uri".to_owned(), self.config.redirect_uri.to_string()),
				("refresh_token".to_owned(), refresh),
			];
			let scopes = previous.map(AccessToken::scopes).unwrap_or(&self.config.scopes);
			let fallbacks = Fallbacks { refresh_token: Some(&used), scopes: Some(scopes) };
			let token = self
				.request_token(form, fallbacks)
				.inspect_err(|_| self.metrics.record_failure())
				.map_err(Error::auth_refresh)?;

			self.storage.store(&self.config.identity, &token)?;
			self.metrics.record_refresh();

			Ok(token)
		})
	}

	fn request_token(
		&self,
		form: Vec<(String, String)>,
		fallbacks: Fallbacks<'_>,
	) -> Result<AccessToken> {
		let response = self.post_form(&self.config.token_url, form)?.error_for_status()?;

		parse_token_response(response.status, &response.body, fallbacks)
	}

	fn post_form(&self, url: &Url, form: Vec<(String, String)>) -> Result<TransportResponse> {
		let request = TransportRequest::new(HttpMethod::Post, url.clone())
			.with_header("Accept", "application/json")
			.with_body(RequestBody::Form(form))
			.with_timeout(self.timeout);

		Ok(self.transport.request(&request)?)
	}
}
impl Debug for OAuth2TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2TokenManager")
			.field("config", &self.config)
			.field("timeout", &self.timeout)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
