// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenIdentity, TokenSecret},
	config::parse_base_url,
	error::ConfigError,
};

const AUTHORIZE_PATH: &str = "oauth2/authorize";
const TOKEN_PATH: &str = "oauth2/token";
const REVOKE_PATH: &str = "oauth2/revoke";

/// One OAuth 2.0 application registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Config {
	/// Client identifier issued by the identity provider.
	pub client_id: String,
	/// Client secret; redacted in debug output.
	pub client_secret: TokenSecret,
	/// Redirect URI registered for the authorization code flow.
	pub redirect_uri: Url,
	/// Authorization endpoint.
	pub authorize_url: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token_url: Url,
	/// Revocation endpoint.
	pub revoke_url: Url,
	/// Scopes requested during authorization.
	#[serde(default)]
	pub scopes: ScopeSet,
	/// Identity under which the token pair is stored.
	#[serde(default)]
	pub identity: TokenIdentity,
}
impl OAuth2Config {
	/// Creates a builder for the provided client credentials.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> OAuth2ConfigBuilder {
		OAuth2ConfigBuilder::new(client_id, client_secret)
	}
}

/// Builder for [`OAuth2Config`].
///
/// URLs are kept as strings until [`build`](Self::build) so every validation failure surfaces in
/// one place.
#[derive(Debug)]
pub struct OAuth2ConfigBuilder {
	client_id: String,
	client_secret: TokenSecret,
	redirect_uri: Option<String>,
	base_url: Option<String>,
	authorize_url: Option<String>,
	token_url: Option<String>,
	revoke_url: Option<String>,
	scopes: Vec<String>,
	identity: Option<String>,
}
impl OAuth2ConfigBuilder {
	/// Creates a builder seeded with client credentials.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri: None,
			base_url: None,
			authorize_url: None,
			token_url: None,
			revoke_url: None,
			scopes: Vec::new(),
			identity: None,
		}
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, url: impl Into<String>) -> Self {
		self.redirect_uri = Some(url.into());

		self
	}

	/// Derives `/oauth2/authorize`, `/oauth2/token`, and `/oauth2/revoke` from the IdP base URL.
	///
	/// Explicit endpoint setters take precedence.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
		self.authorize_url = Some(url.into());

		self
	}

	/// Sets the token endpoint.
	pub fn token_url(mut self, url: impl Into<String>) -> Self {
		self.token_url = Some(url.into());

		self
	}

	/// Sets the revocation endpoint.
	pub fn revoke_url(mut self, url: impl Into<String>) -> Self {
		self.revoke_url = Some(url.into());

		self
	}

	/// Adds requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Sets the storage identity (defaults to `default`).
	pub fn identity(mut self, identity: impl Into<String>) -> Self {
		self.identity = Some(identity.into());

		self
	}

	/// Validates every setting and produces the config.
	pub fn build(self) -> Result<OAuth2Config, ConfigError> {
		if self.client_id.is_empty() {
			return Err(ConfigError::Missing("client_id"));
		}

		let base =
			self.base_url.as_deref().map(|raw| parse_base_url("base_url", raw)).transpose()?;
		let redirect_uri = parse(
			"redirect_uri",
			self.redirect_uri.as_deref().ok_or(ConfigError::Missing("redirect_uri"))?,
		)?;
		let authorize_url =
			endpoint("authorize_url", self.authorize_url, base.as_ref(), AUTHORIZE_PATH)?;
		let token_url = endpoint("token_url", self.token_url, base.as_ref(), TOKEN_PATH)?;
		let revoke_url = endpoint("revoke_url", self.revoke_url, base.as_ref(), REVOKE_PATH)?;
		let scopes = ScopeSet::new(self.scopes)?;
		let identity = match self.identity {
			Some(raw) => TokenIdentity::new(raw)?,
			None => TokenIdentity::default(),
		};

		Ok(OAuth2Config {
			client_id: self.client_id,
			client_secret: self.client_secret,
			redirect_uri,
			authorize_url,
			token_url,
			revoke_url,
			scopes,
			identity,
		})
	}
}

fn parse(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn endpoint(
	field: &'static str,
	explicit: Option<String>,
	base: Option<&Url>,
	path: &str,
) -> Result<Url, ConfigError> {
	match (explicit, base) {
		(Some(raw), _) => parse(field, &raw),
		(None, Some(base)) =>
			base.join(path).map_err(|source| ConfigError::InvalidUrl { field, source }),
		(None, None) => Err(ConfigError::Missing(field)),
	}
}
