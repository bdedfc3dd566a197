//! Immutable access token value object, expiry math, and builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Grace period subtracted from the expiry instant to absorb clock skew and in-flight latency.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(30);
/// Look-ahead window used by [`AccessToken::is_expiring_soon`].
pub const DEFAULT_EXPIRING_SOON_WINDOW: Duration = Duration::seconds(300);

const MAX_EXPIRES_IN: u64 = i32::MAX as u64;

/// Lifecycle state of the token kept for one identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
	/// Nothing is stored.
	NoToken,
	/// A token is stored and usable.
	Valid,
	/// The stored token expired but can be refreshed.
	ExpiredWithRefresh,
	/// The stored token expired and no refresh token is available.
	ExpiredNoRefresh,
}
impl TokenState {
	/// Classifies an optional token at the provided instant using the default buffer.
	pub fn of(token: Option<&AccessToken>, now: OffsetDateTime) -> Self {
		match token {
			None => Self::NoToken,
			Some(token) if !token.is_expired_at(now, DEFAULT_EXPIRY_BUFFER) => Self::Valid,
			Some(token) if token.refresh_token.is_some() => Self::ExpiredWithRefresh,
			Some(_) => Self::ExpiredNoRefresh,
		}
	}
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no lifetime was configured.
	#[error("Token lifetime must be supplied via expires_in.")]
	MissingExpiry,
	/// Issued when the lifetime cannot be represented as an instant.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}

/// OAuth 2.0 access token issued by the token endpoint.
///
/// Tokens are immutable: a refresh yields a new value instead of editing this one.
/// `created_at` is truncated to whole seconds so expiry math survives a storage round-trip
/// unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	access_token: TokenSecret,
	token_type: String,
	expires_in: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<TokenSecret>,
	#[serde(default)]
	scopes: ScopeSet,
	#[serde(with = "time::serde::timestamp")]
	created_at: OffsetDateTime,
}
impl AccessToken {
	/// Returns a builder for constructing tokens.
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::default()
	}

	/// Access token secret.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Token type reported by the provider (usually `Bearer`).
	pub fn token_type(&self) -> &str {
		&self.token_type
	}

	/// Lifetime in seconds counted from [`created_at`](Self::created_at).
	pub fn expires_in(&self) -> u64 {
		self.expires_in
	}

	/// Refresh token secret, if the provider issued one.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Scopes granted to the token.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Instant the token was minted, in whole seconds.
	pub fn created_at(&self) -> OffsetDateTime {
		self.created_at
	}

	/// Instant at which the token stops being valid.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.created_at
			.checked_add(Duration::seconds(self.expires_in as i64))
			.unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
	}

	/// Lifetime left at the provided instant; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at() - instant
	}

	/// Returns `true` once `instant >= expires_at - buffer`.
	pub fn is_expired_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		instant >= self.expires_at() - buffer
	}

	/// Checks expiry against the current clock using [`DEFAULT_EXPIRY_BUFFER`].
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc(), DEFAULT_EXPIRY_BUFFER)
	}

	/// Returns `true` once `instant + window >= expires_at`.
	pub fn is_expiring_soon_at(&self, instant: OffsetDateTime, window: Duration) -> bool {
		instant + window >= self.expires_at()
	}

	/// Checks the look-ahead window against the current clock.
	pub fn is_expiring_soon(&self) -> bool {
		self.is_expiring_soon_at(OffsetDateTime::now_utc(), DEFAULT_EXPIRING_SOON_WINDOW)
	}

	/// Exact membership check for one scope.
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.contains(scope)
	}

	/// Exact membership check for several scopes; an empty list is always satisfied.
	pub fn has_scopes<I, S>(&self, scopes: I) -> bool
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.scopes.contains_all(scopes)
	}

	/// `Authorization` header value for this token.
	pub fn authorization(&self) -> String {
		self.access_token.bearer()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scopes", &self.scopes)
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug, Default)]
pub struct AccessTokenBuilder {
	access_token: Option<TokenSecret>,
	token_type: Option<String>,
	expires_in: Option<u64>,
	refresh_token: Option<TokenSecret>,
	scopes: ScopeSet,
	created_at: Option<OffsetDateTime>,
}
impl AccessTokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the lifetime in seconds.
	pub fn expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token from an optional secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the granted scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the creation instant (defaults to now).
	pub fn created_at(mut self, instant: OffsetDateTime) -> Self {
		self.created_at = Some(instant);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let access_token = self.access_token.ok_or(AccessTokenBuilderError::MissingAccessToken)?;
		let expires_in = self.expires_in.ok_or(AccessTokenBuilderError::MissingExpiry)?;

		if expires_in > MAX_EXPIRES_IN {
			return Err(AccessTokenBuilderError::ExpiresInOutOfRange);
		}

		let created_at = truncate_to_second(self.created_at.unwrap_or_else(OffsetDateTime::now_utc));

		Ok(AccessToken {
			access_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			expires_in,
			refresh_token: self.refresh_token,
			scopes: self.scopes,
			created_at,
		})
	}
}

fn truncate_to_second(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(instant.nanosecond() as i64)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token(created_at: OffsetDateTime, expires_in: u64, refresh: Option<&str>) -> AccessToken {
		let mut builder = AccessToken::builder()
			.access_token("access")
			.expires_in(expires_in)
			.scopes(ScopeSet::new(["contacts", "vouchers"]).expect("Scope fixture should be valid."))
			.created_at(created_at);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Token fixture should build.")
	}

	#[test]
	fn expiry_honors_buffer_boundary() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let token = token(created, 3600, None);

		assert_eq!(token.expires_at(), macros::datetime!(2025-01-01 01:00 UTC));
		assert!(!token.is_expired_at(macros::datetime!(2025-01-01 00:59:29 UTC), DEFAULT_EXPIRY_BUFFER));
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 00:59:30 UTC), DEFAULT_EXPIRY_BUFFER));
		assert!(!token.is_expired_at(macros::datetime!(2025-01-01 00:59:59 UTC), Duration::ZERO));
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC), Duration::ZERO));
	}

	#[test]
	fn expiring_soon_uses_look_ahead_window() {
		let created = macros::datetime!(2025-01-01 00:00 UTC);
		let token = token(created, 3600, None);

		assert!(!token.is_expiring_soon_at(
			macros::datetime!(2025-01-01 00:54:59 UTC),
			DEFAULT_EXPIRING_SOON_WINDOW
		));
		assert!(token.is_expiring_soon_at(
			macros::datetime!(2025-01-01 00:55 UTC),
			DEFAULT_EXPIRING_SOON_WINDOW
		));
	}

	#[test]
	fn zero_lifetime_is_expired_immediately() {
		let token = token(OffsetDateTime::now_utc(), 0, None);

		assert!(token.is_expired());
		assert!(token.is_expiring_soon());
	}

	#[test]
	fn scope_checks_are_exact() {
		let token = token(OffsetDateTime::now_utc(), 3600, None);

		assert!(token.has_scope("contacts"));
		assert!(!token.has_scope("contacts.read"));
		assert!(token.has_scopes(["contacts", "vouchers"]));
		assert!(!token.has_scopes(["contacts", "accounts"]));
		assert!(token.has_scopes(Vec::<String>::new()));
	}

	#[test]
	fn serde_round_trip_preserves_every_field() {
		let created = macros::datetime!(2025-03-04 05:06:07.891 UTC);
		let token = token(created, 1800, Some("refresh"));

		assert_eq!(token.created_at(), macros::datetime!(2025-03-04 05:06:07 UTC));

		let payload = serde_json::to_string(&token).expect("Token should serialize.");
		let restored: AccessToken =
			serde_json::from_str(&payload).expect("Token should deserialize.");

		assert_eq!(restored, token);
		assert_eq!(restored.access_token().expose(), "access");
		assert_eq!(restored.refresh_token().map(TokenSecret::expose), Some("refresh"));
		assert_eq!(restored.expires_in(), 1800);
		assert_eq!(restored.created_at(), token.created_at());
		assert_eq!(restored.scopes(), token.scopes());
	}

	#[test]
	fn builder_validates_required_fields() {
		assert_eq!(
			AccessToken::builder().expires_in(10).build(),
			Err(AccessTokenBuilderError::MissingAccessToken)
		);
		assert_eq!(
			AccessToken::builder().access_token("a").build(),
			Err(AccessTokenBuilderError::MissingExpiry)
		);
		assert_eq!(
			AccessToken::builder().access_token("a").expires_in(u64::MAX).build(),
			Err(AccessTokenBuilderError::ExpiresInOutOfRange)
		);
	}

	#[test]
	fn state_classification_covers_all_states() {
		let now = macros::datetime!(2025-01-01 12:00 UTC);
		let valid = token(now, 3600, None);
		let expired_refreshable = token(now - Duration::hours(2), 3600, Some("r"));
		let expired_final = token(now - Duration::hours(2), 3600, None);

		assert_eq!(TokenState::of(None, now), TokenState::NoToken);
		assert_eq!(TokenState::of(Some(&valid), now), TokenState::Valid);
		assert_eq!(TokenState::of(Some(&expired_refreshable), now), TokenState::ExpiredWithRefresh);
		assert_eq!(TokenState::of(Some(&expired_final), now), TokenState::ExpiredNoRefresh);
	}

	#[test]
	fn debug_redacts_secrets() {
		let token = token(OffsetDateTime::now_utc(), 60, Some("refresh-secret"));
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("refresh-secret"));
		assert!(!rendered.contains("\"access\""));
	}
}
