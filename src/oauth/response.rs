//! Token endpoint payload parsing.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, TokenSecret},
	error::DecodeError,
};

/// `expires_in` as a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresField {
	Integer(i64),
	Float(f64),
	Text(String),
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresField>,
	#[serde(default)]
	refresh_token: Option<String>,
	/// Space-delimited string or JSON array.
	#[serde(default)]
	scope: Option<ScopeSet>,
}

/// Values carried over from the previous token when the provider omits them.
#[derive(Debug, Default)]
pub(crate) struct Fallbacks<'a> {
	pub(crate) refresh_token: Option<&'a TokenSecret>,
	pub(crate) scopes: Option<&'a ScopeSet>,
}

/// Decodes a successful token endpoint body into an [`AccessToken`] minted now.
pub(crate) fn parse_token_response(
	status: u16,
	body: &str,
	fallbacks: Fallbacks<'_>,
) -> Result<AccessToken> {
	let de = &mut serde_json::Deserializer::from_str(body);
	let payload: TokenEndpointResponse = serde_path_to_error::deserialize(de)
		.map_err(|source| DecodeError { source, status })?;

	if payload.access_token.is_empty() {
		return Err(malformed("access_token is empty"));
	}

	let expires_in = expires_in_seconds(payload.expires_in)?;
	let scopes = match payload.scope {
		Some(scopes) => scopes,
		None => fallbacks.scopes.cloned().unwrap_or_default(),
	};
	let refresh_token = payload
		.refresh_token
		.filter(|token| !token.is_empty())
		.map(TokenSecret::new)
		.or_else(|| fallbacks.refresh_token.cloned());
	let token_type =
		payload.token_type.filter(|kind| !kind.is_empty()).unwrap_or_else(|| "Bearer".into());

	AccessToken::builder()
		.access_token(payload.access_token)
		.token_type(token_type)
		.expires_in(expires_in)
		.maybe_refresh_token(refresh_token)
		.scopes(scopes)
		.build()
		.map_err(|e| malformed(&e.to_string()))
}

fn expires_in_seconds(field: Option<ExpiresField>) -> Result<u64> {
	let seconds = match field {
		None => return Err(malformed("expires_in is missing")),
		Some(ExpiresField::Integer(value)) => value,
		Some(ExpiresField::Float(value)) if value.is_finite() => value.trunc() as i64,
		Some(ExpiresField::Float(_)) => return Err(malformed("expires_in is not finite")),
		Some(ExpiresField::Text(raw)) => raw
			.trim()
			.parse::<i64>()
			.map_err(|_| malformed(&format!("expires_in is not numeric: {raw}")))?,
	};

	u64::try_from(seconds).map_err(|_| malformed(&format!("expires_in is negative: {seconds}")))
}

fn malformed(reason: &str) -> Error {
	Error::MalformedTokenResponse { reason: reason.to_owned() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_and_scope_formats() {
		let token = parse_token_response(
			200,
			r#"{"access_token":"a","expires_in":3600,"scope":"contacts vouchers"}"#,
			Fallbacks::default(),
		)
		.expect("Payload should parse.");

		assert_eq!(token.token_type(), "Bearer");
		assert_eq!(token.expires_in(), 3600);
		assert!(token.has_scopes(["contacts", "vouchers"]));
		assert!(token.refresh_token().is_none());

		let token = parse_token_response(
			200,
			r#"{"access_token":"a","token_type":"bearer","expires_in":"60","scope":["b","a"]}"#,
			Fallbacks::default(),
		)
		.expect("Payload should parse.");

		assert_eq!(token.token_type(), "bearer");
		assert_eq!(token.expires_in(), 60);
		assert_eq!(token.scopes().normalized(), "a b");
	}

	#[test]
	fn omitted_values_fall_back_to_previous_token() {
		let previous_refresh = TokenSecret::new("old-refresh");
		let previous_scopes = ScopeSet::new(["contacts"]).expect("Scope fixture should be valid.");
		let token = parse_token_response(
			200,
			r#"{"access_token":"a","expires_in":10}"#,
			Fallbacks { refresh_token: Some(&previous_refresh), scopes: Some(&previous_scopes) },
		)
		.expect("Payload should parse.");

		assert_eq!(token.refresh_token().map(TokenSecret::expose), Some("old-refresh"));
		assert_eq!(token.scopes(), &previous_scopes);

		let token = parse_token_response(
			200,
			r#"{"access_token":"a","expires_in":10,"refresh_token":"rotated"}"#,
			Fallbacks { refresh_token: Some(&previous_refresh), scopes: None },
		)
		.expect("Payload should parse.");

		assert_eq!(token.refresh_token().map(TokenSecret::expose), Some("rotated"));
	}

	#[test]
	fn missing_or_negative_expiry_is_malformed() {
		for body in [r#"{"access_token":"a"}"#, r#"{"access_token":"a","expires_in":-5}"#] {
			let err = parse_token_response(200, body, Fallbacks::default())
				.expect_err("Unusable expiry should be rejected.");

			assert!(matches!(err, Error::MalformedTokenResponse { .. }));
		}
	}

	#[test]
	fn undecodable_payload_reports_path() {
		let err = parse_token_response(200, r#"{"access_token":42}"#, Fallbacks::default())
			.expect_err("Wrong types should be rejected.");
		let Error::Decode(decode) = err else {
			panic!("Expected a decode error.");
		};

		assert_eq!(decode.path(), "access_token");
		assert_eq!(decode.status, 200);
	}
}
