//! Opaque identity under which a token pair is stored.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identity validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identity was empty.
	#[error("Token identity cannot be empty.")]
	Empty,
	/// The identity contains whitespace characters.
	#[error("Token identity contains whitespace.")]
	ContainsWhitespace,
	/// The identity exceeded the allowed character count.
	#[error("Token identity exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Opaque key naming the single token pair kept for one tenant, user, or app registration.
///
/// Identities end up inside cache keys and storage rows, so they are validated once on
/// construction and never contain whitespace.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenIdentity(String);
impl TokenIdentity {
	/// Creates a new identity after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Default for TokenIdentity {
	fn default() -> Self {
		Self("default".into())
	}
}
impl Deref for TokenIdentity {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for TokenIdentity {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for TokenIdentity {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<TokenIdentity> for String {
	fn from(value: TokenIdentity) -> Self {
		value.0
	}
}
impl TryFrom<String> for TokenIdentity {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for TokenIdentity {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for TokenIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenIdentity({})", self.0)
	}
}
impl Display for TokenIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identities_reject_whitespace_and_empty_values() {
		assert!(TokenIdentity::new(" tenant-1").is_err(), "Leading whitespace must be rejected.");
		assert_eq!(TokenIdentity::new(""), Err(IdentifierError::Empty));
		assert_eq!(
			TokenIdentity::new(format!("tenant{}1", '\u{00A0}')),
			Err(IdentifierError::ContainsWhitespace)
		);

		let identity = TokenIdentity::new("tenant-1").expect("Identity fixture should be valid.");

		assert_eq!(identity.as_ref(), "tenant-1");
	}

	#[test]
	fn length_limit_is_inclusive() {
		TokenIdentity::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(TokenIdentity::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let identity: TokenIdentity = serde_json::from_str("\"acme-prod\"")
			.expect("Identity should deserialize successfully.");

		assert_eq!(identity.to_string(), "acme-prod");
		assert!(serde_json::from_str::<TokenIdentity>("\"with space\"").is_err());
	}
}
