//! PKCE (RFC 7636) verifier and challenge helpers.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Length of generated `state` values.
pub const STATE_LEN: usize = 32;
/// Length of generated code verifiers.
pub const VERIFIER_LEN: usize = 64;
/// Lifetime of a pending `state → verifier` entry.
pub const STATE_TTL: Duration = Duration::minutes(10);

const STATE_KEY_PREFIX: &str = "oauth2_pkce";

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier plus the challenge sent with the authorization request.
#[derive(Clone)]
pub struct PkcePair {
	/// Secret verifier presented during the code exchange.
	pub verifier: String,
	/// `base64url_nopad(SHA256(verifier))`.
	pub challenge: String,
	/// Challenge method (currently always `S256`).
	pub method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh 64-character alphanumeric verifier and its challenge.
	pub fn generate() -> Self {
		let verifier = random_string(VERIFIER_LEN);
		let challenge = compute_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// S256 challenge for `verifier`.
pub fn compute_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

/// Cache key under which the verifier for `state` waits for the exchange.
pub fn state_key(state: &str) -> String {
	format!("{STATE_KEY_PREFIX}:{state}")
}
