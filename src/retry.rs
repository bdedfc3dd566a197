//! Retry classification for failed attempts.
//!
//! A [`RetryPolicy`] sees one failed attempt at a time and answers with a [`RetryDecision`].
//! It never sleeps itself; the dispatcher owns the loop and the [`Sleeper`](crate::sleep::Sleeper).

// self
use crate::{
	error::{ApiError, ConfigError, TransportError},
	http::HttpMethod,
};

/// Default number of attempts, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default first backoff delay in microseconds.
pub const DEFAULT_BASE_DELAY_MICROS: u64 = 200_000;
/// Default backoff ceiling in microseconds.
pub const DEFAULT_MAX_DELAY_MICROS: u64 = 5_000_000;

const RETRYABLE_SERVER_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Outcome of a [`RetryPolicy`] consultation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RetryDecision {
	/// Whether another attempt should be made.
	pub should_retry: bool,
	/// Pause before the next attempt, in microseconds.
	pub delay_micros: u64,
}
impl RetryDecision {
	/// Do not retry.
	pub const fn no() -> Self {
		Self { should_retry: false, delay_micros: 0 }
	}

	/// Retry after `delay_micros`; negative delays clamp to zero.
	pub const fn yes(delay_micros: i64) -> Self {
		let delay_micros = if delay_micros < 0 { 0 } else { delay_micros as u64 };

		Self { should_retry: true, delay_micros }
	}
}

/// Decides whether a failed attempt is retried and how long to wait first.
pub trait RetryPolicy
where
	Self: Send + Sync,
{
	/// Classifies attempt number `attempt` (1-based).
	///
	/// Exactly one of `api_error` and `transport_error` is normally set.
	fn decide(
		&self,
		method: HttpMethod,
		attempt: u32,
		api_error: Option<&ApiError>,
		transport_error: Option<&TransportError>,
	) -> RetryDecision;
}

/// Idempotency-aware exponential backoff.
///
/// - Transport failures and 500/502/503/504 retry only idempotent methods.
/// - 429 retries every method and honours `Retry-After` when it is positive.
/// - Nothing retries once `attempt` reaches `max_attempts`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentialBackoffRetryPolicy {
	max_attempts: u32,
	base_delay_micros: u64,
	max_delay_micros: u64,
}
impl ExponentialBackoffRetryPolicy {
	/// Creates a policy; `max_attempts` must be at least 1 and `base <= max`.
	pub fn new(
		max_attempts: u32,
		base_delay_micros: u64,
		max_delay_micros: u64,
	) -> Result<Self, ConfigError> {
		if max_attempts == 0 {
			return Err(ConfigError::InvalidRetry { reason: "max_attempts must be at least 1" });
		}
		if base_delay_micros > max_delay_micros {
			return Err(ConfigError::InvalidRetry {
				reason: "base delay must not exceed the maximum delay",
			});
		}

		Ok(Self { max_attempts, base_delay_micros, max_delay_micros })
	}

	/// Maximum number of attempts, counting the first one.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// `min(base * 2^(attempt - 1), max)` with saturating arithmetic.
	pub fn backoff(&self, attempt: u32) -> u64 {
		let exponent = attempt.saturating_sub(1);
		let factor = 1_u64.checked_shl(exponent).unwrap_or(u64::MAX);

		self.base_delay_micros.saturating_mul(factor).min(self.max_delay_micros)
	}

	fn backoff_decision(&self, attempt: u32) -> RetryDecision {
		RetryDecision::yes(i64::try_from(self.backoff(attempt)).unwrap_or(i64::MAX))
	}
}
impl Default for ExponentialBackoffRetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			base_delay_micros: DEFAULT_BASE_DELAY_MICROS,
			max_delay_micros: DEFAULT_MAX_DELAY_MICROS,
		}
	}
}
impl RetryPolicy for ExponentialBackoffRetryPolicy {
	fn decide(
		&self,
		method: HttpMethod,
		attempt: u32,
		api_error: Option<&ApiError>,
		transport_error: Option<&TransportError>,
	) -> RetryDecision {
		if attempt >= self.max_attempts {
			return RetryDecision::no();
		}
		if transport_error.is_some() {
			return if method.is_idempotent() {
				self.backoff_decision(attempt)
			} else {
				RetryDecision::no()
			};
		}

		let Some(api_error) = api_error else {
			return RetryDecision::no();
		};

		if api_error.is_too_many_requests() {
			return match api_error.retry_after.filter(|secs| *secs > 0) {
				Some(secs) => RetryDecision::yes(
					i64::try_from(secs.saturating_mul(1_000_000)).unwrap_or(i64::MAX),
				),
				None => self.backoff_decision(attempt),
			};
		}
		if RETRYABLE_SERVER_STATUSES.contains(&api_error.status) && method.is_idempotent() {
			return self.backoff_decision(attempt);
		}

		RetryDecision::no()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;

	fn policy() -> ExponentialBackoffRetryPolicy {
		ExponentialBackoffRetryPolicy::new(3, 200_000, 5_000_000)
			.expect("Policy fixture should be valid.")
	}

	fn network_error() -> TransportError {
		TransportError::network(
			"https://api.example.com/v1/contacts",
			io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
		)
	}

	#[test]
	fn decision_constructors_clamp_negative_delays() {
		assert_eq!(RetryDecision::no(), RetryDecision { should_retry: false, delay_micros: 0 });
		assert_eq!(RetryDecision::yes(-5), RetryDecision { should_retry: true, delay_micros: 0 });
		assert_eq!(RetryDecision::yes(7).delay_micros, 7);
	}

	#[test]
	fn transport_failures_retry_only_idempotent_methods() {
		let err = network_error();

		assert_eq!(
			policy().decide(HttpMethod::Get, 2, None, Some(&err)),
			RetryDecision { should_retry: true, delay_micros: 400_000 }
		);
		assert_eq!(policy().decide(HttpMethod::Post, 1, None, Some(&err)), RetryDecision::no());
	}

	#[test]
	fn server_errors_respect_idempotency() {
		let unavailable = ApiError::new(503, "");

		assert_eq!(
			policy().decide(HttpMethod::Post, 1, Some(&unavailable), None),
			RetryDecision { should_retry: false, delay_micros: 0 }
		);
		assert_eq!(
			policy().decide(HttpMethod::Delete, 1, Some(&unavailable), None),
			RetryDecision { should_retry: true, delay_micros: 200_000 }
		);
		assert_eq!(
			policy().decide(HttpMethod::Get, 1, Some(&ApiError::new(501, "")), None),
			RetryDecision::no()
		);
	}

	#[test]
	fn too_many_requests_always_retries() {
		let hinted = ApiError::new(429, "").with_retry_after(10);
		let zero = ApiError::new(429, "").with_retry_after(0);
		let bare = ApiError::new(429, "");

		assert_eq!(
			policy().decide(HttpMethod::Post, 1, Some(&hinted), None),
			RetryDecision { should_retry: true, delay_micros: 10_000_000 }
		);
		assert_eq!(
			policy().decide(HttpMethod::Post, 2, Some(&zero), None),
			RetryDecision { should_retry: true, delay_micros: 400_000 }
		);
		assert_eq!(
			policy().decide(HttpMethod::Put, 1, Some(&bare), None),
			RetryDecision { should_retry: true, delay_micros: 200_000 }
		);
	}

	#[test]
	fn exhausted_attempts_never_retry() {
		let hinted = ApiError::new(429, "").with_retry_after(10);

		assert_eq!(policy().decide(HttpMethod::Get, 3, Some(&hinted), None), RetryDecision::no());
		assert_eq!(
			policy().decide(HttpMethod::Get, 3, None, Some(&network_error())),
			RetryDecision::no()
		);
	}

	#[test]
	fn client_errors_are_final() {
		for status in [400, 401, 403, 404, 422] {
			let err = ApiError::new(status, "");

			assert_eq!(policy().decide(HttpMethod::Get, 1, Some(&err), None), RetryDecision::no());
		}
	}

	#[test]
	fn backoff_doubles_and_saturates_at_ceiling() {
		let policy = policy();

		assert_eq!(policy.backoff(1), 200_000);
		assert_eq!(policy.backoff(2), 400_000);
		assert_eq!(policy.backoff(5), 3_200_000);
		assert_eq!(policy.backoff(6), 5_000_000);
		assert_eq!(policy.backoff(200), 5_000_000);
	}

	#[test]
	fn invalid_settings_are_rejected() {
		assert!(ExponentialBackoffRetryPolicy::new(0, 1, 2).is_err());
		assert!(ExponentialBackoffRetryPolicy::new(3, 10, 2).is_err());
		assert_eq!(ExponentialBackoffRetryPolicy::default(), policy());
	}
}
