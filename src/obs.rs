//! Optional observability helpers for dispatcher and token-manager operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `api_courier.operation` with the `operation` and
//!   `stage` fields, plus events for retries, auth refreshes, storage self-healing, and failed
//!   revocations.
//! - Enable `metrics` to increment the `api_courier_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// [`RequestDispatcher::send`](crate::dispatch::RequestDispatcher::send).
	Send,
	/// Authorization URL construction with PKCE.
	AuthorizationUrl,
	/// Authorization code exchange.
	ExchangeCode,
	/// Refresh token grant.
	Refresh,
	/// Token revocation.
	Revoke,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Send => "send",
			OperationKind::AuthorizationUrl => "authorization_url",
			OperationKind::ExchangeCode => "exchange_code",
			OperationKind::Refresh => "refresh",
			OperationKind::Revoke => "revoke",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto `Success` or `Failure`.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `f` inside an operation span and records attempt plus final outcome.
pub(crate) fn observe<T, E, F>(kind: OperationKind, stage: &'static str, f: F) -> Result<T, E>
where
	F: FnOnce() -> Result<T, E>,
{
	let _guard = OperationSpan::new(kind, stage).entered();

	record_operation_outcome(kind, OperationOutcome::Attempt);

	let result = f();

	record_operation_outcome(kind, OperationOutcome::of(&result));

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(OperationKind::ExchangeCode.to_string(), "exchange_code");
		assert_eq!(OperationOutcome::of(&Ok::<_, ()>(1)), OperationOutcome::Success);
		assert_eq!(OperationOutcome::of(&Err::<(), _>(())).as_str(), "failure");
	}

	#[test]
	fn observe_passes_result_through() {
		let value = observe(OperationKind::Send, "test", || Ok::<_, ()>(42));

		assert_eq!(value, Ok(42));
	}
}
