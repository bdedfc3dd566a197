// std
use std::path::Path;
// self
use crate::{_prelude::*, auth::TokenIdentity, http::HttpMethod, obs::OperationKind};

/// A span builder used by crate operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("api_courier.operation", operation = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span until the returned guard drops.
	pub fn entered(self) -> OperationSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OperationSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OperationSpanGuard {}
		}
	}
}

/// RAII guard returned by [`OperationSpan::entered`].
pub struct OperationSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OperationSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OperationSpanGuard(..)")
	}
}

/// Emits a retry event before the dispatcher sleeps.
pub fn retry_scheduled(method: HttpMethod, attempt: u32, delay_micros: u64, cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::debug!(method = method.as_str(), attempt, delay_micros, %cause, "retrying request");
	#[cfg(not(feature = "tracing"))]
	let _ = (method, attempt, delay_micros, cause);
}

/// Emits an event when a 401 triggers a token refresh.
pub fn auth_refresh_triggered(method: HttpMethod, attempt: u32) {
	#[cfg(feature = "tracing")]
	tracing::info!(method = method.as_str(), attempt, "unauthorized response; refreshing token");
	#[cfg(not(feature = "tracing"))]
	let _ = (method, attempt);
}

/// Emits an event when an unreadable stored token is purged.
pub fn storage_purged(identity: &TokenIdentity, cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%identity, %cause, "purged unreadable stored token");
	#[cfg(not(feature = "tracing"))]
	let _ = (identity, cause);
}

/// Emits an event when an unreadable token file is moved aside.
pub fn storage_file_quarantined(path: &Path, target: &Path, cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		path = %path.display(),
		target = %target.display(),
		%cause,
		"moved unreadable token file aside"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (path, target, cause);
}

/// Emits an event when the revocation endpoint rejects or misses a call.
pub fn revoke_failed(cause: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%cause, "token revocation failed; local token cleared anyway");
	#[cfg(not(feature = "tracing"))]
	let _ = cause;
}
