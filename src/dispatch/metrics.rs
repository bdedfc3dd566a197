// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for dispatcher activity.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	sends: AtomicU64,
	attempts: AtomicU64,
	retries: AtomicU64,
	auth_refreshes: AtomicU64,
	failures: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the number of `send` calls.
	pub fn sends(&self) -> u64 {
		self.sends.load(Ordering::Relaxed)
	}

	/// Returns the number of transport calls made against the API.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of retries scheduled by the retry policy.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes triggered by `401 Unauthorized`.
	pub fn auth_refreshes(&self) -> u64 {
		self.auth_refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of `send` calls that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_send(&self) {
		self.sends.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_auth_refresh(&self) {
		self.auth_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
