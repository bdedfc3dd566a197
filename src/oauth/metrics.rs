// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token-manager operations.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	exchanges: AtomicU64,
	refreshes: AtomicU64,
	revocations: AtomicU64,
	failures: AtomicU64,
}
impl TokenMetrics {
	/// Returns the number of successful authorization code exchanges.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh grants.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of revocations accepted by the provider.
	pub fn revocations(&self) -> u64 {
		self.revocations.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges, refreshes, and revocations.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revocation(&self) {
		self.revocations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
