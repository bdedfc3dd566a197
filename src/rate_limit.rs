//! Fixed-window client-side rate limiting over a shared [`Cache`].
//!
//! Two entries describe one window: the hit counter under `<key>` and the window end (unix
//! seconds) under `<key>:timer`. Both expire with the window, so a fresh window starts as soon as
//! the timer entry is gone. The gate takes no locks; concurrent callers rely on the atomicity of
//! [`Cache::add`] and [`Cache::increment`].

// self
use crate::{
	_prelude::*,
	cache::Cache,
	error::RateLimitError,
	store::StoreError,
};

/// Length of one rate-limit window.
pub const WINDOW: Duration = Duration::seconds(60);

/// Client-side gate limiting calls per window for a key.
#[derive(Clone)]
pub struct RateLimitGate {
	cache: Arc<dyn Cache>,
}
impl RateLimitGate {
	/// Creates a gate over the provided cache.
	pub fn new(cache: Arc<dyn Cache>) -> Self {
		Self { cache }
	}

	/// Returns `true` once `max_per_window` hits were recorded in the open window.
	///
	/// A counter that outlived its timer is stale and gets reset.
	pub fn is_exceeded(&self, key: &str, max_per_window: u64) -> Result<bool, StoreError> {
		if self.attempts(key)? < max_per_window {
			return Ok(false);
		}
		if self.cache.get(&timer_key(key))?.is_some() {
			return Ok(true);
		}

		self.cache.forget(key)?;

		Ok(false)
	}

	/// Records one hit, opening a window if none is open; returns the new count.
	pub fn hit(&self, key: &str) -> Result<u64, StoreError> {
		let window_end = OffsetDateTime::now_utc() + WINDOW;

		self.cache.add(&timer_key(key), window_end.unix_timestamp().to_string(), WINDOW)?;
		self.cache.increment(key, WINDOW)
	}

	/// Seconds until the open window closes; at least 1 while a window is open, else 0.
	pub fn available_in(&self, key: &str) -> Result<u64, StoreError> {
		let Some(raw) = self.cache.get(&timer_key(key))? else {
			return Ok(0);
		};
		let window_end = raw.parse::<i64>().map_err(|e| StoreError::Serialization {
			message: format!("Rate-limit timer for {key} is not a timestamp: {e}"),
		})?;
		let left = window_end - OffsetDateTime::now_utc().unix_timestamp();

		Ok(left.max(1) as u64)
	}

	/// Hits still allowed in the open window.
	pub fn remaining(&self, key: &str, max_per_window: u64) -> Result<u64, StoreError> {
		Ok(max_per_window.saturating_sub(self.attempts(key)?))
	}

	/// Drops the counter and the timer for `key`.
	pub fn clear(&self, key: &str) -> Result<(), StoreError> {
		self.cache.forget(key)?;
		self.cache.forget(&timer_key(key))?;

		Ok(())
	}

	/// Fails with [`RateLimitError`] when the window for `key` is exhausted.
	pub fn ensure_available(&self, key: &str, max_per_window: u64) -> Result<()> {
		if !self.is_exceeded(key, max_per_window)? {
			return Ok(());
		}

		let retry_after_seconds = self.available_in(key)?;

		Err(RateLimitError { key: key.to_owned(), retry_after_seconds }.into())
	}

	fn attempts(&self, key: &str) -> Result<u64, StoreError> {
		Ok(self.cache.get(key)?.and_then(|raw| raw.parse::<u64>().ok()).unwrap_or(0))
	}
}
impl Debug for RateLimitGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RateLimitGate(..)")
	}
}

fn timer_key(key: &str) -> String {
	format!("{key}:timer")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::cache::MemoryCache;

	fn gate() -> (RateLimitGate, MemoryCache) {
		let cache = MemoryCache::default();

		(RateLimitGate::new(Arc::new(cache.clone())), cache)
	}

	#[test]
	fn ceiling_allows_exactly_max_hits() {
		let (gate, _) = gate();

		for expected in 1..=5 {
			assert!(!gate.is_exceeded("api", 5).expect("Check should succeed."));
			assert_eq!(gate.hit("api").expect("Hit should succeed."), expected);
		}

		assert!(gate.is_exceeded("api", 5).expect("Check should succeed."));
		assert_eq!(gate.remaining("api", 5).expect("Remaining should succeed."), 0);

		let available_in = gate.available_in("api").expect("Lookup should succeed.");

		assert!((1..=60).contains(&available_in));

		let err = gate.ensure_available("api", 5).expect_err("Exhausted gate should reject.");

		assert!(matches!(
			err,
			Error::RateLimited(RateLimitError { ref key, retry_after_seconds })
				if key == "api" && retry_after_seconds > 0
		));
	}

	#[test]
	fn keys_are_independent_and_clear_resets() {
		let (gate, _) = gate();

		gate.hit("a").expect("Hit should succeed.");
		gate.hit("a").expect("Hit should succeed.");

		assert!(gate.is_exceeded("a", 2).expect("Check should succeed."));
		assert!(!gate.is_exceeded("b", 2).expect("Check should succeed."));
		assert_eq!(gate.available_in("b").expect("Lookup should succeed."), 0);

		gate.clear("a").expect("Clear should succeed.");

		assert_eq!(gate.remaining("a", 2).expect("Remaining should succeed."), 2);
		assert!(gate.ensure_available("a", 2).is_ok());
	}

	#[test]
	fn stale_counter_without_timer_is_reset() {
		let (gate, cache) = gate();

		cache.put("api", "9".into(), WINDOW).expect("Put should succeed.");

		assert!(!gate.is_exceeded("api", 3).expect("Check should succeed."));
		assert_eq!(cache.get("api").expect("Get should succeed."), None);
	}
}
