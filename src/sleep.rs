//! Blocking pause used between retry attempts.

// self
use crate::_prelude::*;

/// Suspends the calling thread for a number of microseconds.
pub trait Sleeper
where
	Self: Send + Sync,
{
	/// Blocks for `micros` microseconds; zero returns immediately.
	fn sleep_micros(&self, micros: u64);
}

/// Real sleeper backed by [`std::thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;
impl Sleeper for ThreadSleeper {
	fn sleep_micros(&self, micros: u64) {
		if micros > 0 {
			std::thread::sleep(StdDuration::from_micros(micros));
		}
	}
}

/// Sleeper that never blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSleeper;
impl Sleeper for NoopSleeper {
	fn sleep_micros(&self, _: u64) {}
}

/// Sleeper that records every requested delay without blocking.
///
/// Clones share the same log, so a test can keep one handle and give the other to a dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper(Arc<Mutex<Vec<u64>>>);
impl RecordingSleeper {
	/// Delays requested so far, in call order.
	pub fn delays(&self) -> Vec<u64> {
		self.0.lock().clone()
	}
}
impl Sleeper for RecordingSleeper {
	fn sleep_micros(&self, micros: u64) {
		self.0.lock().push(micros);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_sleeper_shares_log_between_clones() {
		let sleeper = RecordingSleeper::default();
		let handle: Arc<dyn Sleeper> = Arc::new(sleeper.clone());

		handle.sleep_micros(200_000);
		handle.sleep_micros(400_000);

		assert_eq!(sleeper.delays(), vec![200_000, 400_000]);
	}

	#[test]
	fn zero_delay_returns_immediately() {
		let started = std::time::Instant::now();

		ThreadSleeper.sleep_micros(0);
		NoopSleeper.sleep_micros(5_000_000);

		assert!(started.elapsed() < StdDuration::from_secs(1));
	}
}
