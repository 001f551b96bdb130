// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for coordinator outcomes, shared by every clone.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	cooldown_rejections: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
	rate_limits: AtomicU64,
	poll_timeouts: AtomicU64,
	stale_retries: AtomicU64,
}
impl CoordinatorMetrics {
	/// Returns the total number of acquisition attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions served from the shared cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions rejected by an active cooldown.
	pub fn cooldown_rejections(&self) -> u64 {
		self.cooldown_rejections.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges that produced a stored token.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges that failed outright.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh exchanges rejected by provider throttling.
	pub fn rate_limits(&self) -> u64 {
		self.rate_limits.load(Ordering::Relaxed)
	}

	/// Returns the number of waits that gave up before a token appeared.
	pub fn poll_timeouts(&self) -> u64 {
		self.poll_timeouts.load(Ordering::Relaxed)
	}

	/// Returns the number of stale-token invalidate-and-retry cycles.
	pub fn stale_retries(&self) -> u64 {
		self.stale_retries.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cooldown_rejection(&self) {
		self.cooldown_rejections.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rate_limit(&self) {
		self.rate_limits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_poll_timeout(&self) {
		self.poll_timeouts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_stale_retry(&self) {
		self.stale_retries.fetch_add(1, Ordering::Relaxed);
	}
}
