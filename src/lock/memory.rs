//! In-process [`RefreshLock`] for single-process fleets and tests.

// self
use crate::{
	_prelude::*,
	lock::{LockFuture, LockKey, RefreshLock},
};

/// Tracks held keys in-process; tasks sharing a clone exclude each other,
/// separate processes do not. Held keys lapse after a lease TTL, so a holder
/// that never released (an abandoned call, a panicked task) cannot wedge a key
/// forever. Pair it with [`FileLock`](super::FileLock) or a custom backend
/// when instances span hosts.
#[derive(Clone, Debug)]
pub struct MemoryLock {
	held: Arc<Mutex<HashMap<LockKey, OffsetDateTime>>>,
	lease_ttl: Duration,
}
impl MemoryLock {
	/// Default lease lifetime, aligned with
	/// [`FileLock::DEFAULT_LEASE_TTL`](super::FileLock::DEFAULT_LEASE_TTL).
	pub const DEFAULT_LEASE_TTL: Duration = Duration::seconds(30);

	/// Overrides the lease lifetime (negative values clamp to zero).
	pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
		self.lease_ttl = ttl.max(Duration::ZERO);

		self
	}

	fn try_acquire_now(&self, key: LockKey) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut held = self.held.lock();

		if held.get(&key).is_some_and(|expires_at| *expires_at > now) {
			return false;
		}

		held.insert(key, now + self.lease_ttl);

		true
	}

	fn release_now(&self, key: LockKey) {
		self.held.lock().remove(&key);
	}
}
impl Default for MemoryLock {
	fn default() -> Self {
		Self { held: Default::default(), lease_ttl: Self::DEFAULT_LEASE_TTL }
	}
}
impl RefreshLock for MemoryLock {
	fn try_acquire(&self, key: LockKey) -> LockFuture<'_, bool> {
		Box::pin(async move { Ok(self.try_acquire_now(key)) })
	}

	fn release(&self, key: LockKey) -> LockFuture<'_, ()> {
		Box::pin(async move {
			self.release_now(key);

			Ok(())
		})
	}
}
