//! Cross-instance mutual exclusion for refresh attempts.

pub mod file;
pub mod memory;

pub use file::FileLock;
pub use memory::MemoryLock;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Boxed future type returned by [`RefreshLock`] operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LockError>> + 'a + Send>>;

/// Non-blocking mutual-exclusion contract shared by all instances.
///
/// `try_acquire` never waits: callers that lose the race poll shared state for
/// the winner's result instead of queueing on the lock. Implementations over
/// engines with native advisory locks (Postgres `pg_try_advisory_lock`, Redis
/// `SET NX`) take [`LockKey::value`] as their lock identifier.
pub trait RefreshLock
where
	Self: Send + Sync,
{
	/// Attempts to take `key` without blocking; `true` means this caller now
	/// holds it and must release it.
	fn try_acquire(&self, key: LockKey) -> LockFuture<'_, bool>;

	/// Releases `key`. Releasing an unheld key, or one held by another
	/// instance, is a no-op success.
	fn release(&self, key: LockKey) -> LockFuture<'_, ()>;
}

/// Advisory-lock key: one signed 64-bit value, optionally assembled from the
/// classic high/low 32-bit component pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey(i64);
impl LockKey {
	/// Wraps a raw 64-bit key.
	pub const fn new(key: i64) -> Self {
		Self(key)
	}

	/// Builds a key from two 32-bit components, high word first.
	pub const fn from_components(high: i32, low: i32) -> Self {
		Self(((high as i64) << 32) | (low as i64 & 0xFFFF_FFFF))
	}

	/// Derives a stable key from the provider identity.
	///
	/// Coordinators sharing a lock backend with unrelated advisory-lock users
	/// should reserve explicit keys instead of relying on the derived hash.
	pub fn for_provider(provider: &ProviderId) -> Self {
		let mut hasher = DefaultHasher::new();

		provider.hash(&mut hasher);

		let digest = hasher.finish();

		Self::from_components((digest >> 32) as i32, digest as i32)
	}

	/// Returns the raw key value.
	pub const fn value(self) -> i64 {
		self.0
	}
}
impl Debug for LockKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "LockKey(0x{:016X})", self.0)
	}
}
impl Display for LockKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "0x{:016X}", self.0)
	}
}

/// Error type produced by [`RefreshLock`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LockError {
	/// Backend-level failure for the lock engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
