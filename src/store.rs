//! Storage contracts and built-in backends for instance-shared token state.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, CooldownWindow, ProviderId, TokenSecret},
};

/// Boxed future type returned by [`TokenStateStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// How far into the past [`TokenStateStore::invalidate_token`] moves a stored expiry.
pub const INVALIDATE_BACKDATE: Duration = Duration::days(1);

/// Durable state contract shared by every coordinator instance.
///
/// Implementations back two tiny tables keyed by [`ProviderId`]: cached tokens
/// and cooldown windows. Two rules are part of the contract rather than any one
/// backend: token writes are validated through [`validate_token_write`], and
/// cooldown writes merge through [`merge_backoff`] so a stored window never
/// moves backward even when writers race.
pub trait TokenStateStore
where
	Self: Send + Sync,
{
	/// Fetches the stored token row for the provider, if any.
	///
	/// Rows are returned as stored; deciding whether a row is still fresh is
	/// the caller's job.
	fn read_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<CachedToken>>;

	/// Persists or replaces the provider's token row as one atomic upsert.
	fn write_token<'a>(
		&'a self,
		provider: &'a ProviderId,
		access_token: &'a TokenSecret,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'a, ()>;

	/// Back-dates the stored expiry so every instance treats the row as expired.
	///
	/// Invalidating a provider without a stored row is a no-op success.
	fn invalidate_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, ()>;

	/// Fetches the cooldown window for the provider, if any.
	fn read_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, Option<CooldownWindow>>;

	/// Persists a cooldown window, keeping the later of the stored and requested instants.
	fn write_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
		backoff_until: OffsetDateTime,
	) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStateStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A write was rejected by validation before touching the backend.
	#[error("Invalid write: {reason}.")]
	InvalidArgument {
		/// What was rejected.
		reason: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Validates a token write before it reaches any backend.
///
/// Empty tokens and non-future expiries are configuration or clock bugs;
/// persisting them would poison every instance sharing the store.
pub fn validate_token_write(
	access_token: &TokenSecret,
	expires_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<(), StoreError> {
	if access_token.is_empty() {
		return Err(StoreError::InvalidArgument { reason: "access token is empty".into() });
	}
	if expires_at <= now {
		return Err(StoreError::InvalidArgument {
			reason: format!("expiry {expires_at} is not in the future"),
		});
	}

	Ok(())
}

/// Merge rule for cooldown writes: the stored instant never moves backward.
pub fn merge_backoff(
	existing: Option<OffsetDateTime>,
	requested: OffsetDateTime,
) -> OffsetDateTime {
	existing.map_or(requested, |current| current.max(requested))
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let crate_error: Error = store_error.clone().into();

		assert!(matches!(crate_error, Error::Storage(_)));
		assert!(crate_error.to_string().contains("database unreachable"));

		let source = StdError::source(&crate_error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn token_writes_are_validated() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		assert!(
			validate_token_write(&TokenSecret::new(""), now + Duration::hours(1), now).is_err()
		);
		assert!(validate_token_write(&TokenSecret::new("token"), now, now).is_err());
		assert!(
			validate_token_write(&TokenSecret::new("token"), now - Duration::seconds(1), now)
				.is_err()
		);
		assert!(
			validate_token_write(&TokenSecret::new("token"), now + Duration::seconds(1), now)
				.is_ok()
		);
	}

	#[test]
	fn backoff_merge_is_monotone() {
		let earlier = macros::datetime!(2025-01-01 00:01 UTC);
		let later = macros::datetime!(2025-01-01 00:02 UTC);

		assert_eq!(merge_backoff(None, earlier), earlier);
		assert_eq!(merge_backoff(Some(earlier), later), later);
		assert_eq!(merge_backoff(Some(later), earlier), later);
	}
}
