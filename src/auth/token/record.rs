//! Cached access-token rows and their freshness helpers.

// self
use crate::{
	_prelude::*,
	auth::{id::ProviderId, token::secret::TokenSecret},
};

/// One provider's cached access token as stored in the shared backend.
///
/// The stored `expires_at` already carries the coordinator's safety margin, so
/// freshness is a plain clock comparison. Readers never re-apply a margin; a
/// row is either fresh or it is not.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Provider credential this row belongs to.
	pub provider: ProviderId,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant after which no instance may serve this row.
	pub expires_at: OffsetDateTime,
	/// Instant of the last write that produced this row.
	pub updated_at: OffsetDateTime,
}
impl CachedToken {
	/// Assembles a row; backends stamp `updated_at` with their write clock.
	pub fn new(
		provider: ProviderId,
		access_token: TokenSecret,
		expires_at: OffsetDateTime,
		updated_at: OffsetDateTime,
	) -> Self {
		Self { provider, access_token, expires_at, updated_at }
	}

	/// Returns `true` if the row may be served at the provided instant.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}

	/// Convenience helper that checks freshness against the current UTC instant.
	pub fn is_fresh(&self) -> bool {
		self.is_fresh_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the row has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		!self.is_fresh_at(instant)
	}

	/// Returns `true` if the row is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		!self.is_fresh()
	}

	/// Remaining service life at the provided instant, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}
