//! Shared cooldown windows that pause refresh attempts fleet-wide.

// self
use crate::{_prelude::*, auth::id::ProviderId};

/// A provider-wide pause on refresh attempts, shared through the store.
///
/// While `backoff_until` lies in the future every coordinator fails fast with
/// a rate-limit error instead of contacting the provider. Stored windows only
/// ever move forward; see the store contract for the merge rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownWindow {
	/// Provider credential this window throttles.
	pub provider: ProviderId,
	/// Instant at which refresh attempts may resume.
	pub backoff_until: OffsetDateTime,
	/// Instant of the last write that produced this row.
	pub updated_at: OffsetDateTime,
}
impl CooldownWindow {
	/// Assembles a window; backends stamp `updated_at` with their write clock.
	pub fn new(
		provider: ProviderId,
		backoff_until: OffsetDateTime,
		updated_at: OffsetDateTime,
	) -> Self {
		Self { provider, backoff_until, updated_at }
	}

	/// Returns `true` if the window still blocks refreshes at the provided instant.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.backoff_until
	}

	/// Convenience helper that checks the window against the current UTC instant.
	pub fn is_active(&self) -> bool {
		self.is_active_at(OffsetDateTime::now_utc())
	}

	/// Remaining wait at the provided instant, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.backoff_until - instant).max(Duration::ZERO)
	}
}
