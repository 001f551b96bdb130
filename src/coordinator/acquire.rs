//! The shared acquisition path: cooldown gate, cache fast path, lock election,
//! and the polling fallback for instances that lost the election.

// crates.io
use tokio::{runtime::Handle, time::sleep};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	coordinator::TokenCoordinator,
	lock::{LockError, LockKey, RefreshLock},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenCoordinator {
	/// Returns a shared access token, refreshing through the provider when needed.
	///
	/// The pipeline short-circuits on an active cooldown window, then serves the
	/// cached token while it is fresh. On a miss, the instance that wins the
	/// cross-instance lock performs the single refresh while every other
	/// instance polls the store for the published result.
	pub async fn get_shared_access_token(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Acquire;

		let span = FlowSpan::new(KIND, "get_shared_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.acquire_shared_token()).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(Error::RateLimited { .. }) =>
				obs::record_flow_outcome(KIND, FlowOutcome::RateLimited),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn acquire_shared_token(&self) -> Result<TokenSecret> {
		self.metrics.record_attempt();

		let now = OffsetDateTime::now_utc();

		if let Some(remaining) = self.active_cooldown(now).await? {
			self.metrics.record_cooldown_rejection();

			return Err(Error::RateLimited { retry_after: remaining });
		}
		if let Some(token) = self.fresh_cached_token(now).await? {
			self.metrics.record_cache_hit();

			return Ok(token);
		}
		if self.lock.try_acquire(self.lock_key).await? {
			// The guard hands the key back even when the caller abandons this
			// future mid-refresh.
			let held = HeldKey { lock: self.lock.clone(), key: self.lock_key, released: false };
			let outcome = self.refresh_holding_lock().await;

			// Best effort; a failed release leaves the key to the backend lease TTL.
			let _ = held.release().await;

			return outcome;
		}

		self.wait_for_holder().await
	}

	async fn active_cooldown(&self, now: OffsetDateTime) -> Result<Option<Duration>> {
		let window = self.store.read_cooldown(&self.provider).await?;

		Ok(window.filter(|window| window.is_active_at(now)).map(|window| window.remaining_at(now)))
	}

	async fn fresh_cached_token(&self, now: OffsetDateTime) -> Result<Option<TokenSecret>> {
		let record = self.store.read_token(&self.provider).await?;

		Ok(record.filter(|record| record.is_fresh_at(now)).map(|record| record.access_token))
	}

	/// Performs the single refresh while holding the lock and publishes its outcome.
	async fn refresh_holding_lock(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		match self.refresher.refresh().await {
			Ok(fresh) => {
				let now = OffsetDateTime::now_utc();
				// A lifetime at or under the skew is stored as-is; shaving it
				// would push the expiry into the past.
				let margin = if fresh.expires_in > self.tuning.expiry_skew {
					self.tuning.expiry_skew
				} else {
					Duration::ZERO
				};

				self.store
					.write_token(&self.provider, &fresh.access_token, now + fresh.expires_in - margin)
					.await
					.map_err(|err| {
						self.metrics.record_refresh_failure();
						obs::record_flow_outcome(KIND, FlowOutcome::Failure);

						Error::from(err)
					})?;
				self.metrics.record_refresh_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(fresh.access_token)
			},
			Err(Error::RateLimited { retry_after }) => {
				let window = self.tuning.refresh_cooldown.max(retry_after);

				self.metrics.record_rate_limit();
				obs::record_flow_outcome(KIND, FlowOutcome::RateLimited);
				self.store
					.write_cooldown(&self.provider, OffsetDateTime::now_utc() + window)
					.await?;

				Err(Error::RateLimited { retry_after: window })
			},
			Err(err) => {
				self.metrics.record_refresh_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(err)
			},
		}
	}

	/// Polls the store while another instance finishes the refresh.
	async fn wait_for_holder(&self) -> Result<TokenSecret> {
		for _ in 0..self.tuning.max_polls {
			sleep(self.tuning.poll_interval.unsigned_abs()).await;

			let now = OffsetDateTime::now_utc();

			if let Some(remaining) = self.active_cooldown(now).await? {
				self.metrics.record_cooldown_rejection();

				return Err(Error::RateLimited { retry_after: remaining });
			}
			if let Some(token) = self.fresh_cached_token(now).await? {
				self.metrics.record_cache_hit();

				return Ok(token);
			}
		}

		// Exhaustion counts as provider pressure even though the holder may
		// still succeed after we stop watching.
		self.metrics.record_poll_timeout();
		self.store
			.write_cooldown(&self.provider, OffsetDateTime::now_utc() + self.tuning.refresh_cooldown)
			.await?;

		Err(Error::RateLimited { retry_after: self.tuning.refresh_cooldown })
	}
}

/// An acquired lock key that must not outlive its acquisition path.
///
/// The owning future can be dropped at any await point (callers are free to
/// wrap the whole call in a timeout), so the guard spawns a best-effort
/// release when it is dropped before [`HeldKey::release`] ran.
struct HeldKey {
	lock: Arc<dyn RefreshLock>,
	key: LockKey,
	released: bool,
}
impl HeldKey {
	async fn release(mut self) -> Result<(), LockError> {
		let outcome = self.lock.release(self.key).await;

		self.released = true;

		outcome
	}
}
impl Drop for HeldKey {
	fn drop(&mut self) {
		if self.released {
			return;
		}

		// Without a runtime the async release cannot run; the backend lease
		// TTL reclaims the key instead.
		let Ok(handle) = Handle::try_current() else {
			return;
		};
		let lock = self.lock.clone();
		let key = self.key;

		handle.spawn(async move {
			let _ = lock.release(key).await;
		});
	}
}
