//! Thread-safe in-memory [`TokenStateStore`] for single-process fleets and tests.

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, CooldownWindow, ProviderId, token::secret::TokenSecret},
	store::{self, StoreError, StoreFuture, TokenStateStore},
};

#[derive(Debug, Default)]
struct SharedState {
	tokens: HashMap<ProviderId, CachedToken>,
	cooldowns: HashMap<ProviderId, CooldownWindow>,
}

type StateCell = Arc<RwLock<SharedState>>;

/// Keeps shared state in-process; tasks sharing a clone coordinate, separate
/// processes do not. Pair it with [`FileStore`](super::FileStore) or a custom
/// backend when instances span hosts.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StateCell);
impl MemoryStore {
	fn write_token_now(
		state: StateCell,
		provider: ProviderId,
		access_token: TokenSecret,
		expires_at: OffsetDateTime,
	) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();

		store::validate_token_write(&access_token, expires_at, now)?;

		let record = CachedToken::new(provider.clone(), access_token, expires_at, now);

		state.write().tokens.insert(provider, record);

		Ok(())
	}

	fn invalidate_token_now(state: StateCell, provider: ProviderId) {
		let now = OffsetDateTime::now_utc();

		if let Some(record) = state.write().tokens.get_mut(&provider) {
			record.expires_at = now - store::INVALIDATE_BACKDATE;
			record.updated_at = now;
		}
	}

	fn write_cooldown_now(state: StateCell, provider: ProviderId, backoff_until: OffsetDateTime) {
		let now = OffsetDateTime::now_utc();
		let mut guard = state.write();
		let merged = store::merge_backoff(
			guard.cooldowns.get(&provider).map(|window| window.backoff_until),
			backoff_until,
		);

		guard.cooldowns.insert(provider.clone(), CooldownWindow::new(provider, merged, now));
	}
}
impl TokenStateStore for MemoryStore {
	fn read_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<CachedToken>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().tokens.get(provider).cloned()) })
	}

	fn write_token<'a>(
		&'a self,
		provider: &'a ProviderId,
		access_token: &'a TokenSecret,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let provider = provider.to_owned();
		let access_token = access_token.to_owned();

		Box::pin(async move { Self::write_token_now(state, provider, access_token, expires_at) })
	}

	fn invalidate_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let provider = provider.to_owned();

		Box::pin(async move {
			Self::invalidate_token_now(state, provider);

			Ok(())
		})
	}

	fn read_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, Option<CooldownWindow>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().cooldowns.get(provider).cloned()) })
	}

	fn write_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
		backoff_until: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let provider = provider.to_owned();

		Box::pin(async move {
			Self::write_cooldown_now(state, provider, backoff_until);

			Ok(())
		})
	}
}
