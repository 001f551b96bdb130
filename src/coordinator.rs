//! Shared access-token coordination across stateless instances.

pub mod retry;

mod acquire;
mod metrics;

pub use metrics::CoordinatorMetrics;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	http::TokenHttpClient,
	lock::{LockKey, RefreshLock},
	oauth::{OAuthRefresher, TokenRefresher, TransportErrorMapper},
	provider::ProviderProfile,
	store::TokenStateStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Default safety margin subtracted from provider-reported token lifetimes.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::seconds(120);
/// Default cooldown floor applied after rate limits and poll exhaustion.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::seconds(60);
/// Default pause between store polls while another instance refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::milliseconds(500);
/// Default number of store polls before a waiting instance gives up.
pub const DEFAULT_MAX_POLLS: u32 = 30;

/// Timing knobs for the shared acquisition pipeline.
///
/// The setters sanitize their inputs: negative durations are clamped to zero
/// and a zero poll budget is raised to one, so a misconfigured tuning degrades
/// to eager behavior instead of panicking or spinning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorTuning {
	/// Safety margin subtracted once when a refreshed token's expiry is stored.
	pub expiry_skew: Duration,
	/// Minimum cooldown written after rate limits and poll exhaustion.
	pub refresh_cooldown: Duration,
	/// Pause between store polls while another instance holds the refresh lock.
	pub poll_interval: Duration,
	/// Number of store polls a waiting instance performs before giving up.
	pub max_polls: u32,
}
impl CoordinatorTuning {
	/// Sets the expiry safety margin.
	pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
		self.expiry_skew = skew.max(Duration::ZERO);

		self
	}

	/// Sets the cooldown floor written after rate limits and poll exhaustion.
	pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
		self.refresh_cooldown = cooldown.max(Duration::ZERO);

		self
	}

	/// Sets the pause between store polls.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval.max(Duration::ZERO);

		self
	}

	/// Sets the number of store polls before a waiting instance gives up.
	pub fn with_max_polls(mut self, polls: u32) -> Self {
		self.max_polls = polls.max(1);

		self
	}
}
impl Default for CoordinatorTuning {
	fn default() -> Self {
		Self {
			expiry_skew: DEFAULT_EXPIRY_SKEW,
			refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
			poll_interval: DEFAULT_POLL_INTERVAL,
			max_polls: DEFAULT_MAX_POLLS,
		}
	}
}

/// Coordinates shared access-token acquisition for one provider.
///
/// Every stateless instance constructs an identical coordinator over the same
/// store and lock backends. The store holds the single source of truth (cached
/// token plus cooldown window) while the lock elects exactly one refreshing
/// instance per expiry; everyone else reuses the cached row or polls until the
/// holder publishes a replacement. Cloning is cheap and clones share metrics.
#[derive(Clone)]
pub struct TokenCoordinator {
	/// Durable state store shared across every participating instance.
	pub store: Arc<dyn TokenStateStore>,
	/// Cross-instance lock that elects the single refreshing instance.
	pub lock: Arc<dyn RefreshLock>,
	/// Refresher invoked by the lock holder to mint a replacement token.
	pub refresher: Arc<dyn TokenRefresher>,
	/// Provider whose shared token this coordinator manages.
	pub provider: ProviderId,
	/// Shared counters for acquisition, refresh, and retry outcomes.
	pub metrics: Arc<CoordinatorMetrics>,
	lock_key: LockKey,
	tuning: CoordinatorTuning,
}
impl TokenCoordinator {
	/// Creates a coordinator around a caller-provided refresher.
	///
	/// The lock key is derived from the provider identifier, so coordinators
	/// built independently on different instances contend on the same key.
	pub fn with_refresher(
		store: Arc<dyn TokenStateStore>,
		lock: Arc<dyn RefreshLock>,
		provider: ProviderId,
		refresher: Arc<dyn TokenRefresher>,
	) -> Self {
		let lock_key = LockKey::for_provider(&provider);

		Self {
			store,
			lock,
			refresher,
			provider,
			metrics: Default::default(),
			lock_key,
			tuning: Default::default(),
		}
	}

	/// Creates a coordinator that refreshes through the given transport + mapper pair.
	pub fn with_http_client<C, M>(
		store: Arc<dyn TokenStateStore>,
		lock: Arc<dyn RefreshLock>,
		profile: ProviderProfile,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self>
	where
		C: TokenHttpClient,
		M: TransportErrorMapper<C::TransportError>,
	{
		let provider = profile.id.clone();
		let refresher = OAuthRefresher::from_profile(&profile, http_client, mapper)?;

		Ok(Self::with_refresher(store, lock, provider, Arc::new(refresher)))
	}

	/// Replaces the timing knobs used by the acquisition pipeline.
	pub fn with_tuning(mut self, tuning: CoordinatorTuning) -> Self {
		self.tuning = tuning;

		self
	}

	/// Overrides the derived cross-instance lock key.
	pub fn with_lock_key(mut self, key: LockKey) -> Self {
		self.lock_key = key;

		self
	}

	/// Returns the cross-instance lock key guarding refreshes for this provider.
	pub fn lock_key(&self) -> LockKey {
		self.lock_key
	}

	/// Returns the timing knobs currently in effect.
	pub fn tuning(&self) -> &CoordinatorTuning {
		&self.tuning
	}
}
#[cfg(feature = "reqwest")]
impl TokenCoordinator {
	/// Creates a coordinator with the crate's default reqwest transport stack.
	///
	/// The coordinator provisions its own reqwest-backed transport so callers do
	/// not need to pass HTTP handles explicitly; use
	/// [`TokenCoordinator::with_http_client`] to supply a custom transport.
	pub fn new(
		store: Arc<dyn TokenStateStore>,
		lock: Arc<dyn RefreshLock>,
		profile: ProviderProfile,
	) -> Result<Self> {
		Self::with_http_client(
			store,
			lock,
			profile,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl Debug for TokenCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCoordinator")
			.field("provider", &self.provider)
			.field("lock_key", &self.lock_key)
			.field("tuning", &self.tuning)
			.finish()
	}
}
