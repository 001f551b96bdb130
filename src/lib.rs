//! Rust's turnkey OAuth 2.0 access-token coordinator - share one refresh token across any number
//! of stateless instances with durable caching, cross-instance locking, and cooldown-aware retries
//! in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod lock;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		coordinator::TokenCoordinator,
		http::ReqwestHttpClient,
		lock::{MemoryLock, RefreshLock},
		oauth::ReqwestTransportErrorMapper,
		provider::ProviderProfile,
		store::{MemoryStore, TokenStateStore},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`TokenCoordinator`] backed by in-memory store and lock backends plus the
	/// reqwest transport used across integration tests. The backends are returned alongside the
	/// coordinator so tests can seed and inspect shared state directly.
	pub fn build_reqwest_test_coordinator(
		profile: ProviderProfile,
	) -> (TokenCoordinator, Arc<MemoryStore>, Arc<MemoryLock>) {
		let store_backend = Arc::new(MemoryStore::default());
		let lock_backend = Arc::new(MemoryLock::default());
		let store: Arc<dyn TokenStateStore> = store_backend.clone();
		let lock: Arc<dyn RefreshLock> = lock_backend.clone();
		let coordinator = TokenCoordinator::with_http_client(
			store,
			lock,
			profile,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Failed to build test coordinator.");

		(coordinator, store_backend, lock_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
// The self dev-dependency exists so test targets see the `test` feature.
#[cfg(test)] use oauth2_coordinator as _;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
