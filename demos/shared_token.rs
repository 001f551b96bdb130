//! Demonstrates sharing one refresh credential across coordinator clones with the default
//! reqwest transport and in-memory backends; concurrent acquisitions produce one upstream call.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_coordinator::{
	auth::ProviderId,
	coordinator::TokenCoordinator,
	http::ReqwestHttpClient,
	lock::{MemoryLock, RefreshLock},
	oauth::ReqwestTransportErrorMapper,
	provider::{ClientAuthMethod, ProviderProfile},
	reqwest::Client,
	store::{MemoryStore, TokenStateStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store: Arc<dyn TokenStateStore> = Arc::new(MemoryStore::default());
	let lock: Arc<dyn RefreshLock> = Arc::new(MemoryLock::default());
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let profile = ProviderProfile::builder(ProviderId::new("demo-provider")?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.client_id("demo-client")
		.client_secret("super-secret")
		.refresh_token("fleet-refresh-credential")
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let coordinator = TokenCoordinator::with_http_client(
		store,
		lock,
		profile,
		http_client,
		ReqwestTransportErrorMapper,
	)?;
	// Each clone behaves like one more stateless instance of the same service.
	let replica = coordinator.clone();
	let (first, second) =
		tokio::join!(coordinator.get_shared_access_token(), replica.get_shared_access_token());
	let first = first?;
	let second = second?;

	assert_eq!(first.expose(), second.expose());

	println!("Shared access token: {}.", first.expose());
	println!("Provider exchanges: {}.", coordinator.metrics.refresh_successes());

	token_mock.assert_async().await;

	Ok(())
}
