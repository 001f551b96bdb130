#![cfg(feature = "reqwest")]

// self
use oauth2_coordinator::{
	_preludet::*,
	auth::ProviderId,
	coordinator::TokenCoordinator,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	lock::{MemoryLock, RefreshLock},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	provider::ProviderProfile,
	store::{MemoryStore, TokenStateStore},
};

#[derive(Debug)]
struct FakeTransportError;
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Fake transport rejected the request.")
	}
}
impl StdError for FakeTransportError {}

/// Transport that never dials out; it publishes scripted response metadata and
/// fails the exchange so error classification can be observed end to end.
#[derive(Clone, Copy)]
struct FakeHttpClient {
	status: u16,
	retry_after: Option<Duration>,
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, status: self.status, retry_after: self.retry_after }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	status: u16,
	retry_after: Option<Duration>,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let status = self.status;
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(status), retry_after });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingMapper {
	seen: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingMapper {
	fn seen(&self) -> Vec<Option<ResponseMetadata>> {
		self.seen.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		error: HttpClientError<FakeTransportError>,
	) -> Error {
		self.seen.lock().push(meta.cloned());

		Error::RefreshFailed {
			status: meta.and_then(|value| value.status),
			body: format!("fake transport error: {error}"),
		}
	}
}

fn build_coordinator(
	status: u16,
	retry_after: Option<Duration>,
) -> (TokenCoordinator, Arc<MemoryStore>, RecordingMapper) {
	let provider = ProviderId::new("mock-transport")
		.expect("Provider identifier should be valid for transport tests.");
	let profile = ProviderProfile::builder(provider)
		.token_endpoint(
			Url::parse("https://mock.example.com/token")
				.expect("Mock token endpoint should parse successfully."),
		)
		.client_id("transport-client")
		.client_secret("transport-secret")
		.refresh_token("transport-refresh")
		.build()
		.expect("Provider profile should build successfully.");
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn TokenStateStore> = store_backend.clone();
	let lock: Arc<dyn RefreshLock> = Arc::new(MemoryLock::default());
	let mapper = RecordingMapper::default();
	let coordinator = TokenCoordinator::with_http_client(
		store,
		lock,
		profile,
		FakeHttpClient { status, retry_after },
		mapper.clone(),
	)
	.expect("Coordinator should build over the fake transport.");

	(coordinator, store_backend, mapper)
}

#[tokio::test]
async fn captured_429_outranks_the_transport_failure() {
	let (coordinator, store, mapper) = build_coordinator(429, Some(Duration::seconds(5)));
	let err = coordinator
		.get_shared_access_token()
		.await
		.expect_err("A throttled exchange should surface as a rate limit.");

	// The 5 s hint is below the 60 s cooldown floor, so the floor wins.
	assert_eq!(err.retry_after(), Some(Duration::seconds(60)));
	// Classification never reached the mapper: the captured 429 was decisive.
	assert!(mapper.seen().is_empty());

	let window = store
		.read_cooldown(&coordinator.provider)
		.await
		.expect("Reading the cooldown window should succeed.")
		.expect("The rate limit should persist a cooldown window.");

	assert!(window.backoff_until > OffsetDateTime::now_utc() + Duration::seconds(55));
}

#[tokio::test]
async fn transport_failures_reach_the_mapper_with_metadata() {
	let (coordinator, store, mapper) = build_coordinator(503, None);
	let err = coordinator
		.get_shared_access_token()
		.await
		.expect_err("A failing transport should surface to the caller.");

	match err {
		Error::RefreshFailed { status, body } => {
			assert_eq!(status, Some(503));
			assert!(body.contains("fake transport error"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let observed = mapper.seen();

	assert_eq!(observed.len(), 1, "Mapper must record a single exchange.");

	let meta = observed
		.first()
		.and_then(|value| value.clone())
		.expect("Response metadata should reach the mapper.");

	assert_eq!(meta.status, Some(503));
	assert_eq!(meta.retry_after, None);

	// Plain failures leave no cooldown behind.
	assert!(
		store
			.read_cooldown(&coordinator.provider)
			.await
			.expect("Reading the cooldown window should succeed.")
			.is_none()
	);
	assert_eq!(coordinator.metrics.refresh_failures(), 1);
}
