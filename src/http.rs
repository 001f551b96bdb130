//! Transport seam between the refresh exchange and whatever HTTP stack runs it.
//!
//! `oauth2` reports transport failures as opaque errors, which is not enough to
//! tell "the provider throttled us" apart from "the network broke". The types
//! here close that gap: every [`TokenHttpClient`] handle carries a
//! [`ResponseMetadataSlot`], records the last status code and `Retry-After`
//! hint into it, and the refresh layer reads the slot back when classifying a
//! failed exchange. [`ReqwestHttpClient`] is the bundled implementation behind
//! the `reqwest` feature.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// HTTP transport capable of running refresh exchanges while publishing
/// response metadata for error classification.
///
/// This is the crate's only seam onto an HTTP stack. The refresh layer asks the
/// transport for a short-lived [`AsyncHttpClient`] handle per exchange, each
/// bound to one [`ResponseMetadataSlot`]. `Send + Sync + 'static` lets a single
/// transport serve every clone of a coordinator, and the `Send` bound on the
/// handle's future keeps the boxed refresh futures `Send` in turn.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error the underlying transport produces on connection or protocol
	/// failures.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-exchange [`AsyncHttpClient`] handle bound to a metadata slot.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that reports each response's status and retry hint
	/// through `slot`.
	///
	/// Handles must clear the slot (via [`ResponseMetadataSlot::take`]) before
	/// dispatching so a failed exchange can never be classified against a
	/// previous attempt's metadata, and must store fresh metadata as soon as a
	/// status line is available, whether or not the exchange succeeds.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// What the transport learned from the most recent response.
///
/// More fields may appear over time; construct values by naming fields rather
/// than with struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// Status code of the token-endpoint response, when one arrived.
	pub status: Option<u16>,
	/// `Retry-After` hint, already converted to a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Whether the captured status is the provider's throttle signal (429).
	pub fn signals_throttle(&self) -> bool {
		self.status == Some(429)
	}
}

/// Shared cell that carries [`ResponseMetadata`] from the transport back to the
/// error-mapping layer.
///
/// One slot exists per exchange. The transport holds a clone only for the
/// duration of the request; the refresh layer reads the captured value right
/// after `oauth2` resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot {
	cell: Arc<Mutex<Option<ResponseMetadata>>>,
}
impl ResponseMetadataSlot {
	/// Publishes metadata for the in-flight request, replacing any prior value.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.cell.lock() = Some(meta);
	}

	/// Consumes the captured metadata.
	///
	/// Transports call this before dispatching; stale values must never
	/// survive into the next attempt's classification.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.cell.lock().take()
	}
}

/// The bundled reqwest transport.
///
/// Token endpoints answer directly rather than redirecting, so a client
/// handed in through [`with_client`](Self::with_client) should have redirect
/// following disabled; the refresh layer passes it to `oauth2` unchanged.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
	inner: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Adopts a preconfigured [`ReqwestClient`].
	pub fn with_client(inner: ReqwestClient) -> Self {
		Self { inner }
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.inner
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.inner
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle { client: self.inner.clone(), slot }
	}
}

#[cfg(feature = "reqwest")]
/// Per-exchange handle produced by [`ReqwestHttpClient`]; records status and
/// retry hints into its slot on every call.
#[derive(Clone)]
pub struct InstrumentedHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let Self { client, slot } = self.clone();

		Box::pin(async move {
			slot.take();

			let outbound = request.try_into().map_err(Box::new)?;
			let inbound = client.execute(outbound).await.map_err(Box::new)?;
			let status = inbound.status();
			let headers = inbound.headers().to_owned();

			slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers),
			});

			let body = inbound.bytes().await.map_err(Box::new)?.to_vec();
			let mut rebuilt = HttpResponse::new(body);

			*rebuilt.status_mut() = status;
			*rebuilt.headers_mut() = headers;

			Ok(rebuilt)
		})
	}
}

// Accepts both wire forms: delta seconds and an RFC 2822 HTTP date. A date in
// the past yields no hint.
#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn headers_with(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(
			RETRY_AFTER,
			HeaderValue::from_str(value).expect("Header fixture should be valid."),
		);

		headers
	}

	#[test]
	fn retry_after_parses_delta_seconds() {
		assert_eq!(parse_retry_after(&headers_with("120")), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after(&headers_with(" 0 ")), Some(Duration::ZERO));
	}

	#[test]
	fn retry_after_parses_future_http_dates() {
		let moment = (OffsetDateTime::now_utc() + Duration::minutes(5))
			.format(&Rfc2822)
			.expect("Fixture date should format.");
		let parsed = parse_retry_after(&headers_with(&moment))
			.expect("A future HTTP date should produce a delay.");

		assert!(parsed > Duration::minutes(4));
		assert!(parsed <= Duration::minutes(5));
	}

	#[test]
	fn retry_after_ignores_garbage_and_past_dates() {
		assert!(parse_retry_after(&HeaderMap::new()).is_none());
		assert!(parse_retry_after(&headers_with("not-a-hint")).is_none());

		let past = (OffsetDateTime::now_utc() - Duration::minutes(5))
			.format(&Rfc2822)
			.expect("Fixture date should format.");

		assert!(parse_retry_after(&headers_with(&past)).is_none());
	}

	#[test]
	fn throttle_signal_is_exactly_429() {
		let throttled = ResponseMetadata { status: Some(429), retry_after: None };
		let denied = ResponseMetadata { status: Some(403), retry_after: None };
		let silent = ResponseMetadata::default();

		assert!(throttled.signals_throttle());
		assert!(!denied.signals_throttle());
		assert!(!silent.signals_throttle());
	}
}
