//! OAuth client facade for the refresh-token grant.
//!
//! [`OAuthRefresher`] drives the `oauth2` crate through the [`TokenHttpClient`]
//! seam and folds every failure into the crate taxonomy: HTTP 429 and marker
//! matches become [`Error::RateLimited`] (carrying the `Retry-After` hint when
//! one was captured), unusable success responses become
//! [`Error::MissingAccessToken`], and everything else becomes
//! [`Error::RefreshFailed`] with a bounded body preview.

pub use oauth2;

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
use tokio::time::timeout;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, ProviderProfile},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Wall-clock bound on one refresh exchange, including connect and body time.
const REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(15);
/// Lifetime assumed when the provider omits `expires_in` or reports zero.
const FALLBACK_LIFETIME: Duration = Duration::minutes(50);
const BODY_PREVIEW_LIMIT: usize = 256;

type ConfiguredRefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// [`OAuthRefresher`] wired to the bundled reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestRefresher = OAuthRefresher<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Boxed future type returned by [`TokenRefresher`] implementations.
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<FreshToken>> + 'a + Send>>;

/// A token minted by one refresh exchange, before any storage policy applies.
#[derive(Clone, Debug)]
pub struct FreshToken {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Provider-reported lifetime, or the fallback when none was usable.
	pub expires_in: Duration,
}

/// Contract for exchanging the shared refresh credential for a new access token.
///
/// The coordinator invokes this while holding the cross-instance lock, so
/// implementations never need their own single-flight logic. Rate-limit
/// rejections must surface as [`Error::RateLimited`]; the coordinator widens
/// the carried hint to at least its configured cooldown before persisting it.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Performs one bounded refresh exchange against the provider.
	fn refresh(&self) -> RefreshFuture<'_>;
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport, together with
	/// any captured response metadata, into a crate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => Error::RefreshFailed {
				status: meta_status(meta),
				body: truncate_preview(format!("failed to build the token request: {inner}")),
			},
			HttpClientError::Io(inner) => Error::RefreshFailed {
				status: meta_status(meta),
				body: truncate_preview(format!("I/O failure while calling the token endpoint: {inner}")),
			},
			HttpClientError::Other(message) => Error::RefreshFailed {
				status: meta_status(meta),
				body: truncate_preview(format!("HTTP client failure: {message}")),
			},
			_ => Error::RefreshFailed {
				status: meta_status(meta),
				body: "HTTP client failed without further detail".into(),
			},
		}
	}
}

/// Refresh-grant client built from a [`ProviderProfile`].
pub struct OAuthRefresher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredRefreshClient,
	refresh_token: TokenSecret,
	throttle_markers: Vec<String>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> OAuthRefresher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a refresher around the profile's endpoint, credentials, and markers.
	pub fn from_profile(
		profile: &ProviderProfile,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(profile.token_endpoint.to_string()).map_err(|err| {
			Error::InvalidArgument { reason: format!("token endpoint URL is invalid: {err}") }
		})?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(profile.client_id.clone())).set_token_uri(token_url);

		if let Some(secret) = &profile.client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if matches!(profile.auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			refresh_token: profile.refresh_token.clone(),
			throttle_markers: profile.throttle_markers.clone(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> TokenRefresher for OAuthRefresher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn refresh(&self) -> RefreshFuture<'_> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(self.refresh_token.expose().to_owned());
			let request = self.oauth_client.exchange_refresh_token(&refresh_secret);
			let exchange = request.request_async(&instrumented);
			let response = match timeout(REFRESH_TIMEOUT, exchange).await {
				Ok(outcome) => outcome.map_err(|err| {
					map_request_error(
						&self.throttle_markers,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?,
				Err(_) => {
					return Err(Error::RefreshFailed {
						status: None,
						body: format!(
							"token endpoint did not respond within {} seconds",
							REFRESH_TIMEOUT.as_secs()
						),
					});
				},
			};
			let access_token = response.access_token().secret();

			if access_token.is_empty() {
				return Err(Error::MissingAccessToken);
			}

			let expires_in = response
				.expires_in()
				.and_then(|value| i64::try_from(value.as_secs()).ok())
				.filter(|secs| *secs > 0)
				.map(Duration::seconds)
				.unwrap_or(FALLBACK_LIFETIME);

			Ok(FreshToken { access_token: TokenSecret::new(access_token.to_owned()), expires_in })
		})
	}
}

fn map_request_error<E, M>(
	markers: &[String],
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	// A captured 429 outranks whatever shape the failure took.
	if meta_ref.is_some_and(ResponseMetadata::signals_throttle) {
		return Error::RateLimited {
			retry_after: meta_retry_after(meta_ref).unwrap_or(Duration::ZERO),
		};
	}

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(markers, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(_, body) => map_parse_error(meta_ref, &body),
		RequestTokenError::Other(message) => Error::RefreshFailed {
			status: meta_status(meta_ref),
			body: truncate_preview(message),
		},
	}
}

fn map_server_response_error(
	markers: &[String],
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref();
	let description = response.error_description();

	if is_throttle_signal(markers, code, description.map(String::as_str)) {
		return Error::RateLimited { retry_after: meta_retry_after(meta).unwrap_or(Duration::ZERO) };
	}

	let body = match description {
		Some(text) => format!("{code}: {text}"),
		None => code.to_owned(),
	};

	Error::RefreshFailed { status: meta_status(meta), body: truncate_preview(body) }
}

// A success status whose body would not parse means the provider answered
// without a usable token; everything else keeps its status and preview.
fn map_parse_error(meta: Option<&ResponseMetadata>, body: &[u8]) -> Error {
	match meta_status(meta) {
		Some(status) if (200..300).contains(&status) => Error::MissingAccessToken,
		status => Error::RefreshFailed {
			status,
			body: truncate_preview(String::from_utf8_lossy(body).into_owned()),
		},
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	let status = meta_status(meta).or_else(|| err.status().map(|code| code.as_u16()));

	if status == Some(429) {
		return Error::RateLimited { retry_after: meta_retry_after(meta).unwrap_or(Duration::ZERO) };
	}
	if err.is_timeout() {
		return Error::RefreshFailed {
			status,
			body: "request timed out while calling the token endpoint".into(),
		};
	}

	Error::RefreshFailed {
		status,
		body: truncate_preview(format!("network failure while calling the token endpoint: {err}")),
	}
}

fn is_throttle_signal(markers: &[String], code: &str, description: Option<&str>) -> bool {
	let code = code.to_ascii_lowercase();

	if markers.iter().any(|marker| code.contains(marker)) {
		return true;
	}

	description
		.map(|text| {
			let lowered = text.to_ascii_lowercase();

			markers.iter().any(|marker| lowered.contains(marker))
		})
		.unwrap_or(false)
}

fn truncate_preview(value: String) -> String {
	if value.chars().count() <= BODY_PREVIEW_LIMIT {
		return value;
	}

	let mut preview: String = value.chars().take(BODY_PREVIEW_LIMIT).collect();

	preview.push('…');

	preview
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::basic::BasicErrorResponseType;
	// self
	use super::*;
	use crate::auth::ProviderId;

	fn markers() -> Vec<String> {
		ProviderProfile::DEFAULT_THROTTLE_MARKERS.map(str::to_owned).to_vec()
	}

	fn meta(status: u16, retry_after: Option<Duration>) -> ResponseMetadata {
		ResponseMetadata { status: Some(status), retry_after }
	}

	#[test]
	fn throttle_markers_match_codes_and_descriptions() {
		let markers = markers();

		assert!(is_throttle_signal(&markers, "slow_down", None));
		assert!(is_throttle_signal(&markers, "invalid_request", Some("Rate limit exceeded")));
		assert!(!is_throttle_signal(&markers, "invalid_grant", Some("Refresh token revoked")));
	}

	#[test]
	fn marker_matches_become_rate_limits_with_the_captured_hint() {
		let response = BasicErrorResponse::new(
			BasicErrorResponseType::Extension("slow_down".into()),
			Some("Too many refreshes".into()),
			None,
		);
		let meta = meta(403, Some(Duration::seconds(17)));
		let error = map_server_response_error(&markers(), response, Some(&meta));

		assert_eq!(error.retry_after(), Some(Duration::seconds(17)));
	}

	#[test]
	fn unmarked_server_errors_keep_status_and_description() {
		let response = BasicErrorResponse::new(
			BasicErrorResponseType::InvalidGrant,
			Some("Refresh token revoked".into()),
			None,
		);
		let meta = meta(400, None);

		match map_server_response_error(&markers(), response, Some(&meta)) {
			Error::RefreshFailed { status, body } => {
				assert_eq!(status, Some(400));
				assert!(body.contains("invalid_grant"));
				assert!(body.contains("Refresh token revoked"));
			},
			error => panic!("Expected a refresh failure, got {error:?}."),
		}
	}

	#[test]
	fn parse_failures_classify_by_status() {
		let success = meta(200, None);

		assert!(matches!(
			map_parse_error(Some(&success), b"{\"token_type\":\"bearer\"}"),
			Error::MissingAccessToken
		));

		let failure = meta(502, None);

		match map_parse_error(Some(&failure), b"<html>bad gateway</html>") {
			Error::RefreshFailed { status, body } => {
				assert_eq!(status, Some(502));
				assert!(body.contains("bad gateway"));
			},
			error => panic!("Expected a refresh failure, got {error:?}."),
		}

		assert!(matches!(
			map_parse_error(None, b"no status captured"),
			Error::RefreshFailed { status: None, .. }
		));
	}

	#[test]
	fn previews_are_bounded() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT + 100);
		let preview = truncate_preview(long);

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
		assert_eq!(truncate_preview("short".into()), "short");
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn builds_refreshers_for_both_auth_methods() {
		for method in [ClientAuthMethod::ClientSecretPost, ClientAuthMethod::ClientSecretBasic] {
			let profile = ProviderProfile::builder(
				ProviderId::new("test-provider").expect("Failed to construct provider identifier."),
			)
			.token_endpoint(
				Url::parse("https://example.com/oauth2/token")
					.expect("Failed to parse token endpoint URL."),
			)
			.client_id("client-id")
			.client_secret("secret")
			.refresh_token("refresh")
			.auth_method(method)
			.build()
			.expect("Failed to build provider profile.");
			let result = <OAuthRefresher<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_profile(
				&profile,
				Arc::new(ReqwestHttpClient::default()),
				Arc::new(ReqwestTransportErrorMapper),
			);

			assert!(result.is_ok());
		}
	}
}
