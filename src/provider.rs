//! Validated provider profiles consumed by the refresh layer.
//!
//! A [`ProviderProfile`] bundles everything one shared credential needs: the
//! HTTPS token endpoint, the client credentials, the long-lived refresh secret,
//! the client-authentication style, and the throttle markers matched against
//! provider error payloads. Profiles are immutable after [`ProviderProfileBuilder::build`]
//! and validation happens exactly once, so downstream code never re-checks them.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret},
};

/// How client credentials accompany the refresh request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Credentials travel in the urlencoded request body.
	#[default]
	ClientSecretPost,
	/// Credentials travel in an HTTP Basic `Authorization` header.
	ClientSecretBasic,
}

/// Errors raised while validating a [`ProviderProfile`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ProviderProfileError {
	/// No token endpoint was configured.
	#[error("Token endpoint is required.")]
	MissingTokenEndpoint,
	/// The configured token endpoint does not use HTTPS.
	#[error("Token endpoint must use https: {url}.")]
	InsecureTokenEndpoint {
		/// Offending URL.
		url: String,
	},
	/// The client identifier was empty or whitespace.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// The shared refresh credential was empty.
	#[error("Refresh credential cannot be empty.")]
	MissingRefreshToken,
}

/// Immutable description of one provider credential shared by a fleet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
	/// Identifier keying this credential in stores and locks.
	pub id: ProviderId,
	/// HTTPS token endpoint.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, when the provider issued one.
	pub client_secret: Option<TokenSecret>,
	/// Long-lived refresh credential shared by every instance.
	pub refresh_token: TokenSecret,
	/// Client-authentication style used on the token endpoint.
	pub auth_method: ClientAuthMethod,
	/// Lower-cased markers matched against provider error codes and descriptions.
	pub throttle_markers: Vec<String>,
}
impl ProviderProfile {
	/// Markers recognized as throttle signals when a provider rejects a refresh
	/// without a 429 status.
	pub const DEFAULT_THROTTLE_MARKERS: [&'static str; 4] =
		["rate limit", "rate_limit", "slow_down", "too many requests"];

	/// Starts building a profile for the given provider.
	pub fn builder(id: ProviderId) -> ProviderProfileBuilder {
		ProviderProfileBuilder {
			id,
			token_endpoint: None,
			client_id: None,
			client_secret: None,
			refresh_token: None,
			auth_method: ClientAuthMethod::default(),
			throttle_markers: Self::DEFAULT_THROTTLE_MARKERS.map(str::to_owned).to_vec(),
		}
	}
}

/// Builder for [`ProviderProfile`]; validation happens in [`ProviderProfileBuilder::build`].
#[derive(Clone, Debug)]
pub struct ProviderProfileBuilder {
	id: ProviderId,
	token_endpoint: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	auth_method: ClientAuthMethod,
	throttle_markers: Vec<String>,
}
impl ProviderProfileBuilder {
	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, value: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(value));

		self
	}

	/// Sets the shared refresh credential.
	pub fn refresh_token(mut self, value: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(value));

		self
	}

	/// Sets the client-authentication style.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Adds one throttle marker on top of the defaults.
	pub fn throttle_marker(mut self, marker: impl Into<String>) -> Self {
		self.throttle_markers.push(marker.into());

		self
	}

	/// Replaces the marker list entirely.
	pub fn throttle_markers<I, S>(mut self, markers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.throttle_markers = markers.into_iter().map(Into::into).collect();

		self
	}

	/// Validates the configuration and produces the immutable profile.
	pub fn build(self) -> Result<ProviderProfile, ProviderProfileError> {
		let token_endpoint =
			self.token_endpoint.ok_or(ProviderProfileError::MissingTokenEndpoint)?;

		validate_endpoint(&token_endpoint)?;

		let client_id = self
			.client_id
			.filter(|value| !value.trim().is_empty())
			.ok_or(ProviderProfileError::MissingClientId)?;
		let refresh_token = self
			.refresh_token
			.filter(|value| !value.is_empty())
			.ok_or(ProviderProfileError::MissingRefreshToken)?;
		let throttle_markers =
			self.throttle_markers.into_iter().map(|marker| marker.to_ascii_lowercase()).collect();

		Ok(ProviderProfile {
			id: self.id,
			token_endpoint,
			client_id,
			client_secret: self.client_secret,
			refresh_token,
			auth_method: self.auth_method,
			throttle_markers,
		})
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ProviderProfileError> {
	if url.scheme() != "https" {
		return Err(ProviderProfileError::InsecureTokenEndpoint { url: url.to_string() });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base_builder() -> ProviderProfileBuilder {
		ProviderProfile::builder(ProviderId::new("acme").expect("Provider fixture should be valid."))
			.token_endpoint(
				Url::parse("https://auth.acme.test/oauth/token")
					.expect("Endpoint fixture should parse."),
			)
			.client_id("client-1")
			.client_secret("secret-1")
			.refresh_token("refresh-1")
	}

	#[test]
	fn build_applies_defaults() {
		let profile = base_builder().build().expect("Base profile should validate.");

		assert_eq!(profile.auth_method, ClientAuthMethod::ClientSecretPost);
		assert_eq!(
			profile.throttle_markers,
			ProviderProfile::DEFAULT_THROTTLE_MARKERS.map(str::to_owned).to_vec()
		);
	}

	#[test]
	fn build_rejects_incomplete_or_insecure_profiles() {
		let missing_endpoint = ProviderProfile::builder(
			ProviderId::new("acme").expect("Provider fixture should be valid."),
		)
		.client_id("client-1")
		.refresh_token("refresh-1")
		.build();

		assert_eq!(missing_endpoint, Err(ProviderProfileError::MissingTokenEndpoint));

		let insecure = base_builder()
			.token_endpoint(
				Url::parse("http://auth.acme.test/oauth/token")
					.expect("Endpoint fixture should parse."),
			)
			.build();

		assert!(matches!(insecure, Err(ProviderProfileError::InsecureTokenEndpoint { .. })));
		assert_eq!(
			base_builder().client_id("   ").build(),
			Err(ProviderProfileError::MissingClientId)
		);
		assert_eq!(
			base_builder().refresh_token("").build(),
			Err(ProviderProfileError::MissingRefreshToken)
		);
	}

	#[test]
	fn markers_are_normalized_to_lowercase() {
		let profile = base_builder()
			.throttle_markers(["Quota Exceeded", "SLOW_DOWN"])
			.throttle_marker("Calm Down")
			.build()
			.expect("Marker profile should validate.");

		assert_eq!(profile.throttle_markers, vec!["quota exceeded", "slow_down", "calm down"]);
	}
}
