//! Error taxonomy shared across the coordinator, its storage backends, and the refresh layer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical coordination error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[source] crate::store::StoreError),
	/// Lock-backend failure.
	#[error("{0}")]
	Lock(
		#[from]
		#[source]
		crate::lock::LockError,
	),

	/// The provider is throttling refreshes, or a shared cooldown window is active.
	#[error("Token refresh is rate limited; retry after {retry_after}.")]
	RateLimited {
		/// How long callers should wait before trying again.
		retry_after: Duration,
	},
	/// The provider rejected the refresh for a reason other than throttling.
	#[error("Token refresh failed: {body}.")]
	RefreshFailed {
		/// HTTP status code of the rejection, when one was observed.
		status: Option<u16>,
		/// Bounded diagnostic detail taken from the provider response.
		body: String,
	},
	/// The provider answered with success but no usable access token.
	#[error("Token endpoint response did not contain a usable access token.")]
	MissingAccessToken,
	/// A caller-supplied value failed validation.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// What was rejected.
		reason: String,
	},
}
impl Error {
	/// Returns the wait hint carried by a rate-limit rejection.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after } => Some(*retry_after),
			_ => None,
		}
	}
}
// Validation failures keep their public shape instead of hiding inside the storage variant.
impl From<crate::store::StoreError> for Error {
	fn from(error: crate::store::StoreError) -> Self {
		match error {
			crate::store::StoreError::InvalidArgument { reason } => Self::InvalidArgument { reason },
			error => Self::Storage(error),
		}
	}
}
