//! Call-side retry wrapper that invalidates and re-fetches once on stale-token
//! failures.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	coordinator::TokenCoordinator,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Classifies operation failures that mean the shared token went stale.
///
/// Providers revoke tokens out of band, so a cached row can outlive its real
/// validity. Implement this for the operation's error type and return `true`
/// for the provider's "token no longer valid" shape (typically HTTP 401) to
/// opt that failure into one invalidate-and-retry cycle.
pub trait StaleTokenSignal {
	/// Returns `true` when the failure means the access token is no longer valid.
	fn is_stale_token(&self) -> bool;
}
// Coordinator errors describe acquisition problems, never a rejected upstream
// call, so they never trigger the retry path.
impl StaleTokenSignal for Error {
	fn is_stale_token(&self) -> bool {
		false
	}
}

impl TokenCoordinator {
	/// Runs `operation` with a shared token, retrying once after a stale-token failure.
	///
	/// The wrapper acquires a token, invokes `operation`, and inspects failures
	/// through [`StaleTokenSignal`]. A stale signal invalidates the stored row,
	/// acquires a replacement token, and retries the operation exactly once;
	/// the second outcome is final either way.
	pub async fn with_token_retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
	where
		F: FnMut(TokenSecret) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: From<Error> + StaleTokenSignal,
	{
		const KIND: FlowKind = FlowKind::TokenRetry;

		let span = FlowSpan::new(KIND, "with_token_retry");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.get_shared_access_token().await.map_err(E::from)?;
				let failure = match operation(token).await {
					Ok(value) => return Ok(value),
					Err(failure) => failure,
				};

				if !failure.is_stale_token() {
					return Err(failure);
				}

				self.metrics.record_stale_retry();
				self.store
					.invalidate_token(&self.provider)
					.await
					.map_err(|err| E::from(Error::from(err)))?;

				let token = self.get_shared_access_token().await.map_err(E::from)?;

				operation(token).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
