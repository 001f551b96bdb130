// self
use crate::{_prelude::*, obs::FlowKind};

/// Span wrapped around one coordinator flow.
///
/// Construction costs nothing when the `tracing` feature is off; the type
/// keeps its shape so call sites need no feature gates of their own.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens the `oauth2_coordinator.flow` span for `kind`, with `stage`
	/// naming the entry point.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oauth2_coordinator.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the span to `fut`; it is entered only while the future is
	/// polled, so holding it across `.await` points is sound.
	#[cfg(feature = "tracing")]
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}

	/// Returns `fut` untouched; tracing is disabled.
	#[cfg(not(feature = "tracing"))]
	pub fn instrument<Fut>(&self, fut: Fut) -> Fut
	where
		Fut: Future,
	{
		fut
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_future_resolves_to_its_own_output() {
		let span = FlowSpan::new(FlowKind::Refresh, "test_stage");
		let sum = span.instrument(async { 19 + 23 }).await;

		assert_eq!(sum, 42);
	}

	#[test]
	fn span_construction_is_infallible_for_every_kind() {
		for kind in [FlowKind::Acquire, FlowKind::Refresh, FlowKind::TokenRetry] {
			let _span = FlowSpan::new(kind, "test_stage");
		}
	}
}
