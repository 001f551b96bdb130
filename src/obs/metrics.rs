// self
use crate::obs::{FlowKind, FlowOutcome};

/// Bumps the `oauth2_coordinator_flow_total` counter for one observed flow
/// event via the global recorder.
///
/// Without the `metrics` feature this is a no-op; the per-instance
/// [`CoordinatorMetrics`](crate::coordinator::CoordinatorMetrics) counters
/// record regardless.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"oauth2_coordinator_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
