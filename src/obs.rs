//! Observation hooks for the acquisition pipeline, all optional.
//!
//! With the `tracing` feature on, each flow runs inside an
//! `oauth2_coordinator.flow` span carrying `flow` and `stage` fields. With the
//! `metrics` feature on, every attempt and terminal outcome increments the
//! `oauth2_coordinator_flow_total` counter, labeled by `flow` and `outcome`.
//! Without the features both hooks compile away; the always-on per-instance
//! counters live in [`CoordinatorMetrics`](crate::coordinator::CoordinatorMetrics).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

macro_rules! label_enum {
	(
		$(#[$meta:meta])*
		$name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal,)+ }
	) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
		pub enum $name {
			$($(#[$vmeta])* $variant,)+
		}
		impl $name {
			/// Returns the stable label recorded on spans and counters.
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $label,)+
				}
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(self.as_str())
			}
		}
	};
}

label_enum! {
	/// Pipeline flows the coordinator distinguishes when reporting.
	FlowKind {
		/// One shared-token acquisition, cooldown gate through returned secret.
		Acquire => "acquire",
		/// The lock-guarded exchange against the provider's token endpoint.
		Refresh => "refresh",
		/// The invalidate-and-retry wrapper around a caller operation.
		TokenRetry => "token_retry",
	}
}

label_enum! {
	/// Terminal labels recorded once per observed flow, plus the entry mark.
	FlowOutcome {
		/// Flow entry.
		Attempt => "attempt",
		/// The caller received a token (or the wrapped operation's value).
		Success => "success",
		/// Rejected by a cooldown window or a provider throttle signal.
		RateLimited => "rate_limited",
		/// Any other failure returned to the caller.
		Failure => "failure",
	}
}
