// self
use crate::{
	obs::{FlowKind, FlowOutcome},
	signature::SignatureVerdict,
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"portal_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a signature verification verdict (when enabled).
pub fn record_signature_verdict(verdict: &SignatureVerdict) {
	#[cfg(feature = "metrics")]
	{
		let version = verdict.version.map(|version| version.as_str()).unwrap_or("none");

		metrics::counter!(
			"portal_broker_signature_total",
			"version" => version,
			"valid" => if verdict.valid { "true" } else { "false" }
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = verdict;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_flow_outcome(FlowKind::Authorization, FlowOutcome::Failure);
		record_signature_verdict(&SignatureVerdict::missing());
	}
}
