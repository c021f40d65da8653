// self
use crate::{
	_prelude::*,
	obs::{HandlerOutcome, RoundTripCounter, RoundTripPhase, StatTags, StatsSink},
};

/// [`StatsSink`] backed by the global `metrics` recorder (a no-op without the `metrics`
/// feature).
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsSink;
impl StatsSink for MetricsSink {
	fn timing(&self, phase: RoundTripPhase, tags: &StatTags, elapsed: StdDuration) {
		#[cfg(feature = "metrics")]
		{
			metrics::histogram!(
				phase.metric_name(),
				"flow" => tags.flow.as_str(),
				"destination_id" => tags.destination_id.clone(),
				"workspace_id" => tags.workspace_id.clone(),
				"dest_type" => tags.dest_type.clone(),
				"request_path" => tags.request_path.clone()
			)
			.record(elapsed.as_secs_f64());
		}

		#[cfg(not(feature = "metrics"))]
		{
			let _ = (phase, tags, elapsed);
		}
	}

	fn count(&self, counter: RoundTripCounter, tags: &StatTags) {
		#[cfg(feature = "metrics")]
		{
			metrics::counter!(
				counter.metric_name(),
				"flow" => tags.flow.as_str(),
				"destination_id" => tags.destination_id.clone(),
				"workspace_id" => tags.workspace_id.clone(),
				"dest_type" => tags.dest_type.clone()
			)
			.increment(1);
		}

		#[cfg(not(feature = "metrics"))]
		{
			let _ = (counter, tags);
		}
	}
}

/// Records a handler outcome via the global metrics recorder (when enabled).
pub fn record_handler_outcome(action: &'static str, outcome: HandlerOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_interceptor_handler_total",
			"action" => action,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (action, outcome);
	}
}
