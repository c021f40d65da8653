//! Observability helpers for the handler and the transport.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `oauth2_interceptor.round_trip` (fields `flow`,
//!   `destination_id`, `workspace_id`, `dest_type`) and `oauth2_interceptor.handler` (fields
//!   `action`, `account_id`), plus `error` events for platform failures.
//! - Enable `metrics` to record round-trip phase latencies through [`MetricsSink`] and to
//!   increment the `oauth2_interceptor_handler_total` counter labeled by `action` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{
	_prelude::*,
	destination::{DestinationInfo, Flow},
};

/// Phases of an OAuth round trip that are timed separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundTripPhase {
	/// Token fetch plus request augmentation.
	Pre,
	/// The wrapped transport call.
	Main,
	/// Response classification plus any refresh or toggle.
	Post,
	/// The whole round trip.
	Total,
}
impl RoundTripPhase {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pre => "pre",
			Self::Main => "main",
			Self::Post => "post",
			Self::Total => "total",
		}
	}

	/// Histogram name the phase latency is recorded under.
	pub const fn metric_name(self) -> &'static str {
		match self {
			Self::Pre => "oauth2_interceptor_pre_round_trip_seconds",
			Self::Main => "oauth2_interceptor_main_round_trip_seconds",
			Self::Post => "oauth2_interceptor_post_round_trip_seconds",
			Self::Total => "oauth2_interceptor_round_trip_seconds",
		}
	}
}
impl Display for RoundTripPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Verdict counters recorded by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoundTripCounter {
	/// A refresh succeeded and the caller was asked to retry.
	Retry,
	/// The destination was marked inactive and the caller was asked to abort.
	Abort,
}
impl RoundTripCounter {
	/// Counter name the verdict is recorded under.
	pub const fn metric_name(self) -> &'static str {
		match self {
			Self::Retry => "oauth2_interceptor_retry_total",
			Self::Abort => "oauth2_interceptor_abort_total",
		}
	}
}

/// Outcome labels recorded for each handler operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerOutcome {
	/// Entry to a handler operation.
	Attempt,
	/// The cached secret was returned.
	CacheHit,
	/// The control plane answered successfully.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl HandlerOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::CacheHit => "cache_hit",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}
impl Display for HandlerOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Labels attached to every round-trip stat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatTags {
	/// Flow the transport serves.
	pub flow: Flow,
	/// Destination identifier.
	pub destination_id: String,
	/// Workspace owning the destination.
	pub workspace_id: String,
	/// Destination type name.
	pub dest_type: String,
	/// Path of the outbound request.
	pub request_path: String,
}
impl StatTags {
	/// Builds tags for a request to `request_path` on `destination`.
	pub fn new(flow: Flow, destination: &DestinationInfo, request_path: &str) -> Self {
		Self {
			flow,
			destination_id: destination.id.as_str().to_owned(),
			workspace_id: destination.workspace_id.as_str().to_owned(),
			dest_type: destination.definition_name.clone(),
			request_path: request_path.to_owned(),
		}
	}
}

/// Destination for round-trip timings and verdict counters.
pub trait StatsSink
where
	Self: Send + Sync,
{
	/// Records how long `phase` took.
	fn timing(&self, phase: RoundTripPhase, tags: &StatTags, elapsed: StdDuration);

	/// Increments `counter` by one.
	fn count(&self, counter: RoundTripCounter, tags: &StatTags);
}

/// Sink that drops every stat.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;
impl StatsSink for NoopSink {
	fn timing(&self, _: RoundTripPhase, _: &StatTags, _: StdDuration) {}

	fn count(&self, _: RoundTripCounter, _: &StatTags) {}
}
