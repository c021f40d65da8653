// self
use crate::{
	_prelude::*,
	auth::{AccountId, AuthStatus, DestinationId},
	control_plane::TokenAction,
	destination::{DestinationInfo, Flow},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRoundTrip<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRoundTrip<F> = F;

/// A span builder used by the transport and the handler.
#[derive(Clone, Debug)]
pub struct RoundTripSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RoundTripSpan {
	/// Creates a span covering one OAuth round trip to `destination`.
	pub fn round_trip(flow: Flow, destination: &DestinationInfo) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_interceptor.round_trip",
				flow = flow.as_str(),
				destination_id = destination.id.as_str(),
				workspace_id = destination.workspace_id.as_str(),
				dest_type = destination.definition_name.as_str(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (flow, destination);

			Self {}
		}
	}

	/// Creates a span covering one fetch or refresh for `account`.
	pub fn handler(action: TokenAction, account: &AccountId) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_interceptor.handler",
				action = action.as_str(),
				account_id = account.as_str(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (action, account);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRoundTrip<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an error event for a failure of the interceptor itself.
pub(crate) fn platform_error(stage: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(stage, error = %error, "[OAuthPlatformError] {stage} failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, error);
	}
}

/// Emits an info event once the control plane accepted a status change.
pub(crate) fn status_toggled(destination: &DestinationId, status: AuthStatus) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			destination_id = destination.as_str(),
			status = status.as_str(),
			"Destination auth status updated."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (destination, status);
	}
}

/// Emits a debug event for every verdict the interceptor issues.
pub(crate) fn verdict(status: u16, kind: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(status, kind, "OAuth round trip verdict issued.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (status, kind);
	}
}
