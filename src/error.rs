//! Interceptor-level error types shared across the handler, transport, and strategies.

// self
use crate::{
	_prelude::*,
	auth::DestinationId,
	classifier::ClassifyError,
	control_plane::TokenAction,
	destination::{DestinationError, Flow},
	ext::AugmentError,
};

/// Interceptor-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical interceptor error exposed by public APIs.
///
/// Every variant maps onto the status code the transport synthesizes for it through
/// [`Error::status_code`]: `400` for permanent credential failures and `500` for
/// everything the caller may retry.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Destination or account identity is missing from the request.
	#[error(transparent)]
	Context(#[from] ContextError),
	/// Temporary control-plane failure; retry with a fresh attempt.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// The wrapped transport failed before producing a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The response classifier could not interpret the destination's response.
	#[error(transparent)]
	Classification(#[from] ClassifyError),
	/// The augmenter could not attach the secret to the outgoing request.
	#[error(transparent)]
	Augment(#[from] AugmentError),

	/// Control plane reported that the account's grant is permanently invalid.
	#[error("Control plane rejected the grant: {reason}.")]
	InvalidGrant {
		/// Control-plane supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns the HTTP status the transport synthesizes for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::InvalidGrant { .. } => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Returns `true` when the account's credentials are permanently unusable.
	pub fn is_invalid_grant(&self) -> bool {
		matches!(self, Self::InvalidGrant { .. })
	}

	/// Returns `true` when a later attempt may succeed without operator intervention.
	pub fn is_retryable(&self) -> bool {
		!self.is_invalid_grant()
	}
}

/// Request-level identity failures.
#[derive(Debug, ThisError)]
pub enum ContextError {
	/// The request does not carry a destination snapshot.
	#[error("Request context does not carry destination info.")]
	MissingDestination,
	/// The destination snapshot could not be interpreted for the flow.
	#[error("Destination `{destination}` is misconfigured for the {flow} flow: {source}")]
	Destination {
		/// Destination whose configuration failed.
		destination: DestinationId,
		/// Flow the transport serves.
		flow: Flow,
		/// Underlying configuration failure.
		#[source]
		source: DestinationError,
	},
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Control plane could not serve the token request.
	#[error("Control plane failed during {action}: {message}")]
	ControlPlane {
		/// Token action that failed.
		action: TokenAction,
		/// Control-plane supplied message.
		message: String,
		/// HTTP status reported by the control plane, when available.
		status: Option<u16>,
	},
	/// Control plane answered with an empty secret.
	#[error("Control plane returned an empty secret during {action}.")]
	EmptySecret {
		/// Token action that produced the empty secret.
		action: TokenAction,
	},
	/// The request deadline elapsed while waiting for the account lock or the control plane.
	#[error("Request deadline elapsed before {action} completed.")]
	DeadlineElapsed {
		/// Token action that was abandoned.
		action: TokenAction,
	},
}

/// Transport-level failures raised by the wrapped round tripper.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Transport round trip failed: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
