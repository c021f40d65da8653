//! Per-request context carried in `http::Request` extensions.

// crates.io
use oauth2::http::Request;
// self
use crate::{_prelude::*, destination::DestinationInfo};

/// Instant after which the interceptor stops waiting on locks and the control plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestDeadline(pub Instant);
impl RequestDeadline {
	/// Deadline `timeout` from now.
	pub fn after(timeout: StdDuration) -> Self {
		Self(Instant::now() + timeout)
	}

	/// Underlying instant.
	pub fn instant(self) -> Instant {
		self.0
	}
}

/// Accessors for the destination snapshot and deadline attached to a request.
pub trait DestinationRequestExt {
	/// Attaches the destination the request is sent to.
	fn with_destination(self, destination: impl Into<Arc<DestinationInfo>>) -> Self;

	/// Destination attached with [`Self::with_destination`].
	fn destination(&self) -> Option<&Arc<DestinationInfo>>;

	/// Bounds the interceptor's token work for this request.
	fn with_deadline(self, deadline: RequestDeadline) -> Self;

	/// Deadline attached with [`Self::with_deadline`].
	fn deadline(&self) -> Option<RequestDeadline>;
}
impl<B> DestinationRequestExt for Request<B> {
	fn with_destination(mut self, destination: impl Into<Arc<DestinationInfo>>) -> Self {
		self.extensions_mut().insert(destination.into());

		self
	}

	fn destination(&self) -> Option<&Arc<DestinationInfo>> {
		self.extensions().get::<Arc<DestinationInfo>>()
	}

	fn with_deadline(mut self, deadline: RequestDeadline) -> Self {
		self.extensions_mut().insert(deadline);

		self
	}

	fn deadline(&self) -> Option<RequestDeadline> {
		self.extensions().get::<RequestDeadline>().copied()
	}
}
