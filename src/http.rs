//! Round-trip primitives shared by the interceptor and the transports it wraps.
//!
//! [`RoundTripper`] is the crate's only dependency on an HTTP stack: the interceptor wraps
//! one and implements it again, so interceptors compose with any client. Requests and
//! responses use the `http` types re-exported by `oauth2`.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::{
	HeaderMap,
	header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, TRANSFER_ENCODING},
};
// self
use crate::_prelude::*;

/// Header marking responses produced or rewritten by the interceptor.
pub const API_VERSION_HEADER: &str = "apiversion";
/// Value of [`API_VERSION_HEADER`].
pub const API_VERSION: &str = "2";

/// Boxed future returned by [`RoundTripper::round_trip`].
pub type RoundTripFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Executes one HTTP request and returns its response.
///
/// Implementations must be `Send + Sync + 'static` so a single instance can serve every
/// in-flight request, and the futures they return must be `Send` so callers can spawn them.
pub trait RoundTripper
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted when no response was produced.
	type Error: 'static + Send + Sync + StdError;

	/// Sends `request` and resolves to the response.
	fn round_trip(&self, request: HttpRequest) -> RoundTripFuture<'_, Self::Error>;
}
impl<T> RoundTripper for Arc<T>
where
	T: ?Sized + RoundTripper,
{
	type Error = T::Error;

	fn round_trip(&self, request: HttpRequest) -> RoundTripFuture<'_, Self::Error> {
		(**self).round_trip(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing [`RoundTripper`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RoundTripper for ReqwestHttpClient {
	type Error = ReqwestError;

	fn round_trip(&self, request: HttpRequest) -> RoundTripFuture<'_, Self::Error> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.version_mut() = version;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Builds a response the interceptor produced without a downstream answer.
pub(crate) fn interceptor_response(status: StatusCode, body: Vec<u8>) -> HttpResponse {
	let mut response = HttpResponse::new(body);

	*response.status_mut() = status;

	mark_interceptor_headers(response.headers_mut());

	response
}

/// Tags `headers` as belonging to a response whose body the interceptor wrote.
pub(crate) fn mark_interceptor_headers(headers: &mut HeaderMap) {
	// The body is rewritten as plain JSON, so the destination's framing no longer applies.
	headers.remove(CONTENT_LENGTH);
	headers.remove(CONTENT_ENCODING);
	headers.remove(TRANSFER_ENCODING);
	headers.insert(HeaderName::from_static(API_VERSION_HEADER), HeaderValue::from_static(API_VERSION));
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
}
