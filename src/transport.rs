//! OAuth-aware [`RoundTripper`] wrapping a destination transport.
//!
//! For destinations that authenticate the transport's flow with OAuth, every request goes
//! through three phases:
//!
//! 1. **Pre round trip** fetches the account secret (cached when possible) and attaches it with
//!    the configured [`Augmenter`].
//! 2. **Round trip** delegates to the wrapped transport.
//! 3. **Post round trip** classifies the response body. A token rejection triggers a
//!    single-flight refresh and asks the caller to retry (`500`), a permanent failure marks the
//!    destination inactive and asks the caller to abort (`400`).
//!
//! Verdicts are reported in the body of the response, shaped as a [`TransportResponse`],
//! with the outer status set to the verdict status. Requests to other destinations pass
//! through untouched.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountSecret, AuthStatus},
	classifier::{AuthErrorCategory, AuthErrorClassifier},
	control_plane::AuthStatusRequest,
	destination::{DestinationError, DestinationInfo, Flow},
	error::{ContextError, TransportError},
	ext::{Augmenter, DestinationRequestExt},
	handler::{OAuthHandler, RefreshTokenParams},
	http::{self, RoundTripFuture, RoundTripper},
	obs::{self, MetricsSink, RoundTripCounter, RoundTripPhase, RoundTripSpan, StatTags, StatsSink},
};

/// Prefix of every message describing a failure of the interceptor itself.
pub const PLATFORM_ERROR_TAG: &str = "[OAuthPlatformError]";

/// Verdict attached by the interceptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorResponse {
	/// `500` asks the caller to retry, `400` asks it to abort.
	pub status_code: u16,
	/// Human-readable explanation; omitted when empty.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub response: String,
}

/// Body of every response produced or rewritten by the interceptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
	/// Body returned by the destination; empty when the request never reached it.
	pub original_response: String,
	/// Interceptor verdict.
	pub interceptor_response: InterceptorResponse,
}
impl TransportResponse {
	/// Decodes a verdict body, reporting the failing path on error.
	pub fn from_slice(
		bytes: &[u8],
	) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de)
	}

	fn new(original: &[u8], status: StatusCode, message: String) -> Self {
		Self {
			original_response: String::from_utf8_lossy(original).into_owned(),
			interceptor_response: InterceptorResponse {
				status_code: status.as_u16(),
				response: message,
			},
		}
	}

	fn to_body(&self) -> Vec<u8> {
		serde_json::to_vec(self).unwrap_or_else(|_| self.interceptor_response.response.clone().into_bytes())
	}
}

/// Per-request state threaded through the phases of an OAuth round trip.
struct RoundTripState {
	destination: Arc<DestinationInfo>,
	account_id: AccountId,
	params: RefreshTokenParams,
	secret: Option<AccountSecret>,
}

/// [`RoundTripper`] that manages OAuth credentials for the wrapped transport.
pub struct OAuthTransport<T>
where
	T: ?Sized + RoundTripper,
{
	inner: Arc<T>,
	handler: Arc<OAuthHandler>,
	flow: Flow,
	classifier: Arc<dyn AuthErrorClassifier>,
	augmenter: Arc<dyn Augmenter>,
	stats: Arc<dyn StatsSink>,
}
impl<T> OAuthTransport<T>
where
	T: ?Sized + RoundTripper,
{
	/// Wraps `inner` for requests of `flow`.
	///
	/// Stats go to [`MetricsSink`] until replaced with [`Self::with_stats`].
	pub fn new(
		inner: Arc<T>,
		handler: Arc<OAuthHandler>,
		flow: Flow,
		classifier: Arc<dyn AuthErrorClassifier>,
		augmenter: Arc<dyn Augmenter>,
	) -> Self {
		Self { inner, handler, flow, classifier, augmenter, stats: Arc::new(MetricsSink) }
	}

	/// Sends round-trip timings and verdict counters to `stats`.
	pub fn with_stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
		self.stats = stats;

		self
	}

	/// Flow served by this transport.
	pub fn flow(&self) -> Flow {
		self.flow
	}

	/// Handler shared with other transports.
	pub fn handler(&self) -> &Arc<OAuthHandler> {
		&self.handler
	}

	async fn intercept(&self, request: HttpRequest) -> Result<HttpResponse, T::Error> {
		let Some(destination) = request.destination().cloned() else {
			let error = Error::from(ContextError::MissingDestination);

			obs::platform_error("destination lookup", &error);

			return Ok(synthesize(StatusCode::INTERNAL_SERVER_ERROR, platform_message(&error)));
		};
		let tags = StatTags::new(self.flow, &destination, request.uri().path());
		let started = Instant::now();
		let response = self.dispatch(request, destination, &tags).await;

		self.stats.timing(RoundTripPhase::Total, &tags, started.elapsed());

		response
	}

	async fn dispatch(
		&self,
		request: HttpRequest,
		destination: Arc<DestinationInfo>,
		tags: &StatTags,
	) -> Result<HttpResponse, T::Error> {
		let is_oauth = match destination.is_oauth_destination(self.flow) {
			Ok(is_oauth) => is_oauth,
			Err(source) => return Ok(self.misconfigured(&destination, source)),
		};

		if !is_oauth {
			return self.inner.round_trip(request).await;
		}

		let account_id = match destination.account_id(self.flow) {
			Ok(account_id) => account_id,
			Err(source) => return Ok(self.misconfigured(&destination, source)),
		};
		let mut params = RefreshTokenParams::new(account_id.clone(), &destination);

		if let Some(deadline) = request.deadline() {
			params = params.with_deadline(deadline.instant());
		}

		let span = RoundTripSpan::round_trip(self.flow, &destination);
		let state = RoundTripState { destination, account_id, params, secret: None };

		Ok(span.instrument(self.oauth_round_trip(request, state, tags)).await)
	}

	async fn oauth_round_trip(
		&self,
		request: HttpRequest,
		mut state: RoundTripState,
		tags: &StatTags,
	) -> HttpResponse {
		let started = Instant::now();
		let prepared = self.pre_round_trip(request, &mut state).await;

		self.stats.timing(RoundTripPhase::Pre, tags, started.elapsed());

		let request = match prepared {
			Ok(request) => request,
			Err(response) => return response,
		};
		let started = Instant::now();
		let response = match self.inner.round_trip(request).await {
			Ok(response) => response,
			Err(source) => {
				let error = Error::from(TransportError::network(source));

				obs::platform_error("round trip", &error);

				return synthesize(error.status_code(), error.to_string());
			},
		};

		self.stats.timing(RoundTripPhase::Main, tags, started.elapsed());

		let started = Instant::now();
		let response = self.post_round_trip(response, &state, tags).await;

		self.stats.timing(RoundTripPhase::Post, tags, started.elapsed());

		response
	}

	async fn pre_round_trip(
		&self,
		mut request: HttpRequest,
		state: &mut RoundTripState,
	) -> Result<HttpRequest, HttpResponse> {
		let auth = match self.handler.fetch_token(&state.params).await {
			Ok(auth) => auth,
			Err(error) => {
				if error.is_invalid_grant() {
					self.deactivate(state).await;
				}

				return Err(synthesize(error.status_code(), error.to_string()));
			},
		};

		if let Err(source) = self.augmenter.augment(&mut request, &auth.account) {
			let error = Error::from(source);

			obs::platform_error("secret augmentation", &error);

			return Err(synthesize(
				error.status_code(),
				format!("{PLATFORM_ERROR_TAG}Augmenting the secret pre round trip: {error}"),
			));
		}

		state.secret = Some(auth.account);

		Ok(request)
	}

	async fn post_round_trip(
		&self,
		response: HttpResponse,
		state: &RoundTripState,
		tags: &StatTags,
	) -> HttpResponse {
		let category = match self.classifier.classify(response.body()) {
			Ok(category) => category,
			Err(source) => {
				let error = Error::from(source);

				obs::platform_error("response classification", &error);

				let message = format!(
					"{PLATFORM_ERROR_TAG}Error processing response: {}",
					String::from_utf8_lossy(response.body())
				);

				return wrap(response, StatusCode::INTERNAL_SERVER_ERROR, message);
			},
		};

		match category {
			AuthErrorCategory::None => response,
			AuthErrorCategory::RefreshToken => {
				let mut params = state.params.clone();

				params.secret = state.secret.as_ref().map(|secret| secret.expose().clone());

				match self.handler.refresh_token(&params).await {
					Ok(_) => {
						self.stats.count(RoundTripCounter::Retry, tags);

						wrap(response, StatusCode::INTERNAL_SERVER_ERROR, String::new())
					},
					Err(error) if error.is_invalid_grant() => {
						self.deactivate(state).await;
						self.stats.count(RoundTripCounter::Abort, tags);

						wrap(response, error.status_code(), error.to_string())
					},
					Err(error) => wrap(response, error.status_code(), error.to_string()),
				}
			},
			AuthErrorCategory::AuthStatusInactive => {
				self.deactivate(state).await;
				self.stats.count(RoundTripCounter::Abort, tags);

				wrap(response, StatusCode::BAD_REQUEST, String::new())
			},
		}
	}

	async fn deactivate(&self, state: &RoundTripState) {
		let request =
			AuthStatusRequest::new(&state.destination, state.account_id.clone(), AuthStatus::Inactive);

		self.handler.auth_status_toggle(&request).await;
	}

	fn misconfigured(&self, destination: &DestinationInfo, source: DestinationError) -> HttpResponse {
		let error = Error::from(ContextError::Destination {
			destination: destination.id.clone(),
			flow: self.flow,
			source,
		});

		obs::platform_error("destination check", &error);

		synthesize(error.status_code(), platform_message(&error))
	}
}
impl<T> RoundTripper for OAuthTransport<T>
where
	T: ?Sized + RoundTripper,
{
	type Error = T::Error;

	fn round_trip(&self, request: HttpRequest) -> RoundTripFuture<'_, Self::Error> {
		Box::pin(self.intercept(request))
	}
}
impl<T> Debug for OAuthTransport<T>
where
	T: ?Sized + RoundTripper,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthTransport").field("flow", &self.flow).field("handler", &self.handler).finish()
	}
}

fn platform_message(error: &Error) -> String {
	format!("{PLATFORM_ERROR_TAG}{error}")
}

fn synthesize(status: StatusCode, message: String) -> HttpResponse {
	obs::verdict(status.as_u16(), "synthesized");

	http::interceptor_response(status, TransportResponse::new(&[], status, message).to_body())
}

fn wrap(response: HttpResponse, status: StatusCode, message: String) -> HttpResponse {
	obs::verdict(status.as_u16(), "wrapped");

	let (mut parts, original) = response.into_parts();
	let body = TransportResponse::new(&original, status, message).to_body();

	parts.status = status;

	http::mark_interceptor_headers(&mut parts.headers);

	HttpResponse::from_parts(parts, body)
}
