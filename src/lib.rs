//! OAuth-aware HTTP transport for event destinations, with singleflight token refresh and
//! auth-status toggling behind a single round-trip interface.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod classifier;
pub mod control_plane;
pub mod destination;
pub mod error;
pub mod ext;
pub mod handler;
pub mod http;
pub mod obs;
pub mod sync;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles shared by unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::{AccountId, AccountSecret, DestinationId, WorkspaceId},
		control_plane::{
			AuthStatusRequest, ControlPlane, ControlPlaneError, ControlPlaneFuture, TokenAction,
			TokenRequest,
		},
		destination::DestinationInfo,
		http::{RoundTripFuture, RoundTripper},
		obs::{RoundTripCounter, RoundTripPhase, StatTags, StatsSink},
	};

	/// Account id configured on destinations built by [`oauth_destination`].
	pub const TEST_ACCOUNT: &str = "acc-1";

	/// Scripted [`ControlPlane`] that records every call it receives.
	///
	/// Token calls pop the next scripted result; once the script is exhausted, a fresh secret
	/// `{"access_token": "issued-N"}` is issued. Status calls succeed unless scripted otherwise.
	#[derive(Debug, Default)]
	pub struct MockControlPlane {
		token_script: Mutex<VecDeque<Result<AccountSecret, ControlPlaneError>>>,
		status_script: Mutex<VecDeque<Result<(), ControlPlaneError>>>,
		token_requests: Mutex<Vec<TokenRequest>>,
		status_requests: Mutex<Vec<AuthStatusRequest>>,
		issued: AtomicUsize,
		delay: Option<StdDuration>,
	}
	impl MockControlPlane {
		/// Delays every call by `delay` so concurrent callers overlap.
		pub fn with_delay(mut self, delay: StdDuration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Queues the result of the next token call.
		pub fn push_token(&self, result: Result<AccountSecret, ControlPlaneError>) {
			self.token_script.lock().push_back(result);
		}

		/// Queues the result of the next status call.
		pub fn push_status(&self, result: Result<(), ControlPlaneError>) {
			self.status_script.lock().push_back(result);
		}

		/// Token requests received so far.
		pub fn token_requests(&self) -> Vec<TokenRequest> {
			self.token_requests.lock().clone()
		}

		/// Status requests received so far.
		pub fn status_requests(&self) -> Vec<AuthStatusRequest> {
			self.status_requests.lock().clone()
		}

		/// Number of token calls made with [`TokenAction::Fetch`].
		pub fn fetch_calls(&self) -> usize {
			self.count_action(TokenAction::Fetch)
		}

		/// Number of token calls made with [`TokenAction::Refresh`].
		pub fn refresh_calls(&self) -> usize {
			self.count_action(TokenAction::Refresh)
		}

		fn count_action(&self, action: TokenAction) -> usize {
			self.token_requests.lock().iter().filter(|request| request.action == action).count()
		}

		async fn pause(&self) {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
		}
	}
	impl ControlPlane for MockControlPlane {
		fn fetch_token<'a>(
			&'a self,
			request: &'a TokenRequest,
		) -> ControlPlaneFuture<'a, AccountSecret> {
			Box::pin(async move {
				self.token_requests.lock().push(request.clone());
				self.pause().await;

				let scripted = self.token_script.lock().pop_front();

				scripted.unwrap_or_else(|| {
					let issued = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

					Ok(test_secret(&format!("issued-{issued}")))
				})
			})
		}

		fn update_auth_status<'a>(
			&'a self,
			request: &'a AuthStatusRequest,
		) -> ControlPlaneFuture<'a, ()> {
			Box::pin(async move {
				self.status_requests.lock().push(request.clone());
				self.pause().await;

				let scripted = self.status_script.lock().pop_front();

				scripted.unwrap_or(Ok(()))
			})
		}
	}

	/// Failure returned by [`ScriptedTransport`].
	#[derive(Debug, ThisError)]
	#[error("Scripted transport failure: {0}")]
	pub struct MockTransportError(pub String);

	/// [`RoundTripper`] answering from a script and recording every request it sends.
	///
	/// Once the script is exhausted every request gets an empty `200`.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		script: Mutex<VecDeque<Result<HttpResponse, MockTransportError>>>,
		requests: Mutex<Vec<HttpRequest>>,
		delay: Option<StdDuration>,
	}
	impl ScriptedTransport {
		/// Delays every answer by `delay` so concurrent requests overlap.
		pub fn with_delay(mut self, delay: StdDuration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Queues a response with `status` and `body`.
		pub fn push_response(&self, status: StatusCode, body: &str) {
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = status;

			self.script.lock().push_back(Ok(response));
		}

		/// Queues a transport failure.
		pub fn push_error(&self, message: &str) {
			self.script.lock().push_back(Err(MockTransportError(message.to_owned())));
		}

		/// Requests sent so far, in order.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().clone()
		}
	}
	impl RoundTripper for ScriptedTransport {
		type Error = MockTransportError;

		fn round_trip(&self, request: HttpRequest) -> RoundTripFuture<'_, Self::Error> {
			Box::pin(async move {
				self.requests.lock().push(request);

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				let scripted = self.script.lock().pop_front();

				scripted.unwrap_or_else(|| Ok(HttpResponse::new(Vec::new())))
			})
		}
	}

	/// A recorded [`StatsSink`] call.
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub enum RecordedStat {
		/// A phase timing.
		Timing(RoundTripPhase),
		/// A verdict counter.
		Count(RoundTripCounter),
	}

	/// [`StatsSink`] that keeps every stat it receives.
	#[derive(Debug, Default)]
	pub struct RecordingSink {
		stats: Mutex<Vec<(RecordedStat, StatTags)>>,
	}
	impl RecordingSink {
		/// Recorded stats without their tags.
		pub fn recorded(&self) -> Vec<RecordedStat> {
			self.stats.lock().iter().map(|(stat, _)| stat.clone()).collect()
		}

		/// Tags of every recorded stat.
		pub fn tags(&self) -> Vec<StatTags> {
			self.stats.lock().iter().map(|(_, tags)| tags.clone()).collect()
		}
	}
	impl StatsSink for RecordingSink {
		fn timing(&self, phase: RoundTripPhase, tags: &StatTags, _: StdDuration) {
			self.stats.lock().push((RecordedStat::Timing(phase), tags.clone()));
		}

		fn count(&self, counter: RoundTripCounter, tags: &StatTags) {
			self.stats.lock().push((RecordedStat::Count(counter), tags.clone()));
		}
	}

	/// Builds a secret `{"access_token": token}` without an expiration.
	pub fn test_secret(token: &str) -> AccountSecret {
		AccountSecret::new(serde_json::json!({ "access_token": token }))
	}

	/// Parses a test account id.
	pub fn test_account(value: &str) -> AccountId {
		AccountId::new(value).expect("Account fixture should be valid.")
	}

	/// Builds a destination of type `HUBSPOT` that uses OAuth for the delivery flow with
	/// [`TEST_ACCOUNT`] as its account.
	pub fn oauth_destination(id: &str) -> DestinationInfo {
		destination_with(
			id,
			serde_json::json!({ "auth": { "type": "OAuth" } }),
			serde_json::json!({ "accountId": TEST_ACCOUNT }),
		)
	}

	/// Builds a destination whose type does not use OAuth.
	pub fn plain_destination(id: &str) -> DestinationInfo {
		destination_with(id, serde_json::json!({}), serde_json::json!({}))
	}

	/// Builds a destination from JSON config fixtures.
	pub fn destination_with(
		id: &str,
		definition_config: JsonValue,
		config: JsonValue,
	) -> DestinationInfo {
		let (JsonValue::Object(definition_config), JsonValue::Object(config)) =
			(definition_config, config)
		else {
			panic!("Destination config fixtures must be JSON objects.");
		};

		DestinationInfo::new(
			DestinationId::new(id).expect("Destination fixture should be valid."),
			WorkspaceId::new("ws-1").expect("Workspace fixture should be valid."),
			"HUBSPOT",
		)
		.with_definition_config(definition_config)
		.with_config(config)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::{Duration as StdDuration, Instant},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use dashmap::DashMap;
	pub use oauth2::{
		HttpRequest, HttpResponse,
		http::{HeaderValue, StatusCode},
	};
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use oauth2::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(test)] use {color_eyre as _, httpmock as _};
