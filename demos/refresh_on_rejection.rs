//! Wraps the default reqwest transport with the OAuth interceptor and shows a rejected token
//! being refreshed, then accepted on the caller's retry.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::{Map, json};
// self
use oauth2_interceptor::{
	auth::{AccountSecret, DestinationId, WorkspaceId},
	classifier::ProxyResponseClassifier,
	control_plane::{AuthStatusRequest, ControlPlane, ControlPlaneFuture, TokenRequest},
	destination::{DestinationInfo, Flow},
	ext::{DestinationRequestExt, HeaderAugmenter},
	handler::OAuthHandler,
	http::{ReqwestHttpClient, RoundTripper},
	http_types::{Method, Request},
	transport::{OAuthTransport, TransportResponse},
};

/// Issues `demo-1`, `demo-2`, ... and accepts every status update.
#[derive(Debug, Default)]
struct DemoControlPlane {
	issued: AtomicUsize,
}
impl ControlPlane for DemoControlPlane {
	fn fetch_token<'a>(&'a self, request: &'a TokenRequest) -> ControlPlaneFuture<'a, AccountSecret> {
		Box::pin(async move {
			let issued = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

			println!("Control plane {} for {}: issuing demo-{issued}.", request.action, request.account_id);

			Ok(AccountSecret::new(json!({ "access_token": format!("demo-{issued}") })))
		})
	}

	fn update_auth_status<'a>(&'a self, request: &'a AuthStatusRequest) -> ControlPlaneFuture<'a, ()> {
		Box::pin(async move {
			println!("Control plane: {} is now {}.", request.destination_id, request.status);

			Ok(())
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/events").header("x-dest-info", r#"{"secret":{"access_token":"demo-1"}}"#);
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"output":{"authErrorCategory":"REFRESH_TOKEN"}}"#);
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(POST).path("/events").header("x-dest-info", r#"{"secret":{"access_token":"demo-2"}}"#);
			then.status(200).header("content-type", "application/json").body(r#"{"output":{}}"#);
		})
		.await;
	let destination = Arc::new(
		DestinationInfo::new(DestinationId::new("dest-demo")?, WorkspaceId::new("ws-demo")?, "HUBSPOT")
			.with_definition_config(Map::from_iter([(
				"auth".to_owned(),
				json!({ "type": "OAuth" }),
			)]))
			.with_config(Map::from_iter([("accountId".to_owned(), json!("acc-demo"))])),
	);
	let transport = OAuthTransport::new(
		Arc::new(ReqwestHttpClient::default()),
		Arc::new(OAuthHandler::new(Arc::new(DemoControlPlane::default()))),
		Flow::Delivery,
		Arc::new(ProxyResponseClassifier::default()),
		Arc::new(HeaderAugmenter::default()),
	);

	for attempt in 1..=2 {
		let request = Request::builder()
			.method(Method::POST)
			.uri(server.url("/events"))
			.body(br#"{"event":"track"}"#.to_vec())?
			.with_destination(destination.clone());
		let response = transport.round_trip(request).await?;

		if response.headers().contains_key("apiversion") {
			let verdict = TransportResponse::from_slice(response.body())?;

			println!(
				"Attempt {attempt}: interceptor verdict {} (destination said {}).",
				verdict.interceptor_response.status_code, verdict.original_response
			);
		} else {
			println!("Attempt {attempt}: delivered with status {}.", response.status());
		}
	}

	rejected.assert_async().await;
	accepted.assert_async().await;

	Ok(())
}
