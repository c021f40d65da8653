// crates.io
use serde_json::json;
// self
use oauth2_interceptor::{
	_preludet::*,
	auth::{AccountSecret, AuthStatus},
	control_plane::{AuthStatusRequest, ControlPlaneError, TokenAction},
	error::TransientError,
	handler::{OAuthHandler, RefreshTokenParams, ToggleOutcome, TokenSource},
};

fn handler_with(control_plane: &Arc<MockControlPlane>) -> Arc<OAuthHandler> {
	Arc::new(OAuthHandler::new(control_plane.clone()))
}

fn params() -> RefreshTokenParams {
	RefreshTokenParams::new(test_account(TEST_ACCOUNT), &oauth_destination("dest-1"))
}

fn inactive_request() -> AuthStatusRequest {
	AuthStatusRequest::new(
		&oauth_destination("dest-1"),
		test_account(TEST_ACCOUNT),
		AuthStatus::Inactive,
	)
}

#[tokio::test]
async fn fetch_is_served_from_cache_after_first_call() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);
	let first = handler.fetch_token(&params()).await.expect("First fetch should succeed.");
	let second = handler.fetch_token(&params()).await.expect("Second fetch should succeed.");

	assert_eq!(first.source, TokenSource::ControlPlane);
	assert_eq!(second.source, TokenSource::Cache);
	assert_eq!(first.account, second.account);
	assert_eq!(first.status(), StatusCode::OK);
	assert_eq!(control_plane.fetch_calls(), 1);
	assert_eq!(handler.metrics().control_plane_fetches(), 1);
	assert_eq!(handler.metrics().cache_hits(), 1);

	let request = &control_plane.token_requests()[0];

	assert_eq!(request.action, TokenAction::Fetch);
	assert!(!request.has_expired);
	assert!(request.expired_secret.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_reach_control_plane_once() {
	let control_plane =
		Arc::new(MockControlPlane::default().with_delay(StdDuration::from_millis(50)));
	let handler = handler_with(&control_plane);
	let mut tasks = Vec::new();

	for _ in 0..16 {
		let handler = handler.clone();

		tasks.push(tokio::spawn(async move { handler.fetch_token(&params()).await }));
	}

	let mut secrets = Vec::new();

	for task in tasks {
		let response = task.await.expect("Fetch task should not panic.").expect("Fetch should succeed.");

		secrets.push(response.account);
	}

	assert_eq!(control_plane.fetch_calls(), 1);
	assert!(secrets.iter().all(|secret| secret == &test_secret("issued-1")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_of_one_secret_reach_control_plane_once() {
	let control_plane =
		Arc::new(MockControlPlane::default().with_delay(StdDuration::from_millis(50)));
	let handler = handler_with(&control_plane);
	let stale = test_secret("stale");

	handler.cache().set(test_account(TEST_ACCOUNT), stale.clone());

	let mut tasks = Vec::new();

	for _ in 0..10 {
		let handler = handler.clone();
		let params = params().with_secret(stale.expose().clone());

		tasks.push(tokio::spawn(async move { handler.refresh_token(&params).await }));
	}
	for task in tasks {
		let response =
			task.await.expect("Refresh task should not panic.").expect("Refresh should succeed.");

		assert_eq!(response.account, test_secret("issued-1"));
	}

	let requests = control_plane.token_requests();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].action, TokenAction::Refresh);
	assert!(requests[0].has_expired);
	assert_eq!(requests[0].expired_secret.as_ref(), Some(stale.expose()));
	assert_eq!(handler.cache().get(&test_account(TEST_ACCOUNT)), Some(test_secret("issued-1")));
}

#[tokio::test]
async fn refresh_returns_newer_cached_secret_without_network_call() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);

	handler.cache().set(test_account(TEST_ACCOUNT), test_secret("already-refreshed"));

	let response = handler
		.refresh_token(&params().with_secret(json!({ "access_token": "stale" })))
		.await
		.expect("Refresh should reuse the newer secret.");

	assert_eq!(response.source, TokenSource::Cache);
	assert_eq!(response.account, test_secret("already-refreshed"));
	assert!(control_plane.token_requests().is_empty());
}

#[tokio::test]
async fn expiring_secrets_are_refetched() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);
	let expiring =
		test_secret("expiring").expiring_at(OffsetDateTime::now_utc() + Duration::seconds(30));

	handler.cache().set(test_account(TEST_ACCOUNT), expiring.clone());

	let response = handler.fetch_token(&params()).await.expect("Fetch should succeed.");

	assert_eq!(response.source, TokenSource::ControlPlane);
	assert_eq!(response.account, test_secret("issued-1"));

	let requests = control_plane.token_requests();

	assert_eq!(requests.len(), 1);
	assert!(requests[0].has_expired);
	assert_eq!(requests[0].expired_secret.as_ref(), Some(expiring.expose()));
}

#[tokio::test]
async fn invalid_grant_maps_to_bad_request() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);

	control_plane.push_token(Err(ControlPlaneError::InvalidGrant {
		message: "refresh token revoked".into(),
	}));

	let err = handler.fetch_token(&params()).await.expect_err("Invalid grant should fail.");

	assert!(err.is_invalid_grant());
	assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	assert!(err.to_string().contains("refresh token revoked"));
	assert!(handler.cache().is_empty());
	assert_eq!(handler.metrics().failures(), 1);
}

#[tokio::test]
async fn control_plane_failures_are_transient() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);

	control_plane.push_token(Err(ControlPlaneError::Status {
		status: 503,
		message: "maintenance".into(),
	}));
	control_plane.push_token(Ok(AccountSecret::new(json!({}))));

	let unavailable = handler.fetch_token(&params()).await.expect_err("503 should fail.");

	assert!(matches!(
		unavailable,
		Error::Transient(TransientError::ControlPlane { status: Some(503), .. })
	));
	assert_eq!(unavailable.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

	let empty = handler.fetch_token(&params()).await.expect_err("Empty secret should fail.");

	assert!(matches!(empty, Error::Transient(TransientError::EmptySecret { .. })));
	assert!(handler.cache().is_empty());

	let recovered = handler.fetch_token(&params()).await.expect("Third fetch should succeed.");

	assert_eq!(recovered.account, test_secret("issued-1"));
}

#[tokio::test]
async fn elapsed_deadline_leaves_cache_untouched() {
	let control_plane =
		Arc::new(MockControlPlane::default().with_delay(StdDuration::from_millis(200)));
	let handler = handler_with(&control_plane);
	let deadline = Instant::now() + StdDuration::from_millis(20);
	let err = handler
		.fetch_token(&params().with_deadline(deadline))
		.await
		.expect_err("The control plane is slower than the deadline.");

	assert!(matches!(err, Error::Transient(TransientError::DeadlineElapsed { .. })));

	tokio::time::sleep(StdDuration::from_millis(250)).await;

	assert!(handler.cache().is_empty());

	let response = handler.fetch_token(&params()).await.expect("A later fetch should succeed.");

	assert_eq!(response.source, TokenSource::ControlPlane);
}

#[tokio::test]
async fn toggle_is_idempotent_and_invalidates_cache() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);

	handler.cache().set(test_account(TEST_ACCOUNT), test_secret("revoked"));

	assert_eq!(handler.auth_status_toggle(&inactive_request()).await, ToggleOutcome::Toggled);
	assert_eq!(handler.auth_status_toggle(&inactive_request()).await, ToggleOutcome::Unchanged);
	assert_eq!(control_plane.status_requests().len(), 1);
	assert_eq!(control_plane.status_requests()[0].status, AuthStatus::Inactive);
	assert!(handler.cache().is_empty());
	assert_eq!(
		handler.auth_status(&inactive_request().destination_id),
		Some(AuthStatus::Inactive)
	);

	handler.observe_auth_status(inactive_request().destination_id, AuthStatus::Active);

	assert!(handler.auth_status_toggle(&inactive_request()).await.is_toggled());
	assert_eq!(control_plane.status_requests().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_issue_a_single_update() {
	let control_plane =
		Arc::new(MockControlPlane::default().with_delay(StdDuration::from_millis(50)));
	let handler = handler_with(&control_plane);
	let mut tasks = Vec::new();

	for _ in 0..8 {
		let handler = handler.clone();

		tasks.push(tokio::spawn(async move { handler.auth_status_toggle(&inactive_request()).await }));
	}

	let mut toggled = 0;

	for task in tasks {
		match task.await.expect("Toggle task should not panic.") {
			ToggleOutcome::Toggled => toggled += 1,
			ToggleOutcome::InProgress | ToggleOutcome::Unchanged => {},
			ToggleOutcome::Failed(err) => panic!("Toggle should not fail: {err}"),
		}
	}

	assert_eq!(toggled, 1);
	assert_eq!(control_plane.status_requests().len(), 1);
}

#[tokio::test]
async fn failed_toggle_is_retried_by_the_next_caller() {
	let control_plane = Arc::new(MockControlPlane::default());
	let handler = handler_with(&control_plane);

	control_plane.push_status(Err(ControlPlaneError::Unreachable { message: "timeout".into() }));

	assert!(matches!(
		handler.auth_status_toggle(&inactive_request()).await,
		ToggleOutcome::Failed(ControlPlaneError::Unreachable { .. })
	));
	assert_eq!(handler.auth_status(&inactive_request().destination_id), None);
	assert_eq!(handler.auth_status_toggle(&inactive_request()).await, ToggleOutcome::Toggled);
	assert_eq!(control_plane.status_requests().len(), 2);
	assert_eq!(handler.metrics().status_toggles(), 2);
}
