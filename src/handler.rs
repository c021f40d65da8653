//! Token lifecycle orchestration with per-account singleflight guards and status toggles.
//!
//! [`OAuthHandler::fetch_token`] serves the cached secret of an account and only contacts
//! the control plane when nothing usable is cached. [`OAuthHandler::refresh_token`] replaces a
//! secret the destination rejected. Both paths take the account's partition lock and re-check
//! the cache once they hold it, so N concurrent callers for one account produce a single
//! control-plane call while other accounts proceed in parallel.
//!
//! [`OAuthHandler::auth_status_toggle`] compares the target status with the last status it
//! recorded for the destination and skips the control plane when nothing would change or
//! when another toggle for the same destination is already in flight.

mod metrics;

pub use metrics::HandlerMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountSecret, AuthStatus, DestinationId, WorkspaceId},
	cache::TokenCache,
	control_plane::{
		AuthStatusRequest, ControlPlane, ControlPlaneError, TokenAction, TokenRequest,
	},
	destination::DestinationInfo,
	error::TransientError,
	obs::{self, HandlerOutcome, RoundTripSpan},
	sync::PartitionLocker,
};

type StatusTable = Mutex<HashMap<DestinationId, StatusEntry>>;

const TOGGLE_ACTION: &str = "auth_status_toggle";

/// Tunables for [`OAuthHandler`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
	/// Secrets expiring within this window are treated as expired.
	pub expiry_skew: Duration,
}
impl HandlerConfig {
	const DEFAULT_EXPIRY_SKEW: Duration = Duration::minutes(1);

	/// Overrides the expiry skew (negative values clamp to zero).
	pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
		self.expiry_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}
}
impl Default for HandlerConfig {
	fn default() -> Self {
		Self { expiry_skew: Self::DEFAULT_EXPIRY_SKEW }
	}
}

/// Parameters for a single fetch or refresh attempt.
///
/// Built fresh for every round trip and never shared between tasks.
#[derive(Clone, Debug)]
pub struct RefreshTokenParams {
	/// Account whose secret is requested.
	pub account_id: AccountId,
	/// Workspace owning the destination.
	pub workspace_id: WorkspaceId,
	/// Destination type name.
	pub dest_def_name: String,
	/// Destination that will use the secret.
	pub destination_id: DestinationId,
	/// Secret the destination rejected, captured before refreshing.
	pub secret: Option<JsonValue>,
	/// Instant after which waiting for the lock or the control plane is abandoned.
	pub deadline: Option<Instant>,
}
impl RefreshTokenParams {
	/// Creates parameters for `account_id` on `destination`.
	pub fn new(account_id: AccountId, destination: &DestinationInfo) -> Self {
		Self {
			account_id,
			workspace_id: destination.workspace_id.clone(),
			dest_def_name: destination.definition_name.clone(),
			destination_id: destination.id.clone(),
			secret: None,
			deadline: None,
		}
	}

	/// Records the secret the destination rejected.
	pub fn with_secret(mut self, secret: JsonValue) -> Self {
		self.secret = Some(secret);

		self
	}

	/// Bounds the operation by `deadline`.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	fn token_request(
		&self,
		action: TokenAction,
		has_expired: bool,
		expired_secret: Option<JsonValue>,
	) -> TokenRequest {
		TokenRequest {
			action,
			account_id: self.account_id.clone(),
			workspace_id: self.workspace_id.clone(),
			destination_id: self.destination_id.clone(),
			dest_def_name: self.dest_def_name.clone(),
			has_expired,
			expired_secret,
		}
	}
}

/// Where a successful [`AuthResponse`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
	/// The secret was already cached.
	Cache,
	/// The secret was just issued by the control plane.
	ControlPlane,
}

/// Successful result of a fetch or refresh.
#[derive(Clone, Debug)]
pub struct AuthResponse {
	/// Secret to use for the account.
	pub account: AccountSecret,
	/// Whether the secret was cached or freshly issued.
	pub source: TokenSource,
}
impl AuthResponse {
	/// Status code equivalent of a successful fetch or refresh.
	pub fn status(&self) -> StatusCode {
		StatusCode::OK
	}
}

/// Result of [`OAuthHandler::auth_status_toggle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
	/// The control plane accepted the new status.
	Toggled,
	/// The destination already has the target status; no call was made.
	Unchanged,
	/// Another toggle for the destination is in flight; no call was made.
	InProgress,
	/// The control plane rejected or missed the update; a later failure retries it.
	Failed(ControlPlaneError),
}
impl ToggleOutcome {
	/// Returns `true` when this call changed the status.
	pub fn is_toggled(&self) -> bool {
		matches!(self, Self::Toggled)
	}
}

#[derive(Debug, Default)]
struct StatusEntry {
	last_known: Option<AuthStatus>,
	in_flight: bool,
}

enum CachedState {
	Fresh(AccountSecret),
	Expired(AccountSecret),
	Rejected,
	Missing,
}

/// Issues, caches, and refreshes account secrets and drives destination auth status.
pub struct OAuthHandler {
	control_plane: Arc<dyn ControlPlane>,
	cache: TokenCache,
	locker: PartitionLocker<AccountId>,
	statuses: StatusTable,
	config: HandlerConfig,
	metrics: Arc<HandlerMetrics>,
}
impl OAuthHandler {
	/// Creates a handler backed by `control_plane` with an empty cache.
	pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
		Self {
			control_plane,
			cache: TokenCache::default(),
			locker: PartitionLocker::default(),
			statuses: Default::default(),
			config: HandlerConfig::default(),
			metrics: Default::default(),
		}
	}

	/// Shares `cache` with other handlers or observers.
	pub fn with_cache(mut self, cache: TokenCache) -> Self {
		self.cache = cache;

		self
	}

	/// Replaces the handler configuration.
	pub fn with_config(mut self, config: HandlerConfig) -> Self {
		self.config = config;

		self
	}

	/// Token cache used by the handler.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Active configuration.
	pub fn config(&self) -> &HandlerConfig {
		&self.config
	}

	/// In-process counters for handler activity.
	pub fn metrics(&self) -> &Arc<HandlerMetrics> {
		&self.metrics
	}

	/// Returns a usable secret for the account, fetching one from the control plane when the
	/// cache holds nothing usable.
	pub async fn fetch_token(&self, params: &RefreshTokenParams) -> Result<AuthResponse> {
		self.token_info(TokenAction::Fetch, params).await
	}

	/// Replaces the secret in `params.secret` unless another caller already did.
	pub async fn refresh_token(&self, params: &RefreshTokenParams) -> Result<AuthResponse> {
		self.token_info(TokenAction::Refresh, params).await
	}

	/// Moves the destination to `request.status`, skipping redundant control-plane calls.
	///
	/// Toggling to [`AuthStatus::Inactive`] also evicts the account's cached secret.
	///
	/// The last known status is only changed by successful toggles and by
	/// [`observe_auth_status`](Self::observe_auth_status). Once a destination is recorded as
	/// inactive, later deactivations return [`ToggleOutcome::Unchanged`] until the config
	/// collaborator reports the re-authorization with `observe_auth_status(.., AuthStatus::Active)`.
	pub async fn auth_status_toggle(&self, request: &AuthStatusRequest) -> ToggleOutcome {
		obs::record_handler_outcome(TOGGLE_ACTION, HandlerOutcome::Attempt);

		{
			let mut statuses = self.statuses.lock();
			let entry = statuses.entry(request.destination_id.clone()).or_default();

			if entry.last_known == Some(request.status) {
				return ToggleOutcome::Unchanged;
			}
			if entry.in_flight {
				return ToggleOutcome::InProgress;
			}

			entry.in_flight = true;
		}

		let _in_flight =
			InFlightToggle { statuses: &self.statuses, destination: &request.destination_id };

		self.metrics.record_status_toggle();

		match self.control_plane.update_auth_status(request).await {
			Ok(()) => {
				if let Some(entry) = self.statuses.lock().get_mut(&request.destination_id) {
					entry.last_known = Some(request.status);
				}
				if request.status == AuthStatus::Inactive {
					self.cache.invalidate(&request.account_id);
				}

				obs::status_toggled(&request.destination_id, request.status);
				obs::record_handler_outcome(TOGGLE_ACTION, HandlerOutcome::Success);

				ToggleOutcome::Toggled
			},
			Err(err) => {
				self.metrics.record_failure();
				obs::platform_error(TOGGLE_ACTION, &err);
				obs::record_handler_outcome(TOGGLE_ACTION, HandlerOutcome::Failure);

				ToggleOutcome::Failed(err)
			},
		}
	}

	/// Last status recorded for `destination`, if any.
	pub fn auth_status(&self, destination: &DestinationId) -> Option<AuthStatus> {
		self.statuses.lock().get(destination).and_then(|entry| entry.last_known)
	}

	/// Records a status learned from the config collaborator (e.g. after re-authorization).
	pub fn observe_auth_status(&self, destination: DestinationId, status: AuthStatus) {
		self.statuses.lock().entry(destination).or_default().last_known = Some(status);
	}

	async fn token_info(
		&self,
		action: TokenAction,
		params: &RefreshTokenParams,
	) -> Result<AuthResponse> {
		let span = RoundTripSpan::handler(action, &params.account_id);

		obs::record_handler_outcome(action.as_str(), HandlerOutcome::Attempt);

		let result = span
			.instrument(async {
				match params.deadline {
					Some(deadline) => tokio::time::timeout_at(
						deadline.into(),
						self.resolve_token(action, params),
					)
					.await
					.unwrap_or_else(|_| Err(TransientError::DeadlineElapsed { action }.into())),
					None => self.resolve_token(action, params).await,
				}
			})
			.await;
		let outcome = match &result {
			Ok(response) if response.source == TokenSource::Cache => HandlerOutcome::CacheHit,
			Ok(_) => HandlerOutcome::Success,
			Err(err) => {
				obs::platform_error(action.as_str(), err);

				HandlerOutcome::Failure
			},
		};

		obs::record_handler_outcome(action.as_str(), outcome);

		result
	}

	async fn resolve_token(
		&self,
		action: TokenAction,
		params: &RefreshTokenParams,
	) -> Result<AuthResponse> {
		// Lock-free fast path; refreshes always serialize on the account lock.
		if action == TokenAction::Fetch {
			if let CachedState::Fresh(secret) = self.cached_state(params) {
				return Ok(self.cache_hit(secret));
			}
		}

		let _singleflight = self.locker.lock(&params.account_id).await;
		let (has_expired, expired_secret) = match self.cached_state(params) {
			CachedState::Fresh(secret) => return Ok(self.cache_hit(secret)),
			CachedState::Expired(secret) => (true, Some(secret.expose().clone())),
			CachedState::Rejected | CachedState::Missing => (action == TokenAction::Refresh, None),
		};
		let request = params.token_request(
			action,
			has_expired,
			params.secret.clone().or(expired_secret),
		);

		self.metrics.record_control_plane_call(action);

		match self.control_plane.fetch_token(&request).await {
			Ok(secret) if secret.is_empty() => {
				self.metrics.record_failure();

				Err(TransientError::EmptySecret { action }.into())
			},
			Ok(secret) => {
				self.cache.set(params.account_id.clone(), secret.clone());

				Ok(AuthResponse { account: secret, source: TokenSource::ControlPlane })
			},
			Err(ControlPlaneError::InvalidGrant { message }) => {
				self.metrics.record_failure();

				Err(Error::InvalidGrant { reason: message })
			},
			Err(err) => {
				self.metrics.record_failure();

				Err(TransientError::ControlPlane {
					action,
					status: err.status(),
					message: err.to_string(),
				}
				.into())
			},
		}
	}

	fn cached_state(&self, params: &RefreshTokenParams) -> CachedState {
		let Some(cached) = self.cache.get(&params.account_id) else {
			return CachedState::Missing;
		};

		if cached.is_expired_at(OffsetDateTime::now_utc(), self.config.expiry_skew) {
			return CachedState::Expired(cached);
		}
		if params.secret.as_ref() == Some(cached.expose()) {
			return CachedState::Rejected;
		}

		CachedState::Fresh(cached)
	}

	fn cache_hit(&self, secret: AccountSecret) -> AuthResponse {
		self.metrics.record_cache_hit();

		AuthResponse { account: secret, source: TokenSource::Cache }
	}
}
impl Debug for OAuthHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthHandler")
			.field("cached_accounts", &self.cache.len())
			.field("config", &self.config)
			.field("metrics", &self.metrics)
			.finish()
	}
}

struct InFlightToggle<'a> {
	statuses: &'a StatusTable,
	destination: &'a DestinationId,
}
impl Drop for InFlightToggle<'_> {
	fn drop(&mut self) {
		if let Some(entry) = self.statuses.lock().get_mut(self.destination) {
			entry.in_flight = false;
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn config_clamps_negative_skew() {
		let config = HandlerConfig::default().with_expiry_skew(Duration::seconds(-5));

		assert_eq!(config.expiry_skew, Duration::ZERO);
		assert_eq!(HandlerConfig::default().expiry_skew, Duration::minutes(1));
	}

	#[test]
	fn config_deserializes_with_defaults() {
		let config: HandlerConfig =
			serde_json::from_str("{}").expect("Empty config should fall back to defaults.");

		assert_eq!(config, HandlerConfig::default());
	}

	#[test]
	fn params_carry_destination_identity() {
		let destination = DestinationInfo::new(
			DestinationId::new("dest-1").expect("Destination fixture should be valid."),
			WorkspaceId::new("ws-1").expect("Workspace fixture should be valid."),
			"HUBSPOT",
		);
		let params = RefreshTokenParams::new(
			AccountId::new("acc-1").expect("Account fixture should be valid."),
			&destination,
		)
		.with_secret(json!({ "token": "old" }));
		let request = params.token_request(TokenAction::Refresh, true, params.secret.clone());

		assert_eq!(request.destination_id.as_str(), "dest-1");
		assert_eq!(request.workspace_id.as_str(), "ws-1");
		assert_eq!(request.dest_def_name, "HUBSPOT");
		assert_eq!(request.expired_secret, Some(json!({ "token": "old" })));
		assert!(request.has_expired);
	}
}
