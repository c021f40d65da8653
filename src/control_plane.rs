//! Contract for the remote authority that issues tokens and records destination status.
//!
//! The interceptor never speaks the control plane's wire protocol itself. Deployments plug
//! in a [`ControlPlane`] implementation (an RPC client, an HTTP client, or a test double);
//! only the outcome of each call matters to the handler.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountSecret, AuthStatus, DestinationId, WorkspaceId},
	destination::DestinationInfo,
};

/// Boxed future returned by [`ControlPlane`] calls.
pub type ControlPlaneFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ControlPlaneError>> + 'a + Send>>;

/// Remote token authority consulted by the OAuth handler.
pub trait ControlPlane
where
	Self: Send + Sync,
{
	/// Issues (or re-issues) the secret for the account named in `request`.
	fn fetch_token<'a>(&'a self, request: &'a TokenRequest) -> ControlPlaneFuture<'a, AccountSecret>;

	/// Records a new authorization status for the destination named in `request`.
	fn update_auth_status<'a>(&'a self, request: &'a AuthStatusRequest) -> ControlPlaneFuture<'a, ()>;
}

/// Which handler operation produced a token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
	/// Return the current secret, fetching one when none is cached.
	Fetch,
	/// Replace a secret the destination rejected.
	Refresh,
}
impl TokenAction {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fetch => "fetch_token",
			Self::Refresh => "refresh_token",
		}
	}
}
impl Display for TokenAction {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token request forwarded to the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	/// Operation that triggered the call.
	pub action: TokenAction,
	/// Account whose secret is requested.
	pub account_id: AccountId,
	/// Workspace owning the destination.
	pub workspace_id: WorkspaceId,
	/// Destination that will use the secret.
	pub destination_id: DestinationId,
	/// Destination type name.
	pub dest_def_name: String,
	/// `true` when the caller knows the previous secret is no longer valid.
	pub has_expired: bool,
	/// Secret the caller considers expired, when known.
	pub expired_secret: Option<JsonValue>,
}

/// Status update forwarded to the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthStatusRequest {
	/// Destination whose status changes.
	pub destination_id: DestinationId,
	/// Workspace owning the destination.
	pub workspace_id: WorkspaceId,
	/// Account whose credentials triggered the change.
	pub account_id: AccountId,
	/// Target status.
	pub status: AuthStatus,
}
impl AuthStatusRequest {
	/// Builds a request for `destination` using its identifiers.
	pub fn new(destination: &DestinationInfo, account_id: AccountId, status: AuthStatus) -> Self {
		Self {
			destination_id: destination.id.clone(),
			workspace_id: destination.workspace_id.clone(),
			account_id,
			status,
		}
	}
}

/// Failures reported by [`ControlPlane`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ControlPlaneError {
	/// The account's grant is permanently invalid; a human must re-authorize.
	#[error("Refresh grant is invalid: {message}")]
	InvalidGrant {
		/// Control-plane supplied message.
		message: String,
	},
	/// The control plane answered with a non-success status.
	#[error("Control plane responded with status {status}: {message}")]
	Status {
		/// HTTP status code of the answer.
		status: u16,
		/// Control-plane supplied message.
		message: String,
	},
	/// The control plane could not be reached.
	#[error("Control plane is unreachable: {message}")]
	Unreachable {
		/// Transport-level description of the failure.
		message: String,
	},
}
impl ControlPlaneError {
	/// Returns the HTTP status code reported by the control plane, when any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			Self::InvalidGrant { .. } => Some(400),
			Self::Unreachable { .. } => None,
		}
	}
}
