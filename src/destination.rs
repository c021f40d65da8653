//! Destination snapshots and the flow-specific rules that decide whether a request needs OAuth.
//!
//! The config collaborator hands the interceptor a read-only [`DestinationInfo`] per request.
//! Two JSON maps drive the OAuth decisions:
//!
//! - `definition_config.auth.type` must equal `"OAuth"` for the destination type to use OAuth.
//! - `definition_config.auth.scopes` (optional) lists the flows OAuth applies to; when absent
//!   only the [`Flow::Delivery`] flow is OAuth-authenticated.
//!
//! The account identifier lives in the destination's own `config` under a flow-specific key
//! (see [`Flow::account_id_key`]).

// self
use crate::{
	_prelude::*,
	auth::{AccountId, DestinationId, IdentifierError, WorkspaceId},
};

type JsonMap = serde_json::Map<String, JsonValue>;

const AUTH_KEY: &str = "auth";
const AUTH_TYPE_KEY: &str = "type";
const AUTH_SCOPES_KEY: &str = "scopes";
const OAUTH_TYPE: &str = "OAuth";

/// Logical pipeline direction an OAuth credential is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
	/// Event delivery to the destination.
	Delivery,
	/// User-deletion (regulation) requests forwarded to the destination.
	Delete,
}
impl Flow {
	/// Returns a stable label suitable for config scopes, spans, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Delivery => "delivery",
			Self::Delete => "delete",
		}
	}

	/// Returns the destination config key holding the account id for this flow.
	pub const fn account_id_key(self) -> &'static str {
		match self {
			Self::Delivery => "accountId",
			Self::Delete => "deleteAccountId",
		}
	}
}
impl Display for Flow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration failures raised while inspecting a destination snapshot.
#[derive(Debug, ThisError)]
pub enum DestinationError {
	/// The destination payload could not be decoded.
	#[error("Destination payload is malformed: {source}")]
	Malformed {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A config field has an unexpected JSON type.
	#[error("Config field `{field}` must be {expected}.")]
	FieldType {
		/// Dotted path of the offending field.
		field: String,
		/// Human-readable description of the expected type.
		expected: &'static str,
	},
	/// The account id key is absent from the destination config.
	#[error("Account id is not configured under `{key}`.")]
	MissingAccountId {
		/// Config key that was looked up.
		key: &'static str,
	},
	/// The account id key is present but empty.
	#[error("Account id under `{key}` is empty.")]
	EmptyAccountId {
		/// Config key that was looked up.
		key: &'static str,
	},
	/// The account id failed identifier validation.
	#[error("Account id is invalid: {0}")]
	InvalidAccountId(#[from] IdentifierError),
}

/// Read-only snapshot of a configured destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationInfo {
	/// Destination identifier.
	pub id: DestinationId,
	/// Workspace that owns the destination.
	pub workspace_id: WorkspaceId,
	/// Destination type name (e.g. the integration's definition name).
	pub definition_name: String,
	/// Per-destination configuration.
	#[serde(default)]
	pub config: JsonMap,
	/// Configuration shared by every destination of the same type.
	#[serde(default)]
	pub definition_config: JsonMap,
}
impl DestinationInfo {
	/// Creates a snapshot with empty config maps.
	pub fn new(
		id: DestinationId,
		workspace_id: WorkspaceId,
		definition_name: impl Into<String>,
	) -> Self {
		Self {
			id,
			workspace_id,
			definition_name: definition_name.into(),
			config: JsonMap::new(),
			definition_config: JsonMap::new(),
		}
	}

	/// Replaces the per-destination config.
	pub fn with_config(mut self, config: JsonMap) -> Self {
		self.config = config;

		self
	}

	/// Replaces the destination-type config.
	pub fn with_definition_config(mut self, definition_config: JsonMap) -> Self {
		self.definition_config = definition_config;

		self
	}

	/// Decodes a snapshot from JSON, reporting the failing path on error.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, DestinationError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de).map_err(|source| DestinationError::Malformed { source })
	}

	/// Returns `true` when requests of `flow` must carry OAuth credentials.
	pub fn is_oauth_destination(&self, flow: Flow) -> Result<bool, DestinationError> {
		let Some(auth) = self.auth_section()? else {
			return Ok(false);
		};
		let is_oauth = match auth.get(AUTH_TYPE_KEY) {
			None | Some(JsonValue::Null) => false,
			Some(JsonValue::String(kind)) => kind == OAUTH_TYPE,
			Some(_) => return Err(field_type("auth.type", "a string")),
		};

		if !is_oauth {
			return Ok(false);
		}

		self.is_oauth_supported_for_flow(flow)
	}

	/// Returns `true` when the OAuth scopes of the destination type include `flow`.
	///
	/// Destination types without declared scopes only authenticate the delivery flow.
	pub fn is_oauth_supported_for_flow(&self, flow: Flow) -> Result<bool, DestinationError> {
		let scopes = match self.auth_section()?.and_then(|auth| auth.get(AUTH_SCOPES_KEY)) {
			None | Some(JsonValue::Null) => return Ok(flow == Flow::Delivery),
			Some(JsonValue::Array(scopes)) => scopes,
			Some(_) => return Err(field_type("auth.scopes", "an array of strings")),
		};

		for scope in scopes {
			match scope {
				JsonValue::String(value) if value == flow.as_str() => return Ok(true),
				JsonValue::String(_) => continue,
				_ => return Err(field_type("auth.scopes", "an array of strings")),
			}
		}

		Ok(false)
	}

	/// Resolves the OAuth account id configured for `flow`.
	pub fn account_id(&self, flow: Flow) -> Result<AccountId, DestinationError> {
		let key = flow.account_id_key();

		match self.config.get(key) {
			None | Some(JsonValue::Null) => Err(DestinationError::MissingAccountId { key }),
			Some(JsonValue::String(value)) if value.trim().is_empty() =>
				Err(DestinationError::EmptyAccountId { key }),
			Some(JsonValue::String(value)) => Ok(AccountId::new(value)?),
			Some(_) => Err(field_type(key, "a string")),
		}
	}

	fn auth_section(&self) -> Result<Option<&JsonMap>, DestinationError> {
		match self.definition_config.get(AUTH_KEY) {
			None | Some(JsonValue::Null) => Ok(None),
			Some(JsonValue::Object(auth)) => Ok(Some(auth)),
			Some(_) => Err(field_type(AUTH_KEY, "an object")),
		}
	}
}

fn field_type(field: &str, expected: &'static str) -> DestinationError {
	DestinationError::FieldType { field: field.to_owned(), expected }
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn destination(definition_config: JsonValue, config: JsonValue) -> DestinationInfo {
		let JsonValue::Object(definition_config) = definition_config else {
			panic!("Definition config fixture must be an object.");
		};
		let JsonValue::Object(config) = config else {
			panic!("Config fixture must be an object.");
		};

		DestinationInfo::new(
			DestinationId::new("dest-1").expect("Destination fixture should be valid."),
			WorkspaceId::new("ws-1").expect("Workspace fixture should be valid."),
			"GOOGLE_ADS",
		)
		.with_definition_config(definition_config)
		.with_config(config)
	}

	#[test]
	fn oauth_detection_defaults_to_delivery_only() {
		let info = destination(json!({ "auth": { "type": "OAuth" } }), json!({}));

		assert!(info.is_oauth_destination(Flow::Delivery).expect("Delivery check should succeed."));
		assert!(!info.is_oauth_destination(Flow::Delete).expect("Delete check should succeed."));
	}

	#[test]
	fn oauth_detection_honors_declared_scopes() {
		let info =
			destination(json!({ "auth": { "type": "OAuth", "scopes": ["delete"] } }), json!({}));

		assert!(!info.is_oauth_destination(Flow::Delivery).expect("Delivery check should succeed."));
		assert!(info.is_oauth_destination(Flow::Delete).expect("Delete check should succeed."));

		let broken = destination(json!({ "auth": { "type": "OAuth", "scopes": "delete" } }), json!({}));

		assert!(matches!(
			broken.is_oauth_destination(Flow::Delete),
			Err(DestinationError::FieldType { .. })
		));
	}

	#[test]
	fn non_oauth_types_skip_scope_checks() {
		let info = destination(json!({ "auth": { "type": "Basic", "scopes": 42 } }), json!({}));

		assert!(!info.is_oauth_destination(Flow::Delivery).expect("Basic auth is not OAuth."));
		assert!(
			!destination(json!({}), json!({}))
				.is_oauth_destination(Flow::Delivery)
				.expect("Destinations without an auth section are not OAuth.")
		);
	}

	#[test]
	fn account_id_resolution_is_flow_specific() {
		let info = destination(
			json!({ "auth": { "type": "OAuth" } }),
			json!({ "accountId": "acc-1", "deleteAccountId": "" }),
		);

		assert_eq!(
			info.account_id(Flow::Delivery).expect("Delivery account should resolve.").as_str(),
			"acc-1"
		);
		assert!(matches!(
			info.account_id(Flow::Delete),
			Err(DestinationError::EmptyAccountId { key: "deleteAccountId" })
		));
		assert!(matches!(
			destination(json!({}), json!({})).account_id(Flow::Delivery),
			Err(DestinationError::MissingAccountId { key: "accountId" })
		));
		assert!(matches!(
			destination(json!({}), json!({ "accountId": 7 })).account_id(Flow::Delivery),
			Err(DestinationError::FieldType { .. })
		));
	}

	#[test]
	fn from_slice_reports_failing_path() {
		let err = DestinationInfo::from_slice(
			br#"{"id":"dest-1","workspaceId":"ws 1","definitionName":"X"}"#,
		)
		.expect_err("Whitespace in the workspace id should be rejected.");
		let DestinationError::Malformed { source } = err else {
			panic!("Decoding failures should surface as malformed payloads.");
		};

		assert_eq!(source.path().to_string(), "workspaceId");
	}
}
