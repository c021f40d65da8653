//! Opaque account secrets handed out by the control plane.

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::_prelude::*;

/// Credential blob issued for an account.
///
/// The `secret` payload is opaque JSON; only augmenters look inside it. Formatting never
/// prints the payload so secrets stay out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSecret {
	secret: JsonValue,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expiration_date: Option<String>,
}
impl AccountSecret {
	/// Wraps a secret payload without an expiration hint.
	pub fn new(secret: JsonValue) -> Self {
		Self { secret, expiration_date: None }
	}

	/// Attaches the RFC 3339 expiration timestamp reported by the control plane.
	pub fn with_expiration_date(mut self, expiration_date: impl Into<String>) -> Self {
		self.expiration_date = Some(expiration_date.into());

		self
	}

	/// Attaches an expiration instant, formatting it as RFC 3339.
	pub fn expiring_at(self, instant: OffsetDateTime) -> Self {
		match instant.format(&Rfc3339) {
			Ok(formatted) => self.with_expiration_date(formatted),
			Err(_) => self,
		}
	}

	/// Returns the secret payload. Callers must avoid logging this value.
	pub fn expose(&self) -> &JsonValue {
		&self.secret
	}

	/// Returns the raw expiration date string, if the control plane supplied one.
	pub fn expiration_date(&self) -> Option<&str> {
		self.expiration_date.as_deref()
	}

	/// Parses the expiration date; unparsable or missing dates yield `None`.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expiration_date.as_deref().and_then(|raw| OffsetDateTime::parse(raw.trim(), &Rfc3339).ok())
	}

	/// Returns `true` when the secret expires within `skew` of `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		match self.expires_at() {
			Some(expires_at) => expires_at - now <= skew,
			None => false,
		}
	}

	/// Returns `true` when the payload carries no credential material.
	pub fn is_empty(&self) -> bool {
		match &self.secret {
			JsonValue::Null => true,
			JsonValue::Object(map) => map.is_empty(),
			JsonValue::String(value) => value.is_empty(),
			_ => false,
		}
	}
}
impl Debug for AccountSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccountSecret")
			.field("secret", &"<redacted>")
			.field("expiration_date", &self.expiration_date)
			.finish()
	}
}
impl Display for AccountSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
