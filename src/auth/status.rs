//! Authorization status recorded for a destination's credentials.

// self
use crate::_prelude::*;

/// Whether a destination's OAuth credentials are usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
	/// Credentials are valid and events may be delivered.
	Active,
	/// Credentials were revoked or rejected; the destination needs re-authorization.
	Inactive,
}
impl AuthStatus {
	/// Returns a stable label suitable for wire payloads, spans, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Inactive => "inactive",
		}
	}
}
impl Display for AuthStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthStatus {
	type Err = UnknownAuthStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			s if s.eq_ignore_ascii_case("active") => Ok(Self::Active),
			s if s.eq_ignore_ascii_case("inactive") => Ok(Self::Inactive),
			_ => Err(UnknownAuthStatus { value: s.to_owned() }),
		}
	}
}

/// Error returned when parsing an unrecognized status label.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown auth status `{value}`.")]
pub struct UnknownAuthStatus {
	/// Label that failed to parse.
	pub value: String,
}
