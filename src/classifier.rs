//! Response classification deciding whether a destination rejected the OAuth credentials.
//!
//! The transport hands the raw response body of every OAuth round trip to an
//! [`AuthErrorClassifier`]. Any `Fn(&[u8]) -> Result<AuthErrorCategory, ClassifyError>`
//! qualifies, so deployments can plug in destination-specific rules without a new type.

// self
use crate::_prelude::*;

const DEFAULT_CATEGORY_PATH: [&str; 2] = ["output", "authErrorCategory"];

/// Auth error categories a response can be classified into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthErrorCategory {
	/// The response carries no auth error.
	#[default]
	#[serde(rename = "")]
	None,
	/// The access token was rejected; a refresh may fix it.
	#[serde(rename = "REFRESH_TOKEN")]
	RefreshToken,
	/// The grant is unusable; the destination must be deactivated.
	#[serde(rename = "AUTH_STATUS_INACTIVE")]
	AuthStatusInactive,
}
impl AuthErrorCategory {
	/// Returns the wire label of the category.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::None => "",
			Self::RefreshToken => "REFRESH_TOKEN",
			Self::AuthStatusInactive => "AUTH_STATUS_INACTIVE",
		}
	}

	/// Maps a wire label to a category; empty or unrecognized labels become [`Self::None`].
	pub fn from_label(label: &str) -> Self {
		match label.trim() {
			"REFRESH_TOKEN" => Self::RefreshToken,
			"AUTH_STATUS_INACTIVE" => Self::AuthStatusInactive,
			_ => Self::None,
		}
	}
}
impl Display for AuthErrorCategory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(if self.as_str().is_empty() { "none" } else { self.as_str() })
	}
}

/// Failures raised while classifying a response body.
#[derive(Debug, ThisError)]
pub enum ClassifyError {
	/// The body is not valid JSON.
	#[error("Response body is not valid JSON: {source}")]
	Parse {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A field on the category path has an unexpected JSON type.
	#[error("Response field `{path}` has an unexpected type.")]
	FieldType {
		/// Dotted path of the offending field.
		path: String,
	},
	/// Custom classifier failure.
	#[error("{message}")]
	Custom {
		/// Human-readable description.
		message: String,
	},
}
impl ClassifyError {
	/// Convenience constructor for classifier closures.
	pub fn custom(message: impl Into<String>) -> Self {
		Self::Custom { message: message.into() }
	}
}

/// Strategy mapping a destination response body to an [`AuthErrorCategory`].
pub trait AuthErrorClassifier
where
	Self: Send + Sync,
{
	/// Classifies `body`.
	fn classify(&self, body: &[u8]) -> Result<AuthErrorCategory, ClassifyError>;
}
impl<F> AuthErrorClassifier for F
where
	F: Send + Sync + Fn(&[u8]) -> Result<AuthErrorCategory, ClassifyError>,
{
	fn classify(&self, body: &[u8]) -> Result<AuthErrorCategory, ClassifyError> {
		self(body)
	}
}

/// Classifier for proxy responses that report the category inside a JSON document.
///
/// The category label is read at a configurable field path (default
/// `output.authErrorCategory`). Empty bodies, missing fields, and `null` all classify as
/// [`AuthErrorCategory::None`].
#[derive(Clone, Debug)]
pub struct ProxyResponseClassifier {
	path: Vec<String>,
}
impl ProxyResponseClassifier {
	/// Reads the category at `path` instead of the default location.
	pub fn with_path<I, S>(path: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { path: path.into_iter().map(Into::into).collect() }
	}

	/// Field path the category is read from.
	pub fn path(&self) -> &[String] {
		&self.path
	}
}
impl Default for ProxyResponseClassifier {
	fn default() -> Self {
		Self::with_path(DEFAULT_CATEGORY_PATH)
	}
}
impl AuthErrorClassifier for ProxyResponseClassifier {
	fn classify(&self, body: &[u8]) -> Result<AuthErrorCategory, ClassifyError> {
		if body.iter().all(u8::is_ascii_whitespace) {
			return Ok(AuthErrorCategory::None);
		}

		let mut de = serde_json::Deserializer::from_slice(body);
		let document: JsonValue = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ClassifyError::Parse { source })?;
		let mut current = &document;

		for (depth, segment) in self.path.iter().enumerate() {
			current = match current {
				JsonValue::Object(map) => match map.get(segment) {
					Some(next) => next,
					None => return Ok(AuthErrorCategory::None),
				},
				JsonValue::Null => return Ok(AuthErrorCategory::None),
				_ => return Err(ClassifyError::FieldType { path: self.path[..depth].join(".") }),
			};
		}

		match current {
			JsonValue::Null => Ok(AuthErrorCategory::None),
			JsonValue::String(label) => Ok(AuthErrorCategory::from_label(label)),
			_ => Err(ClassifyError::FieldType { path: self.path.join(".") }),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_lenient() {
		assert_eq!(AuthErrorCategory::from_label("REFRESH_TOKEN"), AuthErrorCategory::RefreshToken);
		assert_eq!(
			AuthErrorCategory::from_label(" AUTH_STATUS_INACTIVE "),
			AuthErrorCategory::AuthStatusInactive
		);
		assert_eq!(AuthErrorCategory::from_label("SOMETHING_ELSE"), AuthErrorCategory::None);
		assert_eq!(AuthErrorCategory::from_label(""), AuthErrorCategory::None);
		assert_eq!(AuthErrorCategory::None.to_string(), "none");
	}

	#[test]
	fn proxy_classifier_reads_default_path() {
		let classifier = ProxyResponseClassifier::default();

		assert_eq!(
			classifier
				.classify(br#"{"output":{"authErrorCategory":"REFRESH_TOKEN"}}"#)
				.expect("Valid body should classify."),
			AuthErrorCategory::RefreshToken
		);
		assert_eq!(
			classifier.classify(br#"{"output":{}}"#).expect("Missing field should classify."),
			AuthErrorCategory::None
		);
		assert_eq!(classifier.classify(b"  ").expect("Empty body should classify."), AuthErrorCategory::None);
	}

	#[test]
	fn proxy_classifier_reports_bad_documents() {
		let classifier = ProxyResponseClassifier::with_path(["status"]);

		assert!(matches!(classifier.classify(b"not json"), Err(ClassifyError::Parse { .. })));
		assert!(matches!(
			classifier.classify(br#"{"status":42}"#),
			Err(ClassifyError::FieldType { path }) if path == "status"
		));
		assert_eq!(
			classifier
				.classify(br#"{"status":"AUTH_STATUS_INACTIVE"}"#)
				.expect("Custom path should classify."),
			AuthErrorCategory::AuthStatusInactive
		);
	}

	#[test]
	fn closures_are_classifiers() {
		let classifier = |body: &[u8]| {
			if body.starts_with(b"401") {
				Ok(AuthErrorCategory::RefreshToken)
			} else {
				Err(ClassifyError::custom("unexpected body"))
			}
		};

		assert_eq!(
			classifier.classify(b"401 Unauthorized").expect("Closure should classify."),
			AuthErrorCategory::RefreshToken
		);
		assert_eq!(
			classifier.classify(b"oops").expect_err("Closure errors should surface.").to_string(),
			"unexpected body"
		);
	}
}
