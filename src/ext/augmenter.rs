//! Strategies that attach an account secret to an outgoing request.

// crates.io
use oauth2::http::header::{CONTENT_LENGTH, HeaderName, InvalidHeaderValue};
// self
use crate::{_prelude::*, auth::AccountSecret};

const WILDCARD: &str = "*";
const DEFAULT_BODY_PATH: [&str; 2] = ["metadata", "secret"];
const DEFAULT_HEADER: &str = "x-dest-info";

/// Attaches the secret of the account to an outgoing request.
pub trait Augmenter
where
	Self: Send + Sync,
{
	/// Mutates `request` so the destination call carries `secret`.
	fn augment(&self, request: &mut HttpRequest, secret: &AccountSecret) -> Result<(), AugmentError>;
}

/// Failures raised while attaching a secret.
#[derive(Debug, ThisError)]
pub enum AugmentError {
	/// There is nothing to attach.
	#[error("Secret is empty.")]
	EmptySecret,
	/// The request body is not a JSON document.
	#[error("Request body is not valid JSON: {source}")]
	Body {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A field on the insertion path cannot hold the next segment.
	#[error("Request body field `{path}` cannot hold the secret path.")]
	Path {
		/// Dotted path of the offending field.
		path: String,
	},
	/// The secret cannot be carried in a header value.
	#[error("Secret is not a valid header value: {source}")]
	Header {
		/// Header encoding failure.
		#[source]
		source: InvalidHeaderValue,
	},
	/// The augmented payload could not be encoded.
	#[error("Augmented payload could not be encoded: {source}")]
	Serialize {
		/// JSON encoding failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Inserts the secret at a field path of the JSON request body.
///
/// Missing objects along the path are created. A `*` segment applies the rest of the path to
/// every element of an array, and numeric segments index into arrays. An empty body is
/// treated as `{}`.
#[derive(Clone, Debug)]
pub struct BodyAugmenter {
	path: Vec<String>,
}
impl BodyAugmenter {
	/// Inserts the secret at `path` instead of `metadata.secret`.
	pub fn with_path<I, S>(path: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { path: path.into_iter().map(Into::into).collect() }
	}
}
impl Default for BodyAugmenter {
	fn default() -> Self {
		Self::with_path(DEFAULT_BODY_PATH)
	}
}
impl Augmenter for BodyAugmenter {
	fn augment(&self, request: &mut HttpRequest, secret: &AccountSecret) -> Result<(), AugmentError> {
		if secret.is_empty() {
			return Err(AugmentError::EmptySecret);
		}

		let mut document = if request.body().iter().all(u8::is_ascii_whitespace) {
			JsonValue::Object(Default::default())
		} else {
			let mut de = serde_json::Deserializer::from_slice(request.body());

			serde_path_to_error::deserialize(&mut de)
				.map_err(|source| AugmentError::Body { source })?
		};

		insert_at(&mut document, &self.path, 0, secret.expose())?;

		let encoded =
			serde_json::to_vec(&document).map_err(|source| AugmentError::Serialize { source })?;

		if request.headers().contains_key(CONTENT_LENGTH) {
			request.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(encoded.len()));
		}

		*request.body_mut() = encoded;

		Ok(())
	}
}

/// Carries the secret in a request header as `{"secret": <secret>}`.
#[derive(Clone, Debug)]
pub struct HeaderAugmenter {
	name: HeaderName,
}
impl HeaderAugmenter {
	/// Uses `name` instead of `x-dest-info`.
	pub fn with_name(name: HeaderName) -> Self {
		Self { name }
	}
}
impl Default for HeaderAugmenter {
	fn default() -> Self {
		Self::with_name(HeaderName::from_static(DEFAULT_HEADER))
	}
}
impl Augmenter for HeaderAugmenter {
	fn augment(&self, request: &mut HttpRequest, secret: &AccountSecret) -> Result<(), AugmentError> {
		if secret.is_empty() {
			return Err(AugmentError::EmptySecret);
		}

		let payload = serde_json::to_string(&serde_json::json!({ "secret": secret.expose() }))
			.map_err(|source| AugmentError::Serialize { source })?;
		let value =
			HeaderValue::from_str(&payload).map_err(|source| AugmentError::Header { source })?;

		request.headers_mut().insert(self.name.clone(), value);

		Ok(())
	}
}

fn insert_at(
	target: &mut JsonValue,
	path: &[String],
	depth: usize,
	secret: &JsonValue,
) -> Result<(), AugmentError> {
	let Some(segment) = path.get(depth) else {
		*target = secret.clone();

		return Ok(());
	};
	let next_is_field = path.get(depth + 1).is_some_and(|next| next != WILDCARD);

	match target {
		JsonValue::Array(items) if segment == WILDCARD => {
			for item in items {
				insert_at(item, path, depth + 1, secret)?;
			}

			Ok(())
		},
		JsonValue::Array(items) => {
			let item = segment
				.parse::<usize>()
				.ok()
				.and_then(|idx| items.get_mut(idx))
				.ok_or_else(|| path_error(path, depth + 1))?;

			insert_at(item, path, depth + 1, secret)
		},
		JsonValue::Object(map) if segment != WILDCARD => {
			let next = map.entry(segment.clone()).or_insert(JsonValue::Null);

			if next.is_null() && next_is_field {
				*next = JsonValue::Object(Default::default());
			}

			insert_at(next, path, depth + 1, secret)
		},
		_ => Err(path_error(path, depth)),
	}
}

fn path_error(path: &[String], depth: usize) -> AugmentError {
	AugmentError::Path { path: path[..depth].join(".") }
}
