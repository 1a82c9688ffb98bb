//! Reconstruction of the externally visible request URL.

// self
use crate::_prelude::*;

const V3_DECODED_ESCAPES: [(&str, char); 12] = [
	("3A", ':'),
	("2F", '/'),
	("3F", '?'),
	("40", '@'),
	("21", '!'),
	("24", '$'),
	("27", '\''),
	("28", '('),
	("29", ')'),
	("2A", '*'),
	("2C", ','),
	("3B", ';'),
];

/// Maps the URL a handler received to the URL the platform signed.
///
/// Gateways and edge runtimes often strip a path prefix or terminate TLS before the request
/// reaches the handler; hashing the internal URL then fails every v2/v3 check.
pub trait UrlReconstructor: Send + Sync {
	/// Returns the externally visible URL for `received`.
	fn external_url(&self, received: &Url) -> String;
}
impl<F> UrlReconstructor for F
where
	F: Fn(&Url) -> String + Send + Sync,
{
	fn external_url(&self, received: &Url) -> String {
		self(received)
	}
}

/// Uses the received URL unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AsReceived;
impl UrlReconstructor for AsReceived {
	fn external_url(&self, received: &Url) -> String {
		received.as_str().to_owned()
	}
}

/// Rebuilds `https://{host}{prefix}{path}{?query}`, restoring a prefix the serving layer
/// stripped.
///
/// The port is dropped and the scheme forced to `https`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPrefix {
	/// Prefix without a trailing slash, e.g. `/functions/v1`.
	pub prefix: String,
}
impl PathPrefix {
	/// Creates a reconstructor for `prefix`; a missing leading `/` is added and trailing ones
	/// removed.
	pub fn new(prefix: impl AsRef<str>) -> Self {
		let trimmed = prefix.as_ref().trim_matches('/');
		let prefix = if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") };

		Self { prefix }
	}
}
impl UrlReconstructor for PathPrefix {
	fn external_url(&self, received: &Url) -> String {
		let host = received.host_str().unwrap_or_default();
		let query = received.query().filter(|query| !query.is_empty());
		let mut url = format!("https://{host}{}{}", self.prefix, received.path());

		if let Some(query) = query {
			url.push('?');
			url.push_str(query);
		}

		url
	}
}

/// Decodes the twelve percent-escapes the v3 scheme signs in literal form.
///
/// Matching is case-insensitive; every other escape is left untouched.
pub fn canonicalize_v3_uri(uri: &str) -> String {
	let mut canonical = String::with_capacity(uri.len());
	let mut rest = uri;

	while let Some(pos) = rest.find('%') {
		canonical.push_str(&rest[..pos]);

		let escape = &rest[pos..];

		match escape.get(1..3).and_then(decode_escape) {
			Some(decoded) => {
				canonical.push(decoded);

				rest = &escape[3..];
			},
			None => {
				canonical.push('%');

				rest = &escape[1..];
			},
		}
	}

	canonical.push_str(rest);

	canonical
}

fn decode_escape(code: &str) -> Option<char> {
	V3_DECODED_ESCAPES
		.iter()
		.find(|(escape, _)| escape.eq_ignore_ascii_case(code))
		.map(|(_, decoded)| *decoded)
}
