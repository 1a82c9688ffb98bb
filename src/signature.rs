//! Inbound request authentication for webhook and extension callbacks.
//!
//! The platform signs requests with one of three historical schemes. The header combination
//! selects the scheme, checked in the fixed order v3, v2, v1:
//!
//! | Version | Selected when | Signed material |
//! | --- | --- | --- |
//! | v3 | `X-HubSpot-Signature-v3` and `X-HubSpot-Request-Timestamp` | HMAC-SHA256(secret, method + canonical URI + body + timestamp), base64 |
//! | v2 | `X-HubSpot-Signature-Version: v2` and `X-HubSpot-Signature` | SHA-256(secret + method + URI + body), hex |
//! | v1 | `X-HubSpot-Signature-Version: v1` and `X-HubSpot-Signature` | SHA-256(secret + body), hex |
//!
//! Verification never fails with an error. A request without any signature yields
//! [`SignatureVerdict::missing`], which is distinct from a signed request that fails the check;
//! [`SignatureVerdict::enforce`] turns the verdict into an accept/reject decision.
//!
//! The URI must be the one the platform called, not the one the handler observed after
//! gateway rewriting. [`SignatureVerifier`] delegates that mapping to a [`UrlReconstructor`].

mod canonical;
mod scheme;

pub use canonical::*;
pub use scheme::*;

// std
use std::env;
// crates.io
use oauth2::http::HeaderMap;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	obs::{self, FlowKind, FlowSpan},
};

/// Header carrying the v3 signature.
pub const HEADER_SIGNATURE_V3: &str = "x-hubspot-signature-v3";
/// Header carrying the v3 request timestamp in Unix milliseconds.
pub const HEADER_REQUEST_TIMESTAMP: &str = "x-hubspot-request-timestamp";
/// Header declaring the v1/v2 scheme.
pub const HEADER_SIGNATURE_VERSION: &str = "x-hubspot-signature-version";
/// Header carrying the v1/v2 signature.
pub const HEADER_SIGNATURE: &str = "x-hubspot-signature";
/// Oldest accepted v3 timestamp, relative to now.
pub const MAX_TIMESTAMP_AGE_MS: i64 = 300_000;
/// Environment switch; the value `false` relaxes [`SignaturePolicy`] to `Optional`.
pub const ENV_REQUIRE_SIGNATURE: &str = "REQUIRE_HUBSPOT_SIGNATURE";

/// Signing scheme version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVersion {
	/// Legacy body-only scheme.
	V1,
	/// Method, URI, and body hash.
	V2,
	/// Timestamped HMAC.
	V3,
}
impl SignatureVersion {
	/// Returns the header-level label (`v1`, `v2`, `v3`).
	pub const fn as_str(self) -> &'static str {
		match self {
			SignatureVersion::V1 => "v1",
			SignatureVersion::V2 => "v2",
			SignatureVersion::V3 => "v3",
		}
	}
}
impl Display for SignatureVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of a verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerdict {
	/// Whether the signature matched.
	pub valid: bool,
	/// Scheme selected by the headers; `None` when the request was unsigned.
	pub version: Option<SignatureVersion>,
}
impl SignatureVerdict {
	/// Verdict for a request that carries no recognizable signature.
	pub const fn missing() -> Self {
		Self { valid: false, version: None }
	}

	/// Returns `true` when the headers selected a scheme.
	pub const fn is_signed(&self) -> bool {
		self.version.is_some()
	}

	/// Applies `policy` to the verdict.
	pub fn enforce(self, policy: SignaturePolicy) -> Result<(), SignatureRejection> {
		match (self.version, self.valid) {
			(Some(_), true) => Ok(()),
			(Some(version), false) => Err(SignatureRejection::Invalid { version }),
			(None, _) => match policy {
				SignaturePolicy::Required => Err(SignatureRejection::Missing),
				SignaturePolicy::Optional => Ok(()),
			},
		}
	}

	const fn checked(version: SignatureVersion, valid: bool) -> Self {
		Self { valid, version: Some(version) }
	}
}

/// Whether unsigned requests are acceptable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignaturePolicy {
	/// Unsigned requests are rejected.
	#[default]
	Required,
	/// Unsigned requests pass; signed ones must still verify. Intended for local development.
	Optional,
}
impl SignaturePolicy {
	/// Reads [`ENV_REQUIRE_SIGNATURE`]; anything other than `false` keeps signatures required.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Same as [`SignaturePolicy::from_env`] with an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&'static str) -> Option<String>,
	{
		match lookup(ENV_REQUIRE_SIGNATURE) {
			Some(value) if value.trim() == "false" => SignaturePolicy::Optional,
			_ => SignaturePolicy::Required,
		}
	}
}

/// Reason a request was refused by [`SignatureVerdict::enforce`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum SignatureRejection {
	/// The request is unsigned and the policy requires a signature.
	#[error("Request signature is required.")]
	Missing,
	/// The selected scheme did not verify.
	#[error("Request signature ({version}) is invalid.")]
	Invalid {
		/// Scheme that was checked.
		version: SignatureVersion,
	},
}

/// Request material consumed by a single verification.
#[derive(Clone, Debug)]
pub struct SignatureContext<'a> {
	/// HTTP method as sent by the platform, e.g. `POST`.
	pub method: &'a str,
	/// Externally visible URL the platform called.
	pub uri: String,
	/// Raw body bytes, unmodified.
	pub body: &'a [u8],
	/// Request headers; names match case-insensitively.
	pub headers: &'a HeaderMap,
}
impl<'a> SignatureContext<'a> {
	/// Creates a context from an already external URL.
	pub fn new(
		method: &'a str,
		uri: impl Into<String>,
		body: &'a [u8],
		headers: &'a HeaderMap,
	) -> Self {
		Self { method, uri: uri.into(), body, headers }
	}

	/// Creates a context from the URL the handler received, mapped through `reconstructor`.
	pub fn reconstructed(
		method: &'a str,
		received: &Url,
		reconstructor: &dyn UrlReconstructor,
		body: &'a [u8],
		headers: &'a HeaderMap,
	) -> Self {
		Self::new(method, reconstructor.external_url(received), body, headers)
	}

	fn header(&self, name: &str) -> Option<&'a str> {
		self.headers
			.get(name)
			.and_then(|value| value.to_str().ok())
			.filter(|value| !value.is_empty())
	}
}

/// Verifies `ctx` against the current wall clock.
pub fn verify(ctx: &SignatureContext<'_>, secret: &str) -> SignatureVerdict {
	verify_at(ctx, secret, now_millis())
}

/// Verifies `ctx` as if the current time were `now_ms` Unix milliseconds.
pub fn verify_at(ctx: &SignatureContext<'_>, secret: &str, now_ms: i64) -> SignatureVerdict {
	if let (Some(signature), Some(timestamp)) =
		(ctx.header(HEADER_SIGNATURE_V3), ctx.header(HEADER_REQUEST_TIMESTAMP))
	{
		let valid = is_fresh(timestamp, now_ms)
			&& signatures_match(&sign_v3(secret, ctx.method, &ctx.uri, ctx.body, timestamp), signature);

		return SignatureVerdict::checked(SignatureVersion::V3, valid);
	}

	let Some(signature) = ctx.header(HEADER_SIGNATURE) else {
		return SignatureVerdict::missing();
	};

	match ctx.header(HEADER_SIGNATURE_VERSION) {
		Some("v2") => SignatureVerdict::checked(
			SignatureVersion::V2,
			signatures_match(&sign_v2(secret, ctx.method, &ctx.uri, ctx.body), signature),
		),
		Some("v1") => SignatureVerdict::checked(
			SignatureVersion::V1,
			signatures_match(&sign_v1(secret, ctx.body), signature),
		),
		_ => SignatureVerdict::missing(),
	}
}

/// Client secret plus URL reconstruction, shared by all inbound handlers.
#[derive(Clone)]
pub struct SignatureVerifier {
	secret: TokenSecret,
	reconstructor: Arc<dyn UrlReconstructor>,
}
impl SignatureVerifier {
	/// Verifier that hashes the received URL unchanged.
	pub fn new(secret: impl Into<String>) -> Self {
		Self { secret: TokenSecret::new(secret), reconstructor: Arc::new(AsReceived) }
	}

	/// Verifier keyed by the configured client secret.
	pub fn from_client(client: &ClientConfig) -> Self {
		Self { secret: client.client_secret.clone(), reconstructor: Arc::new(AsReceived) }
	}

	/// Replaces the URL reconstruction strategy.
	pub fn with_reconstructor<R>(mut self, reconstructor: R) -> Self
	where
		R: 'static + UrlReconstructor,
	{
		self.reconstructor = Arc::new(reconstructor);

		self
	}

	/// Verifies a received request against the current wall clock.
	pub fn verify(
		&self,
		method: &str,
		received: &Url,
		headers: &HeaderMap,
		body: &[u8],
	) -> SignatureVerdict {
		self.verify_at(method, received, headers, body, now_millis())
	}

	/// Verifies a received request as if the current time were `now_ms`.
	pub fn verify_at(
		&self,
		method: &str,
		received: &Url,
		headers: &HeaderMap,
		body: &[u8],
		now_ms: i64,
	) -> SignatureVerdict {
		let _span = FlowSpan::new(FlowKind::Signature, "verify").entered();
		let ctx =
			SignatureContext::reconstructed(method, received, self.reconstructor.as_ref(), body, headers);
		let verdict = verify_at(&ctx, self.secret.expose(), now_ms);

		#[cfg(feature = "tracing")]
		{
			if !verdict.valid {
				tracing::debug!(
					version = verdict.version.map_or("none", SignatureVersion::as_str),
					uri = %ctx.uri,
					"request signature did not verify"
				);
			}
		}

		obs::record_signature_verdict(&verdict);

		verdict
	}
}
impl Debug for SignatureVerifier {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("SignatureVerifier").field("secret", &self.secret).finish_non_exhaustive()
	}
}

fn is_fresh(timestamp: &str, now_ms: i64) -> bool {
	match timestamp.trim().parse::<i64>() {
		Ok(issued_ms) => i128::from(now_ms) - i128::from(issued_ms) <= i128::from(MAX_TIMESTAMP_AGE_MS),
		Err(_) => false,
	}
}

fn signatures_match(expected: &str, provided: &str) -> bool {
	constant_time_eq::constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

fn now_millis() -> i64 {
	let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(i64::MAX)
}
