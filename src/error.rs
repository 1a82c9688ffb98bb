//! Broker-level error types shared across flows, the OAuth client, and stores.

// self
use crate::{_prelude::*, auth::AccountId};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure; transient, retry later.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Client credentials, endpoints, or upstream payload shape are unusable.
	#[error(transparent)]
	MisconfiguredClient(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No token record exists for the account; the portal must reinstall the app.
	#[error("Account {account} has not authorized this app.")]
	NotAuthorized {
		/// Portal without a stored record.
		account: AccountId,
	},
	/// The refresh exchange failed; the stored credentials may have been revoked.
	#[error("Token refresh failed for account {account}.")]
	RefreshFailed {
		/// Portal whose refresh failed.
		account: AccountId,
		/// Underlying exchange failure.
		#[source]
		source: Box<Error>,
	},
	/// The token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the request with status {status:?}: {body}.")]
	ExchangeFailed {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Upstream error body as text.
		body: String,
	},
	/// A success response could not be decoded.
	#[error("Upstream returned an unparseable response: {reason}.")]
	InvalidResponse {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Short description of what failed to decode.
		reason: String,
		/// Structured JSON failure, when the body was JSON-shaped.
		#[source]
		source: Option<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Callback `state` did not match the value issued with the authorize URL.
	#[error("Authorization state does not match the issued session.")]
	InvalidState,
	/// The user or the provider declined the installation.
	#[error("Authorization was denied: {error}.")]
	AuthorizationDenied {
		/// Provider error code.
		error: String,
		/// Optional provider description.
		description: Option<String>,
	},
	/// The callback carried neither an authorization code nor an error.
	#[error("Authorization callback is missing the code parameter.")]
	MissingAuthorizationCode,
}
impl Error {
	/// Returns `true` when the only remedy is sending the portal through the install flow.
	///
	/// A refresh that failed for a transient reason (network, storage) does not qualify.
	pub fn requires_reauthorization(&self) -> bool {
		match self {
			Self::NotAuthorized { .. } => true,
			Self::RefreshFailed { source, .. } => !source.is_retryable(),
			_ => false,
		}
	}

	/// Returns `true` for failures that may succeed when retried later.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Storage(_) | Self::Transport(_) => true,
			Self::RefreshFailed { source, .. } => source.is_retryable(),
			_ => false,
		}
	}

	pub(crate) fn refresh_failed(account: AccountId, source: Error) -> Self {
		Self::RefreshFailed { account, source: Box::new(source) }
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier is empty.
	#[error("Client ID is missing.")]
	MissingClientId,
	/// Client secret is empty.
	#[error("Client secret is missing.")]
	MissingClientSecret,
	/// Redirect URI is empty.
	#[error("Redirect URI is missing.")]
	MissingRedirectUri,
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required environment variable is absent or empty.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// Token-info response did not include `hub_id`.
	#[error("Token info response is missing hub_id.")]
	MissingAccountId,
	/// Provider descriptor or an API target URL is invalid.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint response omitted the refresh token on a code exchange.
	#[error("Token endpoint response is missing a refresh token.")]
	MissingRefreshToken,
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling upstream.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete in time.
	#[error("Upstream request timed out.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling upstream.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn account() -> AccountId {
		AccountId::new(42).expect("Account fixture should be valid.")
	}

	#[test]
	fn boundary_classification_matches_remedies() {
		let not_authorized = Error::NotAuthorized { account: account() };
		let refresh_failed = Error::refresh_failed(
			account(),
			Error::ExchangeFailed {
				status: Some(400),
				body: "{\"status\":\"BAD_REFRESH_TOKEN\"}".into(),
			},
		);
		let transport = Error::from(TransportError::Io(std::io::Error::other("reset")));
		let storage = Error::from(crate::store::StoreError::Backend { message: "down".into() });
		let misconfigured = Error::from(ConfigError::MissingClientId);

		assert!(not_authorized.requires_reauthorization());
		assert!(refresh_failed.requires_reauthorization());
		assert!(!refresh_failed.is_retryable());
		assert!(transport.is_retryable());
		assert!(storage.is_retryable());
		assert!(!misconfigured.is_retryable());
		assert!(!misconfigured.requires_reauthorization());

		let flaky_refresh = Error::refresh_failed(
			account(),
			TransportError::Io(std::io::Error::other("timeout")).into(),
		);

		assert!(flaky_refresh.is_retryable());
		assert!(!flaky_refresh.requires_reauthorization());
	}

	#[test]
	fn refresh_failure_keeps_its_cause() {
		let err = Error::refresh_failed(
			account(),
			Error::ExchangeFailed { status: Some(400), body: "bad".into() },
		);

		assert_eq!(err.to_string(), "Token refresh failed for account 42.");

		let source = StdError::source(&err).expect("Refresh failure should expose its cause.");

		assert!(source.to_string().contains("status Some(400)"));
	}
}
