//! Application credentials registered with the platform.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
};

/// Environment variable holding the app's client identifier.
pub const ENV_CLIENT_ID: &str = "HUBSPOT_CLIENT_ID";
/// Environment variable holding the app's client secret.
pub const ENV_CLIENT_SECRET: &str = "HUBSPOT_CLIENT_SECRET";
/// Environment variable holding the registered redirect URI.
pub const ENV_REDIRECT_URI: &str = "HUBSPOT_REDIRECT_URI";
/// Optional environment variable overriding the requested scopes (space separated).
pub const ENV_SCOPES: &str = "HUBSPOT_SCOPES";
/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: &str = "oauth crm.objects.contacts.read crm.objects.contacts.write";

/// Validated client credentials used by every token-endpoint call.
///
/// The client secret doubles as the signing key for inbound request signatures, so it is
/// stored as a [`TokenSecret`] and never rendered by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Public client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Redirect URI registered with the app; sent on every token request.
	pub redirect_uri: Url,
	/// Scopes requested by the install flow.
	pub scopes: ScopeSet,
}
impl ClientConfig {
	/// Validates and assembles a configuration with the default scopes.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: &str,
	) -> Result<Self, ConfigError> {
		let client_id = client_id.into();
		let client_secret = client_secret.into();

		if client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if client_secret.trim().is_empty() {
			return Err(ConfigError::MissingClientSecret);
		}
		if redirect_uri.trim().is_empty() {
			return Err(ConfigError::MissingRedirectUri);
		}

		let redirect_uri = Url::parse(redirect_uri.trim())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let scopes = ScopeSet::from_str(DEFAULT_SCOPES)?;

		Ok(Self { client_id, client_secret: TokenSecret::new(client_secret), redirect_uri, scopes })
	}

	/// Reads the configuration from `HUBSPOT_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Builds the configuration from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&'static str) -> Option<String>,
	{
		let require = |name: &'static str| {
			lookup(name)
				.filter(|value| !value.trim().is_empty())
				.ok_or(ConfigError::MissingEnv { name })
		};
		let config =
			Self::new(require(ENV_CLIENT_ID)?, require(ENV_CLIENT_SECRET)?, &require(ENV_REDIRECT_URI)?)?;

		match lookup(ENV_SCOPES).filter(|value| !value.trim().is_empty()) {
			Some(scopes) => Ok(config.with_scopes(ScopeSet::from_str(&scopes)?)),
			None => Ok(config),
		}
	}

	/// Overrides the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("scopes", &self.scopes)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&'static str, &'static str)]) -> impl Fn(&'static str) -> Option<String> {
		let map: HashMap<&'static str, &'static str> = pairs.iter().copied().collect();

		move |name| map.get(name).map(|value| (*value).to_owned())
	}

	#[test]
	fn construction_fails_fast_on_missing_credentials() {
		assert!(matches!(
			ClientConfig::new("", "secret", "https://app.example.com/callback"),
			Err(ConfigError::MissingClientId)
		));
		assert!(matches!(
			ClientConfig::new("client", " ", "https://app.example.com/callback"),
			Err(ConfigError::MissingClientSecret)
		));
		assert!(matches!(
			ClientConfig::new("client", "secret", ""),
			Err(ConfigError::MissingRedirectUri)
		));
		assert!(matches!(
			ClientConfig::new("client", "secret", "not a url"),
			Err(ConfigError::InvalidRedirect { .. })
		));
	}

	#[test]
	fn lookup_reads_all_variables_and_defaults_scopes() {
		let config = ClientConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "client"),
			(ENV_CLIENT_SECRET, "secret"),
			(ENV_REDIRECT_URI, "https://app.example.com/callback"),
		]))
		.expect("Complete environment should produce a config.");

		assert_eq!(config.client_id, "client");
		assert_eq!(config.client_secret.expose(), "secret");
		assert_eq!(config.scopes.normalized(), "crm.objects.contacts.read crm.objects.contacts.write oauth");
		assert!(!format!("{config:?}").contains("secret\""));

		let scoped = ClientConfig::from_lookup(lookup(&[
			(ENV_CLIENT_ID, "client"),
			(ENV_CLIENT_SECRET, "secret"),
			(ENV_REDIRECT_URI, "https://app.example.com/callback"),
			(ENV_SCOPES, "oauth automation"),
		]))
		.expect("Scope override should parse.");

		assert!(scoped.scopes.contains("automation"));
	}

	#[test]
	fn lookup_names_the_missing_variable() {
		let err = ClientConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "client")]))
			.expect_err("Missing secret should fail.");

		assert!(matches!(err, ConfigError::MissingEnv { name: ENV_CLIENT_SECRET }));
	}
}
