// self
use crate::{
	_prelude::*,
	provider::{ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// A required endpoint was never configured.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is absent.
		endpoint: &'static str,
	},
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A URL could not be parsed.
	#[error("The {endpoint} URL is invalid: {reason}.")]
	InvalidUrl {
		/// Which endpoint or target failed to parse.
		endpoint: &'static str,
		/// Parser message.
		reason: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug, Default)]
pub struct ProviderDescriptorBuilder {
	/// Authorization endpoint for the install flow.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Token metadata endpoint.
	pub token_info_endpoint: Option<Url>,
	/// Base URL for API calls.
	pub api_base: Option<Url>,
}
impl ProviderDescriptorBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the token-info endpoint.
	pub fn token_info_endpoint(mut self, url: Url) -> Self {
		self.token_info_endpoint = Some(url);

		self
	}

	/// Sets the API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let endpoints = ProviderEndpoints {
			authorization: require("authorization", self.authorization_endpoint)?,
			token: require("token", self.token_endpoint)?,
			token_info: require("token_info", self.token_info_endpoint)?,
			api_base: require("api_base", self.api_base)?,
		};

		Ok(ProviderDescriptor { endpoints })
	}
}

fn require(endpoint: &'static str, url: Option<Url>) -> Result<Url, ProviderDescriptorError> {
	let url = url.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint })?;

	if url.scheme() != "https" {
		return Err(ProviderDescriptorError::InsecureEndpoint { endpoint, url: url.to_string() });
	}

	Ok(url)
}
