//! Provider descriptor data structures and URL helpers shared by all flows.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// HubSpot authorize page shown to the installing user.
pub const HUBSPOT_AUTHORIZATION_URL: &str = "https://app.hubspot.com/oauth/authorize";
/// HubSpot token endpoint for code exchanges and refreshes.
pub const HUBSPOT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
/// HubSpot token-info endpoint; the access token is appended as the last path segment.
pub const HUBSPOT_TOKEN_INFO_URL: &str = "https://api.hubapi.com/oauth/v1/access-tokens";
/// Origin that relative API targets are resolved against.
pub const HUBSPOT_API_BASE_URL: &str = "https://api.hubapi.com";

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the install flow redirects to.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
	/// Token metadata endpoint used to learn the portal id.
	pub token_info: Url,
	/// Base URL for upstream API calls.
	pub api_base: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Descriptor pointing at HubSpot production endpoints.
	pub fn hubspot() -> Result<Self, ProviderDescriptorError> {
		Self::builder()
			.authorization_endpoint(parse_endpoint("authorization", HUBSPOT_AUTHORIZATION_URL)?)
			.token_endpoint(parse_endpoint("token", HUBSPOT_TOKEN_URL)?)
			.token_info_endpoint(parse_endpoint("token_info", HUBSPOT_TOKEN_INFO_URL)?)
			.api_base(parse_endpoint("api_base", HUBSPOT_API_BASE_URL)?)
			.build()
	}

	/// Token-info URL for the provided access token.
	pub fn token_info_url(&self, access_token: &str) -> Url {
		let mut url = self.endpoints.token_info.clone();

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.pop_if_empty().push(access_token);
		}

		url
	}

	/// Resolves an API target: absolute `http(s)` URLs (scheme matched case-insensitively) are
	/// used verbatim, anything else is appended to the API base.
	pub fn api_url(&self, target: &str) -> Result<Url, ProviderDescriptorError> {
		if let Ok(absolute) = Url::parse(target) {
			if matches!(absolute.scheme(), "http" | "https") {
				return Ok(absolute);
			}
		}

		let base = self.endpoints.api_base.as_str().trim_end_matches('/');
		let joined = if target.starts_with('/') {
			format!("{base}{target}")
		} else {
			format!("{base}/{target}")
		};

		Url::parse(&joined).map_err(|e| ProviderDescriptorError::InvalidUrl {
			endpoint: "api_target",
			reason: e.to_string(),
		})
	}
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ProviderDescriptorError> {
	Url::parse(raw)
		.map_err(|e| ProviderDescriptorError::InvalidUrl { endpoint, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn hubspot_descriptor_matches_production_endpoints() {
		let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");

		assert_eq!(descriptor.endpoints.token.as_str(), HUBSPOT_TOKEN_URL);
		assert_eq!(
			descriptor.token_info_url("abc").as_str(),
			"https://api.hubapi.com/oauth/v1/access-tokens/abc"
		);
		assert_eq!(
			descriptor.token_info_url("token/with space").as_str(),
			"https://api.hubapi.com/oauth/v1/access-tokens/token%2Fwith%20space"
		);
	}

	#[test]
	fn api_targets_resolve_against_the_base() {
		let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");

		assert_eq!(
			descriptor
				.api_url("/crm/v3/objects/contacts?limit=1")
				.expect("Relative target should resolve.")
				.as_str(),
			"https://api.hubapi.com/crm/v3/objects/contacts?limit=1"
		);
		assert_eq!(
			descriptor
				.api_url("crm/v3/owners")
				.expect("Target without a leading slash should resolve.")
				.as_str(),
			"https://api.hubapi.com/crm/v3/owners"
		);
		assert_eq!(
			descriptor
				.api_url("https://api.hubapi.com/files/v3/files")
				.expect("Absolute target should be used verbatim.")
				.as_str(),
			"https://api.hubapi.com/files/v3/files"
		);
	}
}
