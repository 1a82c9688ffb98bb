// self
use portal_broker::{
	_preludet::*,
	provider::{
		HUBSPOT_API_BASE_URL, HUBSPOT_TOKEN_URL, ProviderDescriptor, ProviderDescriptorBuilder,
		ProviderDescriptorError,
	},
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse mock provider URL.")
}

fn secure_builder() -> ProviderDescriptorBuilder {
	ProviderDescriptor::builder()
		.authorization_endpoint(url("https://example.com/oauth/authorize"))
		.token_endpoint(url("https://example.com/oauth/v1/token"))
		.token_info_endpoint(url("https://example.com/oauth/v1/access-tokens"))
		.api_base(url("https://api.example.com"))
}

#[test]
fn descriptor_rejects_insecure_and_missing_endpoints() {
	let err = secure_builder()
		.token_endpoint(url("http://example.com/oauth/v1/token"))
		.build()
		.expect_err("Descriptor builder should reject insecure token endpoints.");

	assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));

	let err = ProviderDescriptor::builder()
		.authorization_endpoint(url("https://example.com/oauth/authorize"))
		.token_endpoint(url("https://example.com/oauth/v1/token"))
		.api_base(url("https://api.example.com"))
		.build()
		.expect_err("Descriptor builder should require a token-info endpoint.");

	assert_eq!(err, ProviderDescriptorError::MissingEndpoint { endpoint: "token_info" });
}

#[test]
fn hubspot_descriptor_points_at_production() {
	let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");

	assert_eq!(descriptor.endpoints.token.as_str(), HUBSPOT_TOKEN_URL);
	assert_eq!(descriptor.endpoints.api_base.as_str().trim_end_matches('/'), HUBSPOT_API_BASE_URL);
	assert_eq!(
		descriptor.token_info_url("abc-123").as_str(),
		"https://api.hubapi.com/oauth/v1/access-tokens/abc-123"
	);
}

#[test]
fn api_targets_resolve_against_the_base() {
	let descriptor = secure_builder().build().expect("Descriptor should build.");

	assert_eq!(
		descriptor
			.api_url("/crm/v3/objects/contacts?limit=10")
			.expect("Relative target should resolve.")
			.as_str(),
		"https://api.example.com/crm/v3/objects/contacts?limit=10"
	);
	assert_eq!(
		descriptor.api_url("crm/v3/owners").expect("Relative target should resolve.").as_str(),
		"https://api.example.com/crm/v3/owners"
	);
	assert_eq!(
		descriptor
			.api_url("https://other.example.com/files/v3/files")
			.expect("Absolute target should be used verbatim.")
			.as_str(),
		"https://other.example.com/files/v3/files"
	);
	assert_eq!(
		descriptor
			.api_url("HTTPS://Other.Example.com/files/v3/files")
			.expect("Upper-case schemes should be treated as absolute.")
			.as_str(),
		"https://other.example.com/files/v3/files"
	);
}
