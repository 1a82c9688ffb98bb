// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, auth::ScopeSet, config::ClientConfig, provider::ProviderDescriptor};

const STATE_LEN: usize = 32;

/// Install handshake metadata returned by [`Broker::start_authorization`](crate::flows::Broker::start_authorization).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationSession {
	/// Requested scope set.
	pub scope: ScopeSet,
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI embedded in the authorize URL.
	pub redirect_uri: Url,
	/// Authorize URL the installing user should be sent to.
	pub authorize_url: Url,
}
impl AuthorizationSession {
	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state { Ok(()) } else { Err(Error::InvalidState) }
	}
}

/// Query parameters delivered to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCallback {
	/// Authorization code, present on success.
	pub code: Option<String>,
	/// State echoed back by the provider.
	pub state: Option<String>,
	/// Provider error code, present when the install was declined.
	pub error: Option<String>,
	/// Human-readable provider error description.
	pub error_description: Option<String>,
}
impl AuthorizationCallback {
	/// Parses the callback parameters from the full redirect URL.
	pub fn from_url(url: &Url) -> Self {
		let mut callback = Self::default();

		for (key, value) in url.query_pairs() {
			let slot = match key.as_ref() {
				"code" => &mut callback.code,
				"state" => &mut callback.state,
				"error" => &mut callback.error,
				"error_description" => &mut callback.error_description,
				_ => continue,
			};

			if !value.is_empty() {
				*slot = Some(value.into_owned());
			}
		}

		callback
	}

	/// Returns the authorization code, or the error the provider reported instead.
	pub fn into_code(self) -> Result<String> {
		if let Some(error) = self.error {
			return Err(Error::AuthorizationDenied { error, description: self.error_description });
		}

		self.code.ok_or(Error::MissingAuthorizationCode)
	}
}

pub(super) fn build_session(
	descriptor: &ProviderDescriptor,
	client: &ClientConfig,
	scope: ScopeSet,
) -> AuthorizationSession {
	let state = random_state();
	let authorize_url = build_authorize_url(descriptor, client, &scope, &state);

	AuthorizationSession { scope, state, redirect_uri: client.redirect_uri.clone(), authorize_url }
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client: &ClientConfig,
	scope: &ScopeSet,
	state: &str,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("client_id", &client.client_id);
	pairs.append_pair("redirect_uri", client.redirect_uri.as_str());

	if !scope.is_empty() {
		pairs.append_pair("scope", &scope.normalized());
	}

	pairs.append_pair("state", state);

	drop(pairs);

	url
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn client() -> ClientConfig {
		ClientConfig::new("client-1", "secret-1", "https://app.example.com/oauth/callback")
			.expect("Client fixture should be valid.")
	}

	#[test]
	fn authorize_url_carries_client_redirect_scope_and_state() {
		let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");
		let session = build_session(&descriptor, &client(), client().scopes);
		let pairs: HashMap<String, String> = session.authorize_url.query_pairs().into_owned().collect();

		assert_eq!(session.authorize_url.host_str(), Some("app.hubspot.com"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(
			pairs.get("redirect_uri").map(String::as_str),
			Some("https://app.example.com/oauth/callback")
		);
		assert_eq!(
			pairs.get("scope").map(String::as_str),
			Some("crm.objects.contacts.read crm.objects.contacts.write oauth")
		);
		assert_eq!(pairs.get("state"), Some(&session.state));
		assert_eq!(session.state.len(), STATE_LEN);
		assert!(session.state.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn sessions_use_distinct_states() {
		let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");
		let first = build_session(&descriptor, &client(), ScopeSet::default());
		let second = build_session(&descriptor, &client(), ScopeSet::default());

		assert_ne!(first.state, second.state);
		assert!(first.authorize_url.query_pairs().all(|(key, _)| key != "scope"));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let descriptor = ProviderDescriptor::hubspot().expect("HubSpot descriptor should build.");
		let session = build_session(&descriptor, &client(), ScopeSet::default());

		assert!(session.validate_state(&session.state).is_ok());
		assert!(matches!(session.validate_state("other"), Err(Error::InvalidState)));
	}

	#[test]
	fn callback_parsing_distinguishes_code_error_and_absence() {
		let ok = AuthorizationCallback::from_url(
			&Url::parse("https://app.example.com/oauth/callback?code=abc&state=xyz")
				.expect("Callback URL should parse."),
		);

		assert_eq!(ok.state.as_deref(), Some("xyz"));
		assert_eq!(ok.into_code().expect("Code should be present."), "abc");

		let denied = AuthorizationCallback::from_url(
			&Url::parse(
				"https://app.example.com/oauth/callback?error=access_denied&error_description=User+declined",
			)
			.expect("Callback URL should parse."),
		);

		match denied.into_code() {
			Err(Error::AuthorizationDenied { error, description }) => {
				assert_eq!(error, "access_denied");
				assert_eq!(description.as_deref(), Some("User declined"));
			},
			other => panic!("Unexpected callback outcome: {other:?}."),
		}

		let empty = AuthorizationCallback::from_url(
			&Url::parse("https://app.example.com/oauth/callback?code=").expect("Callback URL should parse."),
		);

		assert!(matches!(empty.into_code(), Err(Error::MissingAuthorizationCode)));
	}
}
