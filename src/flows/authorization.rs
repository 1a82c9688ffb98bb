//! Install flow: authorize URL, callback parsing, code exchange, and portal discovery.

mod session;

pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenRecord},
	error::ConfigError,
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an install using the configured scopes.
	pub fn start_authorization(&self) -> AuthorizationSession {
		self.start_authorization_with_scopes(self.client.scopes.clone())
	}

	/// Starts an install requesting `scopes`.
	///
	/// The returned session carries a fresh random `state`; persist it (or the whole session)
	/// until the callback arrives.
	pub fn start_authorization_with_scopes(&self, scopes: ScopeSet) -> AuthorizationSession {
		let _span = FlowSpan::new(FlowKind::Authorization, "start_authorization").entered();

		session::build_session(&self.descriptor, &self.client, scopes)
	}

	/// Validates a callback against its session and completes the install.
	pub async fn complete_callback(
		&self,
		session: &AuthorizationSession,
		callback: AuthorizationCallback,
	) -> Result<TokenRecord> {
		if let Some(error) = callback.error.clone() {
			return Err(Error::AuthorizationDenied {
				error,
				description: callback.error_description.clone(),
			});
		}

		session.validate_state(callback.state.as_deref().unwrap_or_default())?;

		let code = callback.into_code()?;

		self.complete_authorization(&code).await
	}

	/// Exchanges an authorization code, discovers the portal, and stores its credentials.
	///
	/// Reinstalling replaces the portal's existing record.
	pub async fn complete_authorization(&self, code: &str) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Authorization;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if code.trim().is_empty() {
					return Err(Error::MissingAuthorizationCode);
				}

				let facade = common::facade(self);
				let issued_at = OffsetDateTime::now_utc();
				let grant = facade.exchange_code(code).await?;
				let info = facade.token_info(grant.access_token.expose()).await?;
				let scopes = if info.scopes.is_empty() {
					grant.scopes.clone().unwrap_or_default()
				} else {
					info.scopes
				};
				let refresh_token = grant
					.refresh_token
					.as_ref()
					.map(|secret| secret.expose().to_owned())
					.unwrap_or_default();
				let record = TokenRecord::builder(info.hub_id)
					.access_token(grant.access_token.expose())
					.refresh_token(refresh_token)
					.issued_at(issued_at)
					.expires_in(grant.expires_in)
					.scopes(scopes)
					.build()
					.map_err(ConfigError::from)?;

				self.store.upsert(record.clone()).await?;
				self.cache.insert(&record);

				Ok(record)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
