//! Persisted token records, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ScopeSet, token::secret::TokenSecret},
};

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no (or an empty) access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token accompanies the access token.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry instant cannot be represented.
	#[error("Expiry is outside the supported time range.")]
	ExpiryOutOfRange,
}

/// The single stored credential pair for one portal.
///
/// Exactly one record exists per [`AccountId`]; refreshes mutate it in place through the
/// store's upsert / compare-and-swap operations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Portal the credentials belong to.
	pub account: AccountId,
	/// Short-lived bearer credential; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Long-lived credential that rotates on every refresh.
	pub refresh_token: TokenSecret,
	/// Instant at (and after) which `access_token` is no longer valid.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Scopes granted at install time.
	#[serde(default)]
	pub scopes: ScopeSet,
}
impl TokenRecord {
	/// Returns a builder for the provided account.
	pub fn builder(account: AccountId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(account)
	}

	/// Returns `true` once `instant` has reached the expiry instant.
	///
	/// No skew buffer is applied.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the record is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `instant`; zero once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Produces the record that replaces `self` after a successful rotation.
	pub(crate) fn rotated(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			account: self.account,
			access_token,
			refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
			expires_at,
			scopes: self.scopes.clone(),
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("account", &self.account)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	account: AccountId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scopes: ScopeSet,
}
impl TokenRecordBuilder {
	fn new(account: AccountId) -> Self {
		Self {
			account,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			scopes: ScopeSet::default(),
		}
	}

	/// Sets the instant `expires_in` is measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the granted scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self
			.access_token
			.filter(|secret| !secret.is_empty())
			.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let refresh_token = self
			.refresh_token
			.filter(|secret| !secret.is_empty())
			.ok_or(TokenRecordBuilderError::MissingRefreshToken)?;
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self
				.issued_at
				.unwrap_or_else(OffsetDateTime::now_utc)
				.checked_add(delta)
				.ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			account: self.account,
			access_token,
			refresh_token,
			expires_at,
			scopes: self.scopes,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn account() -> AccountId {
		AccountId::new(555).expect("Account fixture should be valid.")
	}

	#[test]
	fn expiry_is_inclusive_of_the_expiry_instant() {
		let record = TokenRecord::builder(account())
			.access_token("A1")
			.refresh_token("R1")
			.expires_at(macros::datetime!(2025-01-01 01:00 UTC))
			.build()
			.expect("Token record builder should succeed.");

		assert!(!record.is_expired_at(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 01:00:01 UTC)));
		assert_eq!(
			record.remaining_at(macros::datetime!(2025-01-01 00:30 UTC)),
			Duration::minutes(30)
		);
		assert_eq!(record.remaining_at(macros::datetime!(2025-01-01 02:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder(account())
			.access_token("A1")
			.refresh_token("R1")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(1800))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
	}

	#[test]
	fn builder_enforces_credential_pair() {
		let missing_refresh = TokenRecord::builder(account())
			.access_token("A1")
			.expires_in(Duration::minutes(5))
			.build();

		assert_eq!(missing_refresh, Err(TokenRecordBuilderError::MissingRefreshToken));

		let empty_access = TokenRecord::builder(account())
			.access_token("")
			.refresh_token("R1")
			.expires_in(Duration::minutes(5))
			.build();

		assert_eq!(empty_access, Err(TokenRecordBuilderError::MissingAccessToken));

		let no_expiry =
			TokenRecord::builder(account()).access_token("A1").refresh_token("R1").build();

		assert_eq!(no_expiry, Err(TokenRecordBuilderError::MissingExpiry));
	}

	#[test]
	fn builder_rejects_unrepresentable_expiry() {
		let overflow = TokenRecord::builder(account())
			.access_token("A1")
			.refresh_token("R1")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(1_000_000_000_000))
			.build();

		assert_eq!(overflow, Err(TokenRecordBuilderError::ExpiryOutOfRange));
	}

	#[test]
	fn rotation_keeps_previous_refresh_token_when_none_is_issued() {
		let record = TokenRecord::builder(account())
			.access_token("A1")
			.refresh_token("R1")
			.expires_at(macros::datetime!(2025-01-01 00:00 UTC))
			.scopes(ScopeSet::new(["oauth"]).expect("Scope fixture should be valid."))
			.build()
			.expect("Token record builder should succeed.");
		let kept = record.rotated(
			TokenSecret::new("A2"),
			None,
			macros::datetime!(2025-01-01 00:30 UTC),
		);
		let rotated = record.rotated(
			TokenSecret::new("A3"),
			Some(TokenSecret::new("R3")),
			macros::datetime!(2025-01-01 01:00 UTC),
		);

		assert_eq!(kept.refresh_token.expose(), "R1");
		assert_eq!(kept.access_token.expose(), "A2");
		assert_eq!(rotated.refresh_token.expose(), "R3");
		assert_eq!(rotated.scopes, record.scopes);
	}

	#[test]
	fn debug_and_serde_shapes() {
		let record = TokenRecord::builder(account())
			.access_token("A1")
			.refresh_token("R1")
			.expires_at(macros::datetime!(2025-01-01 00:00 UTC))
			.build()
			.expect("Token record builder should succeed.");
		let debug = format!("{record:?}");

		assert!(!debug.contains("A1"));
		assert!(!debug.contains("R1"));

		let json = serde_json::to_value(&record).expect("Record should serialize.");

		assert_eq!(json["account"], 555);
		assert_eq!(json["expires_at"], "2025-01-01T00:00:00Z");

		let back: TokenRecord = serde_json::from_value(json).expect("Record should deserialize.");

		assert_eq!(back, record);
	}
}
