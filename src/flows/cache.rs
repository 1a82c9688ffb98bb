//! Process-local access-token cache.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord, TokenSecret},
};

/// Access token kept in memory to avoid store reads on the hot path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
	/// Bearer credential.
	pub access_token: TokenSecret,
	/// Instant at which `access_token` stops being usable.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}
impl From<&TokenRecord> for CachedToken {
	fn from(record: &TokenRecord) -> Self {
		Self { access_token: record.access_token.clone(), expires_at: record.expires_at }
	}
}

#[derive(Debug, Default)]
pub(crate) struct TokenCache(RwLock<HashMap<AccountId, CachedToken>>);
impl TokenCache {
	pub(crate) fn fresh(&self, account: AccountId, instant: OffsetDateTime) -> Option<TokenSecret> {
		self.0
			.read()
			.get(&account)
			.filter(|entry| entry.is_fresh_at(instant))
			.map(|entry| entry.access_token.clone())
	}

	pub(crate) fn insert(&self, record: &TokenRecord) {
		self.0.write().insert(record.account, CachedToken::from(record));
	}

	pub(crate) fn remove(&self, account: AccountId) -> Option<CachedToken> {
		self.0.write().remove(&account)
	}

	pub(crate) fn len(&self) -> usize {
		self.0.read().len()
	}
}
