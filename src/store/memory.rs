//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord},
	store::{self, CompareAndSwapOutcome, StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<AccountId, TokenRecord>>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of portals currently stored.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no portal has been stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn cas_now(
		map: StoreMap,
		account: AccountId,
		expected_refresh: &str,
		replacement: TokenRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = store::swap_outcome(guard.get(&account), expected_refresh);

		if outcome == CompareAndSwapOutcome::Updated {
			guard.insert(account, replacement);
		}

		outcome
	}
}
impl TokenStore for MemoryStore {
	fn fetch(&self, account: AccountId) -> StoreFuture<'_, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(&account).cloned()) })
	}

	fn upsert(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(record.account, record);

			Ok::<_, StoreError>(())
		})
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: AccountId,
		expected_refresh: &'a str,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, account, expected_refresh, replacement)) })
	}
}
