//! Storage contracts and built-in store implementations for portal token records.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord},
};

/// Boxed future returned by every [`TokenStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable persistence contract for the one token record each portal owns.
///
/// Implementations are shared between every in-process caller and possibly between
/// processes, so [`TokenStore::compare_and_swap_refresh`] must be atomic with respect to the
/// backend's own writers.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the record stored for `account`; `None` means the portal never installed.
	fn fetch(&self, account: AccountId) -> StoreFuture<'_, Option<TokenRecord>>;

	/// Inserts or fully replaces the record keyed by `record.account`.
	fn upsert(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Replaces the record only if its refresh token still equals `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: AccountId,
		expected_refresh: &'a str,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but another writer already rotated its refresh secret.
	RefreshMismatch,
	/// No record exists for the account.
	Missing,
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

pub(crate) fn swap_outcome(current: Option<&TokenRecord>, expected_refresh: &str) -> CompareAndSwapOutcome {
	match current {
		Some(existing) if existing.refresh_token.expose() == expected_refresh =>
			CompareAndSwapOutcome::Updated,
		Some(_) => CompareAndSwapOutcome::RefreshMismatch,
		None => CompareAndSwapOutcome::Missing,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn swap_outcome_compares_refresh_secrets() {
		let record = TokenRecord::builder(AccountId::new(9).expect("Account fixture should be valid."))
			.access_token("A1")
			.refresh_token("R1")
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Record fixture should build.");

		assert_eq!(swap_outcome(Some(&record), "R1"), CompareAndSwapOutcome::Updated);
		assert_eq!(swap_outcome(Some(&record), "R0"), CompareAndSwapOutcome::RefreshMismatch);
		assert_eq!(swap_outcome(None, "R1"), CompareAndSwapOutcome::Missing);
	}
}
