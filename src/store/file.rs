//! File-backed [`TokenStore`] for single-host deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord},
	store::{self, CompareAndSwapOutcome, StoreError, StoreFuture, TokenStore},
};

type Snapshot = BTreeMap<AccountId, TokenRecord>;

/// Persists portal records to a JSON file after each mutation.
///
/// The snapshot is a JSON array of records ordered by account; each write goes to a sibling
/// `.tmp` file which is synced and renamed over the original. The in-memory view only changes
/// once that write succeeds.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, contents: &Snapshot) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let records: Vec<&TokenRecord> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&records).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn fetch(&self, account: AccountId) -> StoreFuture<'_, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(&account).cloned()) })
	}

	fn upsert(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut candidate = guard.clone();

			candidate.insert(record.account, record);
			self.persist(&candidate)?;
			*guard = candidate;

			Ok(())
		})
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		account: AccountId,
		expected_refresh: &'a str,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = store::swap_outcome(guard.get(&account), expected_refresh);

			if outcome == CompareAndSwapOutcome::Updated {
				let mut candidate = guard.clone();

				candidate.insert(account, replacement);
				self.persist(&candidate)?;
				*guard = candidate;
			}

			Ok(outcome)
		})
	}
}

fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
	if !path.exists() {
		return Ok(Snapshot::new());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.is_empty() {
		return Ok(Snapshot::new());
	}

	let records: Vec<TokenRecord> =
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

	Ok(records.into_iter().map(|record| (record.account, record)).collect())
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"portal_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_record(refresh: &str) -> TokenRecord {
		TokenRecord::builder(AccountId::new(62515).expect("Failed to build account fixture."))
			.access_token("access-token")
			.refresh_token(refresh)
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build file-store test record.")
	}

	#[test]
	fn upsert_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let record = build_record("R1");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.upsert(record.clone()))
			.expect("Failed to upsert fixture record to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(record.account))
			.expect("Failed to fetch fixture record from file store.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched, record);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn compare_and_swap_persists_only_matching_rotations() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let original = build_record("R1");
		let account = original.account;

		rt.block_on(store.upsert(original)).expect("Failed to seed file store.");

		let stale = rt
			.block_on(store.compare_and_swap_refresh(account, "R0", build_record("R9")))
			.expect("Stale swap should not error.");

		assert_eq!(stale, CompareAndSwapOutcome::RefreshMismatch);

		let fresh = rt
			.block_on(store.compare_and_swap_refresh(account, "R1", build_record("R2")))
			.expect("Matching swap should not error.");

		assert_eq!(fresh, CompareAndSwapOutcome::Updated);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(account))
			.expect("Fetch should succeed.")
			.expect("Record should survive reopen.");

		assert_eq!(fetched.refresh_token.expose(), "R2");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_writes_leave_the_snapshot_untouched() {
		let dir = temp_path().with_extension("d");
		let path = dir.join("tokens.json");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let original = build_record("R1");
		let account = original.account;

		rt.block_on(store.upsert(original)).expect("Failed to seed file store.");
		fs::remove_dir_all(&dir).expect("Failed to remove the store directory.");
		fs::write(&dir, b"not a directory").expect("Failed to replace the store directory.");

		let swap = rt.block_on(store.compare_and_swap_refresh(account, "R1", build_record("R2")));

		assert!(matches!(swap, Err(StoreError::Backend { .. })));

		let other_account = AccountId::new(777).expect("Failed to build account fixture.");
		let other = TokenRecord::builder(other_account)
			.access_token("access-other")
			.refresh_token("R7")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build file-store test record.");

		assert!(matches!(rt.block_on(store.upsert(other)), Err(StoreError::Backend { .. })));

		let kept = rt
			.block_on(store.fetch(account))
			.expect("Fetch should succeed.")
			.expect("Seeded record should remain.");

		assert_eq!(kept.refresh_token.expose(), "R1");
		assert!(rt.block_on(store.fetch(other_account)).expect("Fetch should succeed.").is_none());

		fs::remove_file(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary placeholder {}: {e}", dir.display())
		});
	}
}
