//! Token lifecycle: cached lookups, single-flight refresh, and CAS persistence.
//!
//! [`Broker::access_token`] answers from the in-memory cache while the token is unexpired.
//! Otherwise it takes the account's guard, re-checks the cache (another caller may have just
//! refreshed), reads the store, and refreshes only when the stored token has expired. Rotated
//! credentials are written back with `TokenStore::compare_and_swap_refresh` keyed on the
//! refresh token that was just spent, so concurrent processes cannot silently clobber a
//! newer rotation.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord, TokenSecret},
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CompareAndSwapOutcome,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns an access token for `account` that is unexpired at the time of return.
	///
	/// Fails with [`Error::NotAuthorized`] when the portal never installed the app and with
	/// [`Error::RefreshFailed`] when the refresh exchange is rejected.
	pub async fn access_token(&self, account: AccountId) -> Result<TokenSecret> {
		if let Some(token) = self.cache.fresh(account, OffsetDateTime::now_utc()) {
			self.refresh_metrics.record_cache_hit();

			return Ok(token);
		}

		let span = FlowSpan::new(FlowKind::Refresh, "access_token");

		span.instrument(async move {
			let guard = common::flow_guard(self, account);
			let _singleflight = guard.lock().await;

			if let Some(token) = self.cache.fresh(account, OffsetDateTime::now_utc()) {
				self.refresh_metrics.record_cache_hit();

				return Ok(token);
			}

			let record = common::load_record(self, account).await?;

			if !record.is_expired_at(OffsetDateTime::now_utc()) {
				self.cache.insert(&record);

				return Ok(record.access_token);
			}

			self.refresh_locked(record).await.map(|record| record.access_token)
		})
		.await
	}

	/// Refreshes the account's credentials regardless of expiry.
	pub async fn force_refresh(&self, account: AccountId) -> Result<TokenRecord> {
		let span = FlowSpan::new(FlowKind::Refresh, "force_refresh");

		span.instrument(async move {
			let guard = common::flow_guard(self, account);
			let _singleflight = guard.lock().await;
			let record = common::load_record(self, account).await?;

			self.refresh_locked(record).await
		})
		.await
	}

	/// Drops the cached access token so the next lookup consults the store.
	pub fn invalidate(&self, account: AccountId) {
		self.cache.remove(account);
	}

	/// Replaces a token the upstream API just rejected.
	///
	/// Callers that were rejected concurrently share one refresh: whoever acquires the guard
	/// after the first refresh finds a different, unexpired token and returns it.
	pub(crate) async fn refresh_rejected(
		&self,
		account: AccountId,
		rejected: &TokenSecret,
	) -> Result<TokenSecret> {
		let guard = common::flow_guard(self, account);
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(token) = self.cache.fresh(account, now).filter(|token| token != rejected) {
			return Ok(token);
		}

		let record = common::load_record(self, account).await?;

		if &record.access_token != rejected && !record.is_expired_at(now) {
			self.cache.insert(&record);

			return Ok(record.access_token);
		}

		self.invalidate(account);
		self.refresh_locked(record).await.map(|record| record.access_token)
	}

	/// Runs the refresh protocol. The caller must hold the account's guard.
	async fn refresh_locked(&self, current: TokenRecord) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = self.rotate(current).await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		obs::record_result(KIND, &result);

		result
	}

	async fn rotate(&self, current: TokenRecord) -> Result<TokenRecord> {
		let account = current.account;
		let facade = common::facade(self);
		let grant = facade
			.refresh(current.refresh_token.expose())
			.await
			.map_err(|err| Error::refresh_failed(account, err))?;
		let now = OffsetDateTime::now_utc();
		let expires_at =
			grant.expires_at(now).map_err(|err| Error::refresh_failed(account, err.into()))?;
		let updated =
			current.rotated(grant.access_token.clone(), grant.refresh_token.clone(), expires_at);
		let outcome = self
			.store
			.compare_and_swap_refresh(account, current.refresh_token.expose(), updated.clone())
			.await?;
		let persisted = match outcome {
			CompareAndSwapOutcome::Updated => updated,
			CompareAndSwapOutcome::Missing => {
				self.store.upsert(updated.clone()).await?;

				updated
			},
			CompareAndSwapOutcome::RefreshMismatch => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					account = account.get(),
					"refresh token was rotated by another writer; reconciling with the stored record"
				);

				match self.store.fetch(account).await? {
					Some(existing) if !existing.is_expired_at(now) => existing,
					_ => {
						self.store.upsert(updated.clone()).await?;

						updated
					},
				}
			},
		};

		self.cache.insert(&persisted);

		Ok(persisted)
	}
}
