//! Shared helpers for flow implementations.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord},
	flows::Broker,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
};

/// Returns (and creates on demand) the single-flight guard for an account.
pub(crate) fn flow_guard<C, M>(broker: &Broker<C, M>, account: AccountId) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = broker.flow_guards.lock();

	guards.entry(account).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Builds the OAuth facade bound to the broker's transport and credentials.
pub(crate) fn facade<C, M>(broker: &Broker<C, M>) -> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	BasicFacade::from_config(
		&broker.descriptor,
		&broker.client,
		broker.http_client.clone(),
		broker.transport_mapper.clone(),
	)
}

/// Loads the stored record for `account`, mapping absence to [`Error::NotAuthorized`].
pub(crate) async fn load_record<C, M>(broker: &Broker<C, M>, account: AccountId) -> Result<TokenRecord>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker.store.fetch(account).await?.ok_or(Error::NotAuthorized { account })
}
