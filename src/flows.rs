//! Broker orchestration: install flow, token lifecycle, and authenticated API calls.

pub mod authorization;
pub mod cache;
pub mod common;
pub mod executor;
pub mod lifecycle;

pub use authorization::*;
pub use cache::CachedToken;
pub use executor::*;
pub use lifecycle::*;

// self
use crate::{
	_prelude::*,
	auth::AccountId,
	config::ClientConfig,
	flows::cache::TokenCache,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	provider::ProviderDescriptor,
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Delegated-access broker for one registered app.
///
/// A broker owns the transport, the shared token store, the provider endpoints, and the app
/// credentials. Clones share the in-memory token cache and the per-account single-flight
/// guards, so every clone observes at most one refresh per portal at a time.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Durable store holding one token record per portal.
	pub store: Arc<dyn TokenStore>,
	/// Provider endpoints.
	pub descriptor: ProviderDescriptor,
	/// App credentials and requested scopes.
	pub client: ClientConfig,
	/// Shared counters for refresh outcomes and cache hits.
	pub refresh_metrics: Arc<RefreshMetrics>,
	cache: Arc<TokenCache>,
	// One guard per portal, kept for the broker's lifetime; bounded by the number of installs.
	flow_guards: Arc<Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client: ClientConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			client,
			refresh_metrics: Default::default(),
			cache: Default::default(),
			flow_guards: Default::default(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport (redirects disabled, 30 second timeout).
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		client: ClientConfig,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::new(std::time::Duration::from_secs(30))?;

		Ok(Self::with_http_client(
			store,
			descriptor,
			client,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client", &self.client)
			.field("cached_accounts", &self.cache.len())
			.finish()
	}
}
