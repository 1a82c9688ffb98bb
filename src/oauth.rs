//! OAuth exchange client: code exchange, refresh, and token-info lookup.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret,
	EndpointNotSet, EndpointSet, HttpClientError, HttpRequest, HttpResponse, RedirectUrl,
	RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{Method, header},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, ScopeSet, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::FlowKind,
	provider::ProviderDescriptor,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		flow: FlowKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_flow: FlowKind,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::network(std::io::Error::other(message)).into(),
			_ => TransportError::network(std::io::Error::other("unknown HTTP client failure"))
				.into(),
		}
	}
}

/// Successful token-endpoint response, normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` when the server kept the previous one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token.
	pub expires_in: Duration,
	/// Scopes echoed by the server, if any.
	pub scopes: Option<ScopeSet>,
}
impl TokenGrant {
	/// Absolute expiry measured from `issued_at`.
	pub fn expires_at(&self, issued_at: OffsetDateTime) -> Result<OffsetDateTime, ConfigError> {
		issued_at.checked_add(self.expires_in).ok_or(ConfigError::ExpiresInOutOfRange)
	}
}

/// Metadata describing an access token, as reported by the token-info endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
	/// Portal the token was issued for.
	pub hub_id: AccountId,
	/// Scopes granted to the app.
	pub scopes: ScopeSet,
	/// Email of the installing user, when reported.
	pub user: Option<String>,
	/// Portal domain, when reported.
	pub hub_domain: Option<String>,
	/// App identifier, when reported.
	pub app_id: Option<u64>,
}

#[derive(Deserialize)]
struct TokenInfoPayload {
	#[serde(default)]
	hub_id: Option<u64>,
	#[serde(default)]
	scopes: Vec<String>,
	#[serde(default)]
	user: Option<String>,
	#[serde(default)]
	hub_domain: Option<String>,
	#[serde(default)]
	app_id: Option<u64>,
}

pub(crate) trait OAuth2Facade {
	fn exchange_code<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, TokenGrant>;

	fn refresh<'a>(&'a self, refresh_token: &'a str) -> FacadeFuture<'a, TokenGrant>;

	fn token_info<'a>(&'a self, access_token: &'a str) -> FacadeFuture<'a, TokenInfo>;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	redirect_uri: Url,
	descriptor: ProviderDescriptor,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		descriptor: &ProviderDescriptor,
		client: &ClientConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let oauth_client = BasicClient::new(ClientId::new(client.client_id.clone()))
			.set_client_secret(ClientSecret::new(client.client_secret.expose().to_owned()))
			.set_auth_uri(AuthUrl::from_url(descriptor.endpoints.authorization.clone()))
			.set_token_uri(TokenUrl::from_url(descriptor.endpoints.token.clone()))
			.set_redirect_uri(RedirectUrl::from_url(client.redirect_uri.clone()))
			.set_auth_type(AuthType::RequestBody);

		Self {
			oauth_client,
			redirect_uri: client.redirect_uri.clone(),
			descriptor: descriptor.clone(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_code<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						FlowKind::Authorization,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;
			let grant = map_token_response(response)?;

			if grant.refresh_token.is_none() {
				return Err(ConfigError::MissingRefreshToken.into());
			}

			Ok(grant)
		})
	}

	fn refresh<'a>(&'a self, refresh_token: &'a str) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.add_extra_param("redirect_uri", self.redirect_uri.as_str())
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(FlowKind::Refresh, meta.take(), err, self.error_mapper.as_ref())
				})?;

			map_token_response(response)
		})
	}

	fn token_info<'a>(&'a self, access_token: &'a str) -> FacadeFuture<'a, TokenInfo> {
		Box::pin(async move {
			let request = oauth2::http::Request::builder()
				.method(Method::GET)
				.uri(self.descriptor.token_info_url(access_token).as_str())
				.header(header::ACCEPT, "application/json")
				.body(Vec::new())
				.map_err(ConfigError::from)?;
			let response = dispatch(
				self.http_client.as_ref(),
				self.error_mapper.as_ref(),
				FlowKind::Authorization,
				request,
			)
			.await?;
			let status = response.status();

			if !status.is_success() {
				return Err(Error::ExchangeFailed {
					status: Some(status.as_u16()),
					body: String::from_utf8_lossy(response.body()).into_owned(),
				});
			}

			let payload: TokenInfoPayload =
				decode_json(Some(status.as_u16()), response.body(), "token info")?;
			let hub_id = payload
				.hub_id
				.and_then(|id| AccountId::new(id).ok())
				.ok_or(ConfigError::MissingAccountId)?;
			let scopes = ScopeSet::new(payload.scopes).map_err(ConfigError::from)?;

			Ok(TokenInfo {
				hub_id,
				scopes,
				user: payload.user,
				hub_domain: payload.hub_domain,
				app_id: payload.app_id,
			})
		})
	}
}

/// Sends `request` through a fresh instrumented handle, mapping transport failures.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	flow: FlowKind,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());

	handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(flow, meta.take().as_ref(), err))
}

/// Decodes a JSON body with path-aware errors; an empty body decodes as `null`.
pub(crate) fn decode_json<T>(status: Option<u16>, body: &[u8], what: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = if body.iter().all(u8::is_ascii_whitespace) { b"null".as_slice() } else { body };
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| Error::InvalidResponse {
		status,
		reason: format!("{what} body could not be decoded"),
		source: Some(source),
	})
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let scopes = response
		.scopes()
		.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.to_string())))
		.transpose()
		.map_err(ConfigError::from)?;

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
		expires_in: Duration::seconds(expires_in),
		scopes,
	})
}

fn map_request_error<E, M>(
	flow: FlowKind,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);
	let rejected = status.is_some_and(|code| !(200..300).contains(&code));

	match err {
		RequestTokenError::ServerResponse(response) =>
			Error::ExchangeFailed { status, body: server_response_body(&response) },
		RequestTokenError::Request(error) => mapper.map_transport_error(flow, meta.as_ref(), error),
		RequestTokenError::Parse(_, body) if rejected =>
			Error::ExchangeFailed { status, body: String::from_utf8_lossy(&body).into_owned() },
		RequestTokenError::Parse(source, _) => Error::InvalidResponse {
			status,
			reason: "token response could not be decoded".into(),
			source: Some(source),
		},
		RequestTokenError::Other(message) if rejected =>
			Error::ExchangeFailed { status, body: message },
		RequestTokenError::Other(message) =>
			Error::InvalidResponse { status, reason: message, source: None },
	}
}

fn server_response_body(response: &BasicErrorResponse) -> String {
	serde_json::to_string(response).unwrap_or_else(|_| response.error().as_ref().to_owned())
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use oauth2::basic::BasicErrorResponseType;
	// self
	use super::*;

	fn meta(status: u16) -> Option<ResponseMetadata> {
		Some(ResponseMetadata { status: Some(status) })
	}

	fn parse_error() -> serde_path_to_error::Error<serde_json::Error> {
		let mut deserializer = serde_json::Deserializer::from_slice(b"{\"expires_in\":\"soon\"}");

		serde_path_to_error::deserialize::<_, BasicTokenResponse>(&mut deserializer)
			.expect_err("Malformed token payload should fail to decode.")
	}

	#[test]
	fn rejected_status_maps_to_exchange_failure_with_body() {
		let err: BasicRequestTokenError<HttpClientError<ReqwestError>> =
			RequestTokenError::Parse(parse_error(), b"{\"status\":\"BAD_REFRESH_TOKEN\"}".to_vec());
		let mapped =
			map_request_error(FlowKind::Refresh, meta(400), err, &ReqwestTransportErrorMapper);

		match mapped {
			Error::ExchangeFailed { status, body } => {
				assert_eq!(status, Some(400));
				assert!(body.contains("BAD_REFRESH_TOKEN"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn oauth_error_payload_is_kept_as_text() {
		let response = BasicErrorResponse::new(
			BasicErrorResponseType::InvalidGrant,
			Some("code expired".into()),
			None,
		);
		let err: BasicRequestTokenError<HttpClientError<ReqwestError>> =
			RequestTokenError::ServerResponse(response);
		let mapped = map_request_error(
			FlowKind::Authorization,
			meta(400),
			err,
			&ReqwestTransportErrorMapper,
		);

		assert!(
			matches!(mapped, Error::ExchangeFailed { status: Some(400), ref body } if body.contains("invalid_grant"))
		);
	}

	#[test]
	fn success_status_with_bad_payload_is_an_invalid_response() {
		let err: BasicRequestTokenError<HttpClientError<ReqwestError>> =
			RequestTokenError::Parse(parse_error(), b"{}".to_vec());
		let mapped =
			map_request_error(FlowKind::Refresh, meta(200), err, &ReqwestTransportErrorMapper);

		assert!(matches!(mapped, Error::InvalidResponse { status: Some(200), source: Some(_), .. }));

		let other: BasicRequestTokenError<HttpClientError<ReqwestError>> =
			RequestTokenError::Other("unexpected content type".into());

		assert!(matches!(
			map_request_error(FlowKind::Refresh, meta(200), other, &ReqwestTransportErrorMapper),
			Error::InvalidResponse { .. }
		));
	}

	#[test]
	fn decode_json_treats_blank_bodies_as_null() {
		let value: serde_json::Value =
			decode_json(Some(204), b"", "api").expect("Empty body should decode as null.");

		assert!(value.is_null());

		let err = decode_json::<Vec<u8>>(Some(200), b"{\"a\":1}", "api")
			.expect_err("Object should not decode into a list.");

		assert!(matches!(err, Error::InvalidResponse { status: Some(200), .. }));
	}
}
