//! Authenticated upstream API calls with a single refresh-and-retry on HTTP 401.

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenSecret},
	error::ConfigError,
	flows::Broker,
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Outbound API request description.
///
/// `target` is either an absolute `http(s)` URL, used verbatim, or a path appended to the
/// descriptor's API base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL or API-relative path.
	pub target: String,
	/// Extra headers applied after the defaults; same-named defaults are replaced.
	pub headers: Vec<(String, String)>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), headers: Vec::new(), body: None }
	}

	/// `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Adds a header.
	///
	/// Supplying `Authorization` replaces the broker's bearer token and disables the
	/// refresh-and-retry on 401.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(|e| Error::InvalidResponse {
			status: None,
			reason: format!("request body could not be serialized: {e}"),
			source: None,
		})?;

		self.body = Some(bytes);

		Ok(self)
	}

	fn overrides_authorization(&self) -> bool {
		self.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION.as_str()))
	}
}

/// Upstream response, returned as received.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON; an empty body decodes as `null`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		oauth::decode_json(Some(self.status.as_u16()), &self.body, "API response")
	}
}
impl From<HttpResponse> for ApiResponse {
	fn from(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Executes `request` on behalf of `account`.
	///
	/// The bearer token comes from [`Broker::access_token`]. If the upstream answers 401, the
	/// token is refreshed once and the request reissued; that second response is final.
	/// Every other status is returned unmodified.
	pub async fn call(&self, account: AccountId, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::ApiCall;

		let span = FlowSpan::new(KIND, "call");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.descriptor.api_url(&request.target).map_err(ConfigError::from)?;
				let token = if request.overrides_authorization() {
					None
				} else {
					Some(self.access_token(account).await?)
				};
				let first = self.send(&url, &request, token.as_ref()).await?;
				let rejected = match token {
					Some(token) if first.status == StatusCode::UNAUTHORIZED => token,
					_ => return Ok(first),
				};

				#[cfg(feature = "tracing")]
				tracing::debug!(account = account.get(), "upstream rejected the bearer token; refreshing once");

				let fresh = self.refresh_rejected(account, &rejected).await?;

				self.send(&url, &request, Some(&fresh)).await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// `GET` returning the decoded JSON body.
	pub async fn get_json<T>(&self, account: AccountId, target: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(account, ApiRequest::get(target)).await?.json()
	}

	/// `POST` with a JSON body, returning the decoded JSON body.
	pub async fn post_json<B, T>(&self, account: AccountId, target: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.call(account, ApiRequest::post(target).with_json(body)?).await?.json()
	}

	/// `PATCH` with a JSON body, returning the decoded JSON body.
	pub async fn patch_json<B, T>(&self, account: AccountId, target: &str, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		self.call(account, ApiRequest::patch(target).with_json(body)?).await?.json()
	}

	/// `DELETE` returning the decoded JSON body (`null` when the upstream sends none).
	pub async fn delete_json<T>(&self, account: AccountId, target: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(account, ApiRequest::delete(target)).await?.json()
	}

	async fn send(
		&self,
		url: &Url,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let http_request = build_http_request(url, request, token)?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			FlowKind::ApiCall,
			http_request,
		)
		.await?;

		Ok(response.into())
	}
}

fn build_http_request(
	url: &Url,
	request: &ApiRequest,
	token: Option<&TokenSecret>,
) -> Result<HttpRequest, ConfigError> {
	let mut http_request = oauth2::http::Request::builder()
		.method(request.method.clone())
		.uri(url.as_str())
		.body(request.body.clone().unwrap_or_default())?;
	let headers = http_request.headers_mut();

	if let Some(token) = token {
		headers.insert(AUTHORIZATION, header_value(&token.bearer())?);
	}

	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

	for (name, value) in &request.headers {
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(oauth2::http::Error::from)?;

		headers.insert(name, header_value(value)?);
	}

	Ok(http_request)
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn caller_headers_replace_defaults() {
		let url = Url::parse("https://api.hubapi.com/crm/v3/objects/contacts")
			.expect("Fixture URL should parse.");
		let request = ApiRequest::post("/crm/v3/objects/contacts")
			.with_header("Content-Type", "application/x-www-form-urlencoded")
			.with_header("X-Trace", "t-1")
			.with_body("a=1");
		let http_request = build_http_request(&url, &request, Some(&TokenSecret::new("A1")))
			.expect("Request should build.");
		let headers = http_request.headers();

		assert_eq!(*http_request.method(), Method::POST);
		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer A1"));
		assert_eq!(
			headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/x-www-form-urlencoded")
		);
		assert_eq!(headers.get_all(CONTENT_TYPE).iter().count(), 1);
		assert_eq!(headers.get("x-trace").and_then(|v| v.to_str().ok()), Some("t-1"));
		assert_eq!(http_request.body(), b"a=1");
	}

	#[test]
	fn caller_authorization_is_detected_case_insensitively() {
		assert!(ApiRequest::get("/x").with_header("authorization", "Bearer other").overrides_authorization());
		assert!(!ApiRequest::get("/x").with_header("X-Auth", "1").overrides_authorization());
	}

	#[test]
	fn invalid_header_names_are_configuration_errors() {
		let url = Url::parse("https://api.hubapi.com/x").expect("Fixture URL should parse.");
		let request = ApiRequest::get("/x").with_header("bad header", "1");

		assert!(matches!(
			build_http_request(&url, &request, None),
			Err(ConfigError::HttpRequest(_))
		));
	}
}
