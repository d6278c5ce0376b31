//! Transport primitives for identity-provider requests.
//!
//! The module exposes crate-owned [`Request`] and [`Response`] values plus the [`Transport`]
//! trait, the pipeline's only dependency on an HTTP stack. Both values are cloneable so the
//! retry stage can replay a request and the logging stage can inspect a response without
//! tying either to a particular client.

// std
use std::ops::Deref;
// crates.io
use ::http::header::RETRY_AFTER;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Status codes a token-issuing endpoint may answer with on success.
pub const SUCCESS_STATUS_CODES: [StatusCode; 2] = [StatusCode::OK, StatusCode::CREATED];

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, TransportError>> + 'a + Send>>;

/// HTTP transport capable of dispatching a single request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many pipelines
/// and be shared across executor threads.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body has been read.
	fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a>;
}

/// Outbound request flowing through the pipeline.
#[derive(Clone, Debug)]
pub struct Request {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Encoded request body.
	pub body: Vec<u8>,
	/// 1-based attempt number, stamped by the retry stage.
	pub attempt: u32,
}
impl Request {
	/// Creates an empty-bodied request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new(), attempt: 1 }
	}

	/// Creates a `POST` carrying an `application/x-www-form-urlencoded` body.
	pub fn form<K, V>(url: Url, pairs: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();
		let mut request = Self::new(Method::POST, url).with_body(body.into_bytes());

		request.headers.insert(
			::http::header::CONTENT_TYPE,
			HeaderValue::from_static("application/x-www-form-urlencoded"),
		);

		request
	}

	/// Replaces the body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Inserts or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}
}

/// Fully buffered response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct Response {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl Response {
	/// Creates a header-less response.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Inserts or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// `true` for exactly 200 and 201.
	pub fn is_success(&self) -> bool {
		SUCCESS_STATUS_CODES.contains(&self.status)
	}

	/// Status line such as `429 Too Many Requests`.
	pub fn status_line(&self) -> String {
		match self.status.canonical_reason() {
			Some(reason) => format!("{} {reason}", self.status.as_u16()),
			None => self.status.as_u16().to_string(),
		}
	}

	/// Deserializes the body as JSON, reporting the failing field path on error.
	pub fn unmarshal_json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Relative delay advertised by the `Retry-After` header, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints return results directly, so the default client does not follow redirects.
/// Configure any custom [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds the platform-standard client used when callers supply no transport.
	pub fn try_default() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
		Box::pin(async move {
			let response = self
				.0
				.request(request.method.clone(), request.url.clone())
				.headers(request.headers.clone())
				.body(request.body.clone())
				.send()
				.await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(Response { status, headers, body })
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_contract_is_exactly_200_and_201() {
		assert!(Response::new(StatusCode::OK, Vec::new()).is_success());
		assert!(Response::new(StatusCode::CREATED, Vec::new()).is_success());
		assert!(!Response::new(StatusCode::ACCEPTED, Vec::new()).is_success());
		assert!(!Response::new(StatusCode::NO_CONTENT, Vec::new()).is_success());
	}

	#[test]
	fn status_line_includes_reason_when_known() {
		let known = Response::new(StatusCode::TOO_MANY_REQUESTS, Vec::new());
		let unknown = Response::new(
			StatusCode::from_u16(599).expect("Status 599 should be constructible."),
			Vec::new(),
		);

		assert_eq!(known.status_line(), "429 Too Many Requests");
		assert_eq!(unknown.status_line(), "599");
	}

	#[test]
	fn retry_after_accepts_seconds_and_ignores_garbage() {
		let seconds = Response::new(StatusCode::TOO_MANY_REQUESTS, Vec::new())
			.with_header(RETRY_AFTER, HeaderValue::from_static("7"));
		let garbage = Response::new(StatusCode::TOO_MANY_REQUESTS, Vec::new())
			.with_header(RETRY_AFTER, HeaderValue::from_static("soon"));
		let past = Response::new(StatusCode::SERVICE_UNAVAILABLE, Vec::new())
			.with_header(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(seconds.retry_after(), Some(Duration::seconds(7)));
		assert_eq!(garbage.retry_after(), None);
		assert_eq!(past.retry_after(), None);
	}

	#[test]
	fn form_request_encodes_pairs() {
		let request = Request::form(
			Url::parse("https://login.example.com/tenant/oauth2/v2.0/token")
				.expect("Token URL should parse."),
			[("grant_type", "client_credentials"), ("scope", "api://x/.default")],
		);

		assert_eq!(request.method, Method::POST);
		assert_eq!(request.body, b"grant_type=client_credentials&scope=api%3A%2F%2Fx%2F.default");
		assert_eq!(
			request.headers.get(::http::header::CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/x-www-form-urlencoded")),
		);
	}
}
