//! Transport primitives shared by the token refresher, the role-assumption exchange, and API calls.
//!
//! The module exposes [`HttpTransport`] alongside [`ResponseMetadata`] so embedding crates can plug
//! in custom HTTP stacks (or scripted fakes) without touching the retry, signing, or refresh logic.
//! Requests and responses use the fully-buffered `http` types re-exported by `oauth2`, which keeps
//! request bodies in memory for payload hashing.

pub use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{self, HeaderMap, Method, Request, Response, StatusCode, header},
};

// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Header carrying the bearer (or restricted data) token on every API request.
pub const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";
/// Header carrying the sustained request rate the upstream applied to the operation.
pub const RATE_LIMIT_HEADER: &str = "x-amzn-ratelimit-limit";
/// Header carrying the upstream request identifier.
pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute a fully-buffered request.
///
/// The trait is the client's only dependency on an HTTP implementation. Implementations must be
/// `Send + Sync + 'static` so one transport can be shared by the background refresher, the signer's
/// role-assumption exchange, and every caller task, and the returned futures must be `Send` so
/// calls can hop executors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and buffers the complete response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Metadata extracted from a response for retry and diagnostics decisions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Requests-per-second hint advertised by the upstream, if present and positive.
	pub rate_limit: Option<f64>,
	/// Upstream request identifier.
	pub request_id: Option<String>,
	/// Declared `Content-Length`, when the header is present and numeric.
	pub content_length: Option<u64>,
}
impl ResponseMetadata {
	/// Collects the metadata advertised by `response`.
	pub fn from_response(response: &HttpResponse) -> Self {
		let headers = response.headers();

		Self {
			status: response.status().as_u16(),
			rate_limit: header_str(headers, RATE_LIMIT_HEADER)
				.and_then(|raw| raw.parse::<f64>().ok())
				.filter(|rate| rate.is_finite() && *rate > 0.),
			request_id: header_str(headers, REQUEST_ID_HEADER).map(ToOwned::to_owned),
			content_length: header_str(headers, header::CONTENT_LENGTH.as_str())
				.and_then(|raw| raw.parse::<u64>().ok()),
		}
	}

	/// Returns `true` for HTTP 429.
	pub fn is_throttled(&self) -> bool {
		self.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects and enforces `timeout` per request.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		Box::pin(async move {
			let response =
				self.0.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Converts a transport failure into the client's [`Error`].
pub fn map_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::Network { source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		_ => TransportError::Other { message: "unclassified transport failure".into() }.into(),
	}
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name)?.to_str().ok().map(str::trim)
}
