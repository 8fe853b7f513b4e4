//! Client-level error types shared across token refresh, signing, admission control, and calls.

// self
use crate::{_prelude::*, call::ApiErrors};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Bearer token could not be obtained from the token endpoint.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Delegated signing credential could not be obtained or used.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Structured error list returned by the API.
	#[error(transparent)]
	Api(#[from] ApiErrors),

	/// Every attempt was answered with HTTP 429.
	#[error("Request was throttled on all {attempts} attempts.")]
	MaxRetriesExceeded {
		/// Number of attempts performed before giving up.
		attempts: u32,
	},
	/// API answered with a non-success status and no error list was requested.
	#[error("API call failed with HTTP status {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Upstream request identifier, when supplied.
		request_id: Option<String>,
	},
	/// Successful response body could not be decoded into the requested type.
	#[error("Response body with HTTP status {status} could not be decoded.")]
	Decode {
		/// HTTP status code.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The call was abandoned through its cancellation token.
	#[error("Call was cancelled.")]
	Cancelled,
	/// The call deadline elapsed (or would elapse) before the call could proceed.
	#[error("Call deadline exceeded.")]
	DeadlineExceeded,
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Client configuration failed validation.
	#[error(transparent)]
	InvalidClientConfig(#[from] crate::config::ClientConfigError),
	/// Call path and endpoint do not form a valid URL.
	#[error("Call URL `{url}` is invalid.")]
	InvalidCallUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeaderValue {
		/// Header name.
		name: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	SerializeBody(#[source] serde_json::Error),
	/// Rate limit quota is not usable.
	#[error("Rate limit quota must have a positive finite rate and a burst of at least one (rate = {rate}, burst = {burst}).")]
	InvalidQuota {
		/// Requested refill rate per second.
		rate: f64,
		/// Requested burst capacity.
		burst: u32,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures. The background refresher retries these on its own schedule.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// Token endpoint rejected the refresh grant.
	#[error("Token endpoint rejected the refresh (status {status}): {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// OAuth error code, when supplied.
		error: Option<String>,
		/// Human-readable message assembled from the response.
		message: String,
	},
	/// [`start`](crate::token::TokenRefresher::start) was called on a refresher that already ran.
	#[error("Token refresher was already started.")]
	AlreadyStarted,
	/// A call was attempted before any bearer token was published.
	#[error("No bearer token is available.")]
	Unavailable,
	/// Response parsed but carried no access token.
	#[error("Token response did not contain an access token.")]
	MissingAccessToken,
	/// Response advertised a non-positive lifetime.
	#[error("Token response advertised a non-positive expires_in ({expires_in}).")]
	NonPositiveLifetime {
		/// Raw `expires_in` value.
		expires_in: i64,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON (status {status}).")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
}

/// Delegated credential (role assumption) and signing failures.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Security token service refused the role assumption.
	#[error("Role assumption failed (status {status}): {message}.")]
	AssumeRole {
		/// HTTP status code.
		status: u16,
		/// Service error code, when supplied.
		code: Option<String>,
		/// Human-readable message.
		message: String,
	},
	/// Response did not include a credential set.
	#[error("Role assumption response did not contain credentials.")]
	MissingCredentials,
	/// Credential expiration could not be interpreted.
	#[error("Role assumption returned an unreadable expiration `{raw}`.")]
	InvalidExpiration {
		/// Raw expiration value.
		raw: String,
	},
	/// Security token service responded with malformed JSON.
	#[error("Role assumption returned malformed JSON (status {status}).")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Freshly issued credential already expires within the safety margin.
	#[error("Delegated credential expires at {expiry}, inside the safety margin.")]
	ExpiresWithinMargin {
		/// Expiry instant reported by the service.
		expiry: OffsetDateTime,
	},
	/// Signing key material was rejected by the MAC implementation.
	#[error("Signing key material is invalid.")]
	InvalidSigningKey,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
	/// Transport reported an error without a structured cause.
	#[error("HTTP client error occurred while sending the request: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
