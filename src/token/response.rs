//! Token endpoint wire format.

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, TokenSecret},
	error::TokenError,
};

const MIN_REFRESH_DELAY: StdDuration = StdDuration::from_secs(1);

/// JSON body of a `refresh_token` grant.
#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
	grant_type: &'static str,
	refresh_token: &'a str,
	client_id: &'a str,
	client_secret: &'a str,
}
impl<'a> RefreshGrant<'a> {
	/// Builds the grant body for the provided client and refresh token.
	pub fn new(refresh_token: &'a str, client_id: &'a str, client_secret: &'a str) -> Self {
		Self { grant_type: "refresh_token", refresh_token, client_id, client_secret }
	}
}

/// Token endpoint response. Every field is optional on the wire.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
	/// Issued bearer token.
	pub access_token: String,
	/// Refresh grant echoed back by the endpoint.
	pub refresh_token: String,
	/// Token lifetime in seconds.
	pub expires_in: i64,
	/// Token type, `bearer` in practice.
	pub token_type: String,
	/// OAuth error code.
	pub error: Option<String>,
	/// Human-readable error description.
	pub error_description: Option<String>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.field("error", &self.error)
			.field("error_description", &self.error_description)
			.finish()
	}
}

/// Interprets a token endpoint response received with `status`.
///
/// Non-success statuses, an `error` field, an empty `access_token`, and a non-positive
/// `expires_in` are all failures; nothing is published for them.
pub fn parse_token_response(
	status: u16,
	body: &[u8],
	issued_at: OffsetDateTime,
) -> Result<BearerToken, TokenError> {
	let success = (200..300).contains(&status);
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let response: TokenResponse = match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(response) => response,
		Err(_) if !success => {
			return Err(TokenError::Rejected {
				status,
				error: None,
				message: String::from_utf8_lossy(body).trim().chars().take(256).collect(),
			});
		},
		Err(source) => return Err(TokenError::ResponseParse { source, status }),
	};

	if !success || response.error.is_some() {
		let message = response
			.error_description
			.clone()
			.or_else(|| response.error.clone())
			.unwrap_or_else(|| format!("HTTP status {status}"));

		return Err(TokenError::Rejected { status, error: response.error, message });
	}
	if response.access_token.is_empty() {
		return Err(TokenError::MissingAccessToken);
	}
	if response.expires_in <= 0 {
		return Err(TokenError::NonPositiveLifetime { expires_in: response.expires_in });
	}

	Ok(BearerToken::new(
		TokenSecret::new(response.access_token),
		issued_at,
		Duration::seconds(response.expires_in),
	))
}

/// Delay until the next fetch: `lifetime - expiry_delta`, never shorter than one second.
pub fn refresh_delay(lifetime: Duration, expiry_delta: StdDuration) -> StdDuration {
	lifetime.unsigned_abs().saturating_sub(expiry_delta).max(MIN_REFRESH_DELAY)
}
