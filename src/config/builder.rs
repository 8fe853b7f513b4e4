//! Validating builder for [`ClientConfig`](crate::config::ClientConfig).

// crates.io
use oauth2::{ClientId, ClientSecret, RefreshToken};
use url::Host;
// self
use crate::{
	_prelude::*,
	config::{
		ClientConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STS_URL, DEFAULT_TOKEN_URL, EXPIRY_DELTA,
		Endpoint, Region, RetryPolicy, RoleSettings, TOKEN_RETRY_BACKOFF, ThrottleBackoff,
	},
};

/// Errors raised while validating a [`ClientConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// A required credential was not supplied or is empty.
	#[error("Missing required credential `{field}`.")]
	MissingCredential {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Custom endpoints have no implied signing region.
	#[error("A region is required when using a custom endpoint.")]
	MissingRegion,
	/// Endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at the local machine.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A duration knob was zero.
	#[error("`{field}` must be greater than zero.")]
	ZeroDuration {
		/// Name of the offending field.
		field: &'static str,
	},
	/// At least one attempt is required per call.
	#[error("`max_attempts` must be at least 1.")]
	ZeroMaxAttempts,
	/// Rate-hint backoff bounds are inverted.
	#[error("Throttle backoff lower bound exceeds the upper bound.")]
	InvalidBackoffBounds,
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
	client_id: Option<String>,
	client_secret: Option<String>,
	refresh_token: Option<String>,
	token_url: Option<Url>,
	endpoint: Option<Endpoint>,
	region: Option<Region>,
	role: Option<RoleSettings>,
	expiry_delta: Option<StdDuration>,
	token_retry_backoff: Option<StdDuration>,
	request_timeout: Option<StdDuration>,
	retry: RetryPolicy,
}
impl ClientConfigBuilder {
	/// Creates an empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the OAuth client identifier and secret.
	pub fn client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
		self.client_id = Some(id.into());
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the long-lived refresh grant.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Overrides the token endpoint.
	pub fn token_url(mut self, url: Url) -> Self {
		self.token_url = Some(url);

		self
	}

	/// Sets the API endpoint. Defaults to [`Endpoint::NorthAmerica`].
	pub fn endpoint(mut self, endpoint: impl Into<Endpoint>) -> Self {
		self.endpoint = Some(endpoint.into());

		self
	}

	/// Sets the signing region. Defaults to the region paired with the endpoint preset.
	pub fn region(mut self, region: impl Into<Region>) -> Self {
		self.region = Some(region.into());

		self
	}

	/// Enables request signing with credentials obtained by assuming `role`.
	pub fn role(mut self, role: RoleSettings) -> Self {
		self.role = Some(role);

		self
	}

	/// Overrides the expiry margin. Defaults to [`EXPIRY_DELTA`].
	pub fn expiry_delta(mut self, delta: StdDuration) -> Self {
		self.expiry_delta = Some(delta);

		self
	}

	/// Overrides the refresher retry delay. Defaults to [`TOKEN_RETRY_BACKOFF`].
	pub fn token_retry_backoff(mut self, backoff: StdDuration) -> Self {
		self.token_retry_backoff = Some(backoff);

		self
	}

	/// Overrides the per-request timeout of the bundled HTTP client.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the attempt budget for throttled calls.
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.retry.max_attempts = attempts;

		self
	}

	/// Overrides the delay policy between throttled attempts.
	pub fn throttle_backoff(mut self, backoff: ThrottleBackoff) -> Self {
		self.retry.backoff = backoff;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let client_id = required("client_id", self.client_id)?;
		let client_secret = required("client_secret", self.client_secret)?;
		let refresh_token = required("refresh_token", self.refresh_token)?;
		let token_url = match self.token_url {
			Some(url) => url,
			None => parse_url("token", DEFAULT_TOKEN_URL)?,
		};
		let endpoint = self.endpoint.unwrap_or(Endpoint::NorthAmerica);
		let region = self.region.or_else(|| endpoint.region()).ok_or(ClientConfigError::MissingRegion)?;
		let endpoint = endpoint
			.base_url()
			.map_err(|source| ClientConfigError::InvalidUrl { endpoint: "api", source })?;
		let config = ClientConfig {
			client_id: ClientId::new(client_id),
			client_secret: ClientSecret::new(client_secret),
			refresh_token: RefreshToken::new(refresh_token),
			token_url,
			endpoint,
			region,
			role: self.role,
			expiry_delta: self.expiry_delta.unwrap_or(EXPIRY_DELTA),
			token_retry_backoff: self.token_retry_backoff.unwrap_or(TOKEN_RETRY_BACKOFF),
			request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
			retry: self.retry,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	fn validate(&self) -> Result<(), ClientConfigError> {
		validate_endpoint("token", &self.token_url)?;
		validate_endpoint("api", &self.endpoint)?;

		if let Some(role) = self.role.as_ref() {
			if role.iam.access_key_id.is_empty() {
				return Err(ClientConfigError::MissingCredential { field: "iam_access_key_id" });
			}
			if role.iam.secret_key.is_empty() {
				return Err(ClientConfigError::MissingCredential { field: "iam_secret_key" });
			}
			if role.role_arn.is_empty() {
				return Err(ClientConfigError::MissingCredential { field: "role_arn" });
			}
			if let Some(url) = role.sts_url.as_ref() {
				validate_endpoint("sts", url)?;
			} else {
				parse_url("sts", DEFAULT_STS_URL)?;
			}
		}

		validate_duration("expiry_delta", self.expiry_delta)?;
		validate_duration("token_retry_backoff", self.token_retry_backoff)?;
		validate_duration("request_timeout", self.request_timeout)?;

		if self.retry.max_attempts == 0 {
			return Err(ClientConfigError::ZeroMaxAttempts);
		}

		match &self.retry.backoff {
			ThrottleBackoff::Fixed(_) => Ok(()),
			ThrottleBackoff::RateHint { min, max, .. } if min > max =>
				Err(ClientConfigError::InvalidBackoffBounds),
			ThrottleBackoff::RateHint { .. } => Ok(()),
		}
	}
}

pub(crate) fn parse_url(name: &'static str, raw: &str) -> Result<Url, ClientConfigError> {
	Url::parse(raw).map_err(|source| ClientConfigError::InvalidUrl { endpoint: name, source })
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ClientConfigError> {
	value.filter(|v| !v.is_empty()).ok_or(ClientConfigError::MissingCredential { field })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ClientConfigError> {
	let loopback = match url.host() {
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		Some(Host::Domain(domain)) => domain == "localhost",
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ClientConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn validate_duration(field: &'static str, value: StdDuration) -> Result<(), ClientConfigError> {
	if value.is_zero() { Err(ClientConfigError::ZeroDuration { field }) } else { Ok(()) }
}
