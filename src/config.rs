//! Client construction parameters, tunables, and their defaults.
//!
//! Everything is passed in memory by the embedding application; nothing is read from files or
//! the environment. [`ClientConfig::builder`] validates the inputs once so the runtime components
//! can rely on them.

pub mod builder;
pub mod endpoint;

pub use builder::*;
pub use endpoint::*;

// crates.io
use oauth2::{ClientId, ClientSecret, RefreshToken};
// self
use crate::{_prelude::*, auth::IamCredential};

/// Safety margin subtracted from token and credential lifetimes before they are replaced.
pub const EXPIRY_DELTA: StdDuration = StdDuration::from_secs(60);
/// Delay before the background refresher retries a failed token fetch.
pub const TOKEN_RETRY_BACKOFF: StdDuration = StdDuration::from_secs(10);
/// Attempts a call makes while the upstream keeps answering HTTP 429.
pub const MAX_RETRY_COUNT: u32 = 20;
/// Delay between throttled attempts when no usable rate hint is present.
pub const DEFAULT_THROTTLE_DELAY: StdDuration = StdDuration::from_secs(1);
/// Per-request timeout of the bundled HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
/// Login With Amazon token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";
/// Global security token service endpoint.
pub const DEFAULT_STS_URL: &str = "https://sts.amazonaws.com";
/// Service name placed in the signing scope of API requests.
pub const SERVICE_EXECUTE_API: &str = "execute-api";

/// Validated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Long-lived refresh grant exchanged for bearer tokens.
	pub refresh_token: RefreshToken,
	/// Token endpoint.
	pub token_url: Url,
	/// API base URL.
	pub endpoint: Url,
	/// Signing region of the API.
	pub region: Region,
	/// Role assumed for request signing; requests go out unsigned when absent.
	pub role: Option<RoleSettings>,
	/// Margin before expiry at which tokens and credentials are replaced.
	pub expiry_delta: StdDuration,
	/// Delay before a failed background token fetch is retried.
	pub token_retry_backoff: StdDuration,
	/// Per-request timeout of the bundled HTTP client.
	pub request_timeout: StdDuration,
	/// Throttling retry policy.
	pub retry: RetryPolicy,
}
impl ClientConfig {
	/// Creates a builder.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::new()
	}
}

/// Role assumed through the security token service to obtain delegated signing credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleSettings {
	/// IAM key pair allowed to assume the role.
	pub iam: IamCredential,
	/// ARN of the role to assume.
	pub role_arn: String,
	/// Security token service endpoint; `None` uses [`DEFAULT_STS_URL`].
	pub sts_url: Option<Url>,
	/// Region in which role-assumption requests are signed.
	pub sts_region: Region,
	/// Requested credential lifetime; the service default applies when `None`.
	pub session_duration: Option<StdDuration>,
}
impl RoleSettings {
	/// Describes a role assumed with the provided IAM key pair.
	pub fn new(iam: IamCredential, role_arn: impl Into<String>) -> Self {
		Self {
			iam,
			role_arn: role_arn.into(),
			sts_url: None,
			sts_region: Region::UsEast1,
			session_duration: None,
		}
	}

	/// Overrides the security token service endpoint and signing region.
	pub fn with_sts(mut self, url: Url, region: Region) -> Self {
		self.sts_url = Some(url);
		self.sts_region = region;

		self
	}

	/// Requests credentials valid for `duration`.
	pub fn with_session_duration(mut self, duration: StdDuration) -> Self {
		self.session_duration = Some(duration);

		self
	}
}

/// Retry policy for throttled (HTTP 429) responses.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	/// Delay policy between throttled attempts.
	pub backoff: ThrottleBackoff,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: MAX_RETRY_COUNT, backoff: ThrottleBackoff::default() }
	}
}

/// Delay applied after a throttled attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum ThrottleBackoff {
	/// Always wait the same duration.
	Fixed(StdDuration),
	/// Wait `1 / rate` seconds using the rate advertised by the upstream, clamped to
	/// `[min, max]`, or `fallback` when the response carries no usable rate.
	RateHint {
		/// Delay used without a rate hint.
		fallback: StdDuration,
		/// Lower clamp.
		min: StdDuration,
		/// Upper clamp.
		max: StdDuration,
	},
}
impl ThrottleBackoff {
	/// Computes the delay for a throttled response advertising `rate_hint` requests per second.
	pub fn delay(&self, rate_hint: Option<f64>) -> StdDuration {
		match (self, rate_hint) {
			(Self::Fixed(delay), _) => *delay,
			(Self::RateHint { fallback, .. }, None) => *fallback,
			(Self::RateHint { min, max, .. }, Some(rate)) =>
				delay_for_rate(rate, StdDuration::from_secs(1)).clamp(*min, *max),
		}
	}
}
impl Default for ThrottleBackoff {
	fn default() -> Self {
		Self::RateHint {
			fallback: DEFAULT_THROTTLE_DELAY,
			min: StdDuration::from_millis(100),
			max: StdDuration::from_secs(60),
		}
	}
}

/// Spacing between calls that keeps `calls` requests within every `per` window.
///
/// Non-positive or non-finite `calls` yields `per`.
pub fn delay_for_rate(calls: f64, per: StdDuration) -> StdDuration {
	if !calls.is_finite() || calls <= 0. {
		return per;
	}

	StdDuration::try_from_secs_f64(per.as_secs_f64() / calls).unwrap_or(per)
}
