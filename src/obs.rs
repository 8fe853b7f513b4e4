//! Optional observability helpers for token refresh, credential refresh, and API calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `sp_api.stage` with the `stage` and `op`
//!   fields, plus `warn`/`debug`/`info` events for background failures, throttled attempts, and
//!   refresher shutdown.
//! - Enable `metrics` to increment the `sp_api_stage_total` counter for every
//!   attempt/success/failure/throttled outcome, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Bearer token exchange against the token endpoint.
	TokenRefresh,
	/// Delegated credential exchange against the security token service.
	CredentialRefresh,
	/// One API call, including its throttling retries.
	Call,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::TokenRefresh => "token_refresh",
			Stage::CredentialRefresh => "credential_refresh",
			Stage::Call => "call",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded per stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated to the caller (or logged by the background refresher).
	Failure,
	/// Upstream answered HTTP 429.
	Throttled,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::Throttled => "throttled",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
