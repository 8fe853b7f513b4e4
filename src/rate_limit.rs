//! Token-bucket admission control, one bucket per API operation.
//!
//! Each [`RateLimiter`] starts full at its burst capacity and refills continuously at the quota's
//! rate. Buckets are independent: a client owns its own [`RateLimiters`] registry and nothing is
//! shared between clients or operations.

// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, call::CallContext, error::ConfigError};

/// Sustained rate and burst capacity of one operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quota {
	rate: f64,
	burst: u32,
}
impl Quota {
	/// Allows `rate` requests per second with bursts of up to `burst` requests.
	pub fn per_second(rate: f64, burst: u32) -> Result<Self, ConfigError> {
		if !rate.is_finite() || rate <= 0. || burst == 0 {
			return Err(ConfigError::InvalidQuota { rate, burst });
		}

		Ok(Self { rate, burst })
	}

	/// Allows one request every `interval` with bursts of up to `burst` requests.
	pub fn every(interval: StdDuration, burst: u32) -> Result<Self, ConfigError> {
		if interval.is_zero() {
			return Err(ConfigError::InvalidQuota { rate: f64::INFINITY, burst });
		}

		Self::per_second(1. / interval.as_secs_f64(), burst)
	}

	/// Refill rate in requests per second.
	pub fn rate(&self) -> f64 {
		self.rate
	}

	/// Burst capacity.
	pub fn burst(&self) -> u32 {
		self.burst
	}
}

#[derive(Debug)]
struct Bucket {
	tokens: f64,
	last_refill: Instant,
}

/// Token bucket guarding one operation.
#[derive(Debug)]
pub struct RateLimiter {
	quota: Quota,
	bucket: Mutex<Bucket>,
}
impl RateLimiter {
	/// Creates a full bucket for `quota`.
	pub fn new(quota: Quota) -> Self {
		Self {
			quota,
			bucket: Mutex::new(Bucket { tokens: f64::from(quota.burst), last_refill: Instant::now() }),
		}
	}

	/// Returns the configured quota.
	pub fn quota(&self) -> Quota {
		self.quota
	}

	/// Returns the tokens currently available.
	pub fn available(&self) -> f64 {
		let mut bucket = self.bucket.lock();

		self.refill(&mut bucket, Instant::now());

		bucket.tokens
	}

	/// Takes a token if one is available right now.
	pub fn try_acquire(&self) -> bool {
		self.take_or_wait().is_none()
	}

	/// Waits until a token is available, then takes it.
	///
	/// Fails with [`Error::Cancelled`] when `context` is cancelled while waiting and with
	/// [`Error::DeadlineExceeded`] when the next token would arrive after the deadline. A failed
	/// acquire takes nothing from the bucket.
	pub async fn acquire(&self, context: &CallContext) -> Result<()> {
		loop {
			context.check()?;

			match self.take_or_wait() {
				None => return Ok(()),
				Some(wait) => context.sleep(wait).await?,
			}
		}
	}

	// Returns `None` when a token was taken, otherwise the time until one is available.
	fn take_or_wait(&self) -> Option<StdDuration> {
		let mut bucket = self.bucket.lock();

		self.refill(&mut bucket, Instant::now());

		// Tolerate float drift after sleeping exactly the computed wait.
		if bucket.tokens >= 1. - 1e-9 {
			bucket.tokens = (bucket.tokens - 1.).max(0.);

			None
		} else {
			Some(
				StdDuration::try_from_secs_f64((1. - bucket.tokens) / self.quota.rate)
					.unwrap_or(StdDuration::MAX),
			)
		}
	}

	fn refill(&self, bucket: &mut Bucket, now: Instant) {
		let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();

		bucket.tokens = (bucket.tokens + elapsed * self.quota.rate).min(f64::from(self.quota.burst));
		bucket.last_refill = now;
	}
}

/// Per-client registry of named rate limiters.
#[derive(Debug, Default)]
pub struct RateLimiters {
	limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
}
impl RateLimiters {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the limiter registered under `name`, creating it with `quota` on first use.
	///
	/// The quota of an existing limiter is left untouched.
	pub fn get_or_insert(&self, name: &str, quota: Quota) -> Arc<RateLimiter> {
		if let Some(limiter) = self.get(name) {
			return limiter;
		}

		self.limiters.write().entry(name.to_owned()).or_insert_with(|| Arc::new(RateLimiter::new(quota))).clone()
	}

	/// Returns the limiter registered under `name`.
	pub fn get(&self, name: &str) -> Option<Arc<RateLimiter>> {
		self.limiters.read().get(name).cloned()
	}

	/// Returns the number of registered limiters.
	pub fn len(&self) -> usize {
		self.limiters.read().len()
	}

	/// Returns `true` when no limiter is registered.
	pub fn is_empty(&self) -> bool {
		self.limiters.read().is_empty()
	}
}
