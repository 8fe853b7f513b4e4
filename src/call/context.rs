//! Per-call cancellation and deadline.

// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Governs how long a single call may wait on admission control and throttling backoff.
///
/// The default context never expires and cannot be cancelled. Cancelling one context has no
/// effect on other calls or on the client.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	cancellation: Option<CancellationToken>,
	deadline: Option<Instant>,
}
impl CallContext {
	/// Creates an unbounded context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Abandons the call once `token` is cancelled.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Fails waits that would end after `deadline`.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Fails waits that would end more than `timeout` from now. A timeout too large to represent
	/// leaves the context without a deadline.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		match Instant::now().checked_add(timeout) {
			Some(deadline) => self.with_deadline(deadline),
			None => self,
		}
	}

	/// Returns the deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Returns `true` once the cancellation token fired.
	pub fn is_cancelled(&self) -> bool {
		self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
	}

	/// Fails fast when the context is already cancelled or past its deadline.
	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			return Err(Error::Cancelled);
		}
		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return Err(Error::DeadlineExceeded);
		}

		Ok(())
	}

	/// Sleeps for `duration` unless the context is cancelled first.
	///
	/// A wait that would end after the deadline fails immediately with
	/// [`Error::DeadlineExceeded`] instead of sleeping.
	pub async fn sleep(&self, duration: StdDuration) -> Result<()> {
		self.check()?;

		if self
			.deadline
			.is_some_and(|deadline| Instant::now().checked_add(duration).is_none_or(|end| end > deadline))
		{
			return Err(Error::DeadlineExceeded);
		}

		tokio::select! {
			biased;
			_ = self.cancelled() => Err(Error::Cancelled),
			_ = tokio::time::sleep(duration) => Ok(()),
		}
	}

	async fn cancelled(&self) {
		match &self.cancellation {
			Some(token) => token.cancelled().await,
			None => std::future::pending::<()>().await,
		}
	}
}
