// std
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Counters describing how the refresher is keeping up with the token endpoint.
///
/// `consecutive_failures` grows while the background loop is stuck in its retry backoff and drops
/// back to zero on the next published token.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	fetches: AtomicU64,
	published: AtomicU64,
	failed: AtomicU64,
	consecutive_failures: AtomicU64,
	// Unix timestamp of the last published token's issue time, 0 before the first.
	last_published: AtomicI64,
}
impl RefreshMetrics {
	/// Token endpoint exchanges started, scheduled or manual.
	pub fn fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Tokens published to the store.
	pub fn published(&self) -> u64 {
		self.published.load(Ordering::Relaxed)
	}

	/// Exchanges that failed, including background ones that were retried.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Failures since the last published token.
	pub fn consecutive_failures(&self) -> u64 {
		self.consecutive_failures.load(Ordering::Relaxed)
	}

	/// Issue time of the most recently published token.
	pub fn last_published_at(&self) -> Option<OffsetDateTime> {
		match self.last_published.load(Ordering::Relaxed) {
			0 => None,
			secs => OffsetDateTime::from_unix_timestamp(secs).ok(),
		}
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshSnapshot {
		RefreshSnapshot {
			fetches: self.fetches(),
			published: self.published(),
			failed: self.failed(),
			consecutive_failures: self.consecutive_failures(),
			last_published_at: self.last_published_at(),
		}
	}

	pub(crate) fn record_fetch(&self) {
		self.fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_published(&self, issued_at: OffsetDateTime) {
		self.published.fetch_add(1, Ordering::Relaxed);
		self.consecutive_failures.store(0, Ordering::Relaxed);
		self.last_published.store(issued_at.unix_timestamp(), Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
		self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSnapshot {
	/// Token endpoint exchanges started.
	pub fetches: u64,
	/// Tokens published to the store.
	pub published: u64,
	/// Failed exchanges.
	pub failed: u64,
	/// Failures since the last published token.
	pub consecutive_failures: u64,
	/// Issue time of the most recently published token.
	pub last_published_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn publication_resets_the_failure_streak() {
		let metrics = RefreshMetrics::default();

		assert_eq!(metrics.snapshot(), RefreshSnapshot::default());

		for _ in 0..3 {
			metrics.record_fetch();
			metrics.record_failure();
		}

		assert_eq!(metrics.consecutive_failures(), 3);

		metrics.record_fetch();
		metrics.record_published(datetime!(2024-01-01 00:00 UTC));

		assert_eq!(
			metrics.snapshot(),
			RefreshSnapshot {
				fetches: 4,
				published: 1,
				failed: 3,
				consecutive_failures: 0,
				last_published_at: Some(datetime!(2024-01-01 00:00 UTC)),
			}
		);
	}
}
