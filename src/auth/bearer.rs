//! Bearer token snapshots and the single-writer store that publishes them.

// self
use crate::{_prelude::*, auth::TokenSecret, ext::AccessTokenSource};

/// Immutable bearer token issued by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
	value: TokenSecret,
	issued_at: OffsetDateTime,
	lifetime: Duration,
}
impl BearerToken {
	/// Creates a token issued at `issued_at` that stays valid for `lifetime`.
	pub fn new(value: impl Into<TokenSecret>, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		Self { value: value.into(), issued_at, lifetime }
	}

	/// Token value; callers must avoid logging it.
	pub fn value(&self) -> &TokenSecret {
		&self.value
	}

	/// Instant the token endpoint issued the token.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Advertised lifetime.
	pub fn lifetime(&self) -> Duration {
		self.lifetime
	}

	/// Instant past which the upstream rejects the token.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.lifetime
	}

	/// Returns `true` once `instant` reached the expiry instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at()
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerToken")
			.field("value", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

/// Holds the most recently published [`BearerToken`].
///
/// Readers clone an `Arc` snapshot under a short read lock and never wait on the token endpoint.
/// Replacement swaps the whole snapshot, so a reader observes either the previous token or the new
/// one and nothing in between.
#[derive(Debug, Default)]
pub struct AccessTokenStore {
	current: RwLock<Option<Arc<BearerToken>>>,
}
impl AccessTokenStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the current token, returning the previous snapshot.
	pub fn publish(&self, token: impl Into<Arc<BearerToken>>) -> Option<Arc<BearerToken>> {
		self.current.write().replace(token.into())
	}

	/// Returns the current snapshot, if any token has been published.
	pub fn snapshot(&self) -> Option<Arc<BearerToken>> {
		self.current.read().clone()
	}

	/// Returns the current token value, or an empty string before the first publish.
	pub fn current_value(&self) -> String {
		self.current
			.read()
			.as_ref()
			.map(|token| token.value().expose().to_owned())
			.unwrap_or_default()
	}
}
impl AccessTokenSource for AccessTokenStore {
	fn access_token(&self) -> Option<TokenSecret> {
		self.current.read().as_ref().map(|token| token.value().clone())
	}
}
