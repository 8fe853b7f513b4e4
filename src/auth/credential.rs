//! Signing credentials: the long-lived IAM key pair and the delegated credential it assumes.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Long-lived IAM access key pair used only to sign the role-assumption exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IamCredential {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_key: TokenSecret,
}
impl IamCredential {
	/// Builds a key pair.
	pub fn new(access_key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
		Self { access_key_id: access_key_id.into(), secret_key: TokenSecret::new(secret_key) }
	}
}

/// Temporary, role-scoped signing credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedCredential {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_key: TokenSecret,
	/// Session token that must accompany signatures made with a temporary key.
	pub session_token: Option<TokenSecret>,
	/// Instant the credential stops being accepted.
	pub expiry: OffsetDateTime,
}
impl DelegatedCredential {
	/// Returns `true` while the credential is still valid `margin` past `now`.
	pub fn is_usable_at(&self, now: OffsetDateTime, margin: StdDuration) -> bool {
		self.expiry - margin > now
	}
}
