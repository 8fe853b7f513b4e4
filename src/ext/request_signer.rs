//! Request signing contract applied to every finished API request.

// self
use crate::{_prelude::*, http::HttpRequest};

/// Boxed future returned by [`RequestSignerExt::sign`].
pub type SignFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Adds authentication material to a fully-built request in place.
///
/// Signing runs after the access-token header is set, so the header is covered by the signature.
/// A failure is final for the attempt; retry policy belongs to the caller.
pub trait RequestSignerExt
where
	Self: Send + Sync,
{
	/// Signs `request` in place.
	fn sign<'a>(&'a self, request: &'a mut HttpRequest) -> SignFuture<'a>;
}

/// Signer used when no role is configured: requests carry the bearer token only.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsigned;
impl RequestSignerExt for Unsigned {
	fn sign<'a>(&'a self, _request: &'a mut HttpRequest) -> SignFuture<'a> {
		Box::pin(async { Ok(()) })
	}
}
