//! Bearer token sources and header injection.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{ACCESS_TOKEN_HEADER, HttpRequest, header::HeaderValue},
};

/// Supplies the bearer token attached to outgoing calls.
///
/// Implementations must answer without waiting on the network.
pub trait AccessTokenSource
where
	Self: Send + Sync,
{
	/// Returns the current token, or `None` when no token has been obtained yet.
	fn access_token(&self) -> Option<TokenSecret>;
}
impl<T> AccessTokenSource for Arc<T>
where
	T: ?Sized + AccessTokenSource,
{
	fn access_token(&self) -> Option<TokenSecret> {
		(**self).access_token()
	}
}

/// Sets the access-token header on `request` unless the caller already supplied one.
///
/// Returns `true` when the header was written.
pub fn inject_access_token(request: &mut HttpRequest, token: &TokenSecret) -> Result<bool> {
	if request.headers().contains_key(ACCESS_TOKEN_HEADER) {
		return Ok(false);
	}

	let mut value = HeaderValue::from_str(token.expose())
		.map_err(|_| ConfigError::InvalidHeaderValue { name: ACCESS_TOKEN_HEADER })?;

	value.set_sensitive(true);
	request.headers_mut().insert(ACCESS_TOKEN_HEADER, value);

	Ok(true)
}
