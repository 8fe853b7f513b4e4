// std
use std::marker::PhantomData;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{ACCESS_TOKEN_HEADER, HttpRequest, Method, Request, header},
	rate_limit::RateLimiter,
};

/// Immutable description of one API call decoding into `T`.
pub struct CallSpec<T> {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	body: Option<Vec<u8>>,
	override_token: Option<TokenSecret>,
	rate_limiter: Option<Arc<RateLimiter>>,
	parse_error_list: bool,
	_response: PhantomData<fn() -> T>,
}
impl<T> CallSpec<T> {
	/// Starts a call description for `method` on `path` (relative to the endpoint, with a leading
	/// slash).
	pub fn builder(method: Method, path: impl Into<String>) -> CallSpecBuilder<T> {
		CallSpecBuilder {
			spec: Self {
				method,
				path: path.into(),
				query: Vec::new(),
				body: None,
				override_token: None,
				rate_limiter: None,
				parse_error_list: false,
				_response: PhantomData,
			},
		}
	}

	/// Shorthand for a `GET` builder.
	pub fn get(path: impl Into<String>) -> CallSpecBuilder<T> {
		Self::builder(Method::GET, path)
	}

	/// Shorthand for a `POST` builder.
	pub fn post(path: impl Into<String>) -> CallSpecBuilder<T> {
		Self::builder(Method::POST, path)
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path relative to the endpoint.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query pairs in insertion order.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// Request body.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Caller-supplied token that replaces the client's bearer token for this call.
	pub fn override_token(&self) -> Option<&TokenSecret> {
		self.override_token.as_ref()
	}

	/// Rate limiter consulted before every attempt.
	pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
		self.rate_limiter.as_ref()
	}

	/// Whether non-2xx bodies are decoded as an error list.
	pub fn parses_error_list(&self) -> bool {
		self.parse_error_list
	}

	/// Resolves the request URL: `endpoint + path`, then the query sorted by key.
	///
	/// Values of the same key keep their insertion order.
	pub fn url(&self, endpoint: &Url) -> Result<Url, ConfigError> {
		let raw = format!("{}{}", endpoint.as_str().trim_end_matches('/'), self.path);
		let mut url =
			Url::parse(&raw).map_err(|source| ConfigError::InvalidCallUrl { url: raw.clone(), source })?;

		if !self.query.is_empty() {
			let mut pairs = self.query.iter().collect::<Vec<_>>();

			pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
			url.query_pairs_mut().clear().extend_pairs(pairs.into_iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		Ok(url)
	}

	/// Builds the HTTP request sent on every attempt.
	///
	/// The override token, when present, is written to the access-token header so the client's
	/// bearer token is never injected over it.
	pub fn request(&self, endpoint: &Url) -> Result<HttpRequest, ConfigError> {
		let url = self.url(endpoint)?;
		let mut builder = Request::builder().method(self.method.clone()).uri(url.as_str());

		if self.body.is_some() {
			builder = builder.header(header::CONTENT_TYPE, "application/json");
		}

		let mut request = builder.body(self.body.clone().unwrap_or_default())?;

		if let Some(token) = self.override_token.as_ref() {
			let mut value = header::HeaderValue::from_str(token.expose())
				.map_err(|_| ConfigError::InvalidHeaderValue { name: ACCESS_TOKEN_HEADER })?;

			value.set_sensitive(true);
			request.headers_mut().insert(ACCESS_TOKEN_HEADER, value);
		}

		Ok(request)
	}
}
impl<T> Clone for CallSpec<T> {
	fn clone(&self) -> Self {
		Self {
			method: self.method.clone(),
			path: self.path.clone(),
			query: self.query.clone(),
			body: self.body.clone(),
			override_token: self.override_token.clone(),
			rate_limiter: self.rate_limiter.clone(),
			parse_error_list: self.parse_error_list,
			_response: PhantomData,
		}
	}
}
impl<T> Debug for CallSpec<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallSpec")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("query", &self.query)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("override_token", &self.override_token)
			.field("rate_limited", &self.rate_limiter.is_some())
			.field("parse_error_list", &self.parse_error_list)
			.finish()
	}
}

/// Builder for [`CallSpec`] values.
#[derive(Debug)]
pub struct CallSpecBuilder<T> {
	spec: CallSpec<T>,
}
impl<T> CallSpecBuilder<T> {
	/// Appends one query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.spec.query.push((key.into(), value.into()));

		self
	}

	/// Appends every pair yielded by `pairs`.
	pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.spec.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Sets a raw JSON body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.spec.body = Some(body.into());

		self
	}

	/// Serializes `body` as the JSON body.
	pub fn json_body<B>(self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(body).map_err(ConfigError::SerializeBody)?;

		Ok(self.body(body))
	}

	/// Sends `token` (usually a restricted data token) instead of the client's bearer token.
	///
	/// An empty token is ignored.
	pub fn override_token(mut self, token: impl Into<String>) -> Self {
		let token = token.into();

		self.spec.override_token = (!token.is_empty()).then(|| TokenSecret::new(token));

		self
	}

	/// Waits on `limiter` before every attempt.
	pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.spec.rate_limiter = Some(limiter);

		self
	}

	/// Decodes non-2xx bodies as an error list instead of failing with the bare status.
	pub fn parse_error_list(mut self, enabled: bool) -> Self {
		self.spec.parse_error_list = enabled;

		self
	}

	/// Finishes the description.
	pub fn build(self) -> CallSpec<T> {
		self.spec
	}
}
