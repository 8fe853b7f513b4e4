//! Authenticated call execution for rate-limited REST APIs guarded by OAuth 2.0 bearer tokens and
//! SigV4 request signatures: background token refresh, delegated signing credentials,
//! per-operation token buckets, and throttling-aware retries behind one shared client.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod call;
pub mod client;
pub mod config;
pub mod error;
pub mod ext;
pub mod http;
pub mod obs;
pub mod rate_limit;
pub mod sign;
pub mod token;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests; enabled via `cfg(test)`
	//! or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
	use crate::{
		auth::TokenSecret,
		ext::AccessTokenSource,
		http::{HttpClientError, HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Error emitted by [`ScriptedTransport`] once its script runs dry.
	#[derive(Debug, ThisError)]
	#[error("Scripted transport has no response left.")]
	pub struct ScriptExhausted;

	/// In-memory transport that replays canned responses and records every request it receives.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		responses: Mutex<VecDeque<HttpResponse>>,
		requests: Mutex<Vec<HttpRequest>>,
	}
	impl ScriptedTransport {
		/// Queues a response with the provided status, headers, and body.
		pub fn push(&self, status: u16, headers: &[(&str, &str)], body: impl Into<Vec<u8>>) {
			let mut builder = oauth2::http::Response::builder().status(status);

			for (name, value) in headers {
				builder = builder.header(*name, *value);
			}

			let response =
				builder.body(body.into()).expect("Scripted response fixture should be valid.");

			self.responses.lock().push_back(response);
		}

		/// Queues a JSON response with the provided status.
		pub fn push_json(&self, status: u16, body: &str) {
			self.push(status, &[("content-type", "application/json")], body);
		}

		/// Returns the number of requests observed so far.
		pub fn request_count(&self) -> usize {
			self.requests.lock().len()
		}

		/// Returns a summary (method, URI, headers, body) of every recorded request.
		pub fn recorded(&self) -> Vec<RecordedRequest> {
			self.requests
				.lock()
				.iter()
				.map(|request| RecordedRequest {
					method: request.method().to_string(),
					uri: request.uri().to_string(),
					headers: request
						.headers()
						.iter()
						.map(|(name, value)| {
							(name.to_string(), value.to_str().unwrap_or_default().to_owned())
						})
						.collect(),
					body: request.body().clone(),
				})
				.collect()
		}
	}
	impl HttpTransport for ScriptedTransport {
		type TransportError = ScriptExhausted;

		fn send(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
			Box::pin(async move {
				self.requests.lock().push(request);

				self.responses
					.lock()
					.pop_front()
					.ok_or_else(|| HttpClientError::Reqwest(Box::new(ScriptExhausted)))
			})
		}
	}

	/// Snapshot of a request captured by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// Header pairs in insertion order.
		pub headers: Vec<(String, String)>,
		/// Raw request body.
		pub body: Vec<u8>,
	}
	impl RecordedRequest {
		/// Returns the first value recorded for `name` (case-insensitive).
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value.as_str())
		}
	}

	/// Token source that always hands out the same access token.
	#[derive(Clone, Debug)]
	pub struct StaticTokenSource(pub TokenSecret);
	impl StaticTokenSource {
		/// Wraps the provided token value.
		pub fn new(value: impl Into<String>) -> Self {
			Self(TokenSecret::new(value))
		}
	}
	impl AccessTokenSource for StaticTokenSource {
		fn access_token(&self) -> Option<TokenSecret> {
			Some(self.0.clone())
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
