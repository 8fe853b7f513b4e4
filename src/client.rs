//! The shared client: one token refresher, one signer, one executor, and one set of rate limiters
//! per instance.
//!
//! [`Client::connect`] fails fast: the first bearer token (and, with a role configured, the first
//! delegated credential) must be obtained before a client exists. Clients never share state, so
//! several of them can live in one process.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	call::{CallContext, CallExecutor, CallResult, CallSpec},
	config::ClientConfig,
	ext::{AccessTokenSource, RequestSignerExt, Unsigned},
	http::HttpTransport,
	rate_limit::{Quota, RateLimiter, RateLimiters},
	sign::{RequestSigner, StsAssumeRole},
	token::{RefreshSettings, RefresherHandle, TokenRefresher},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Authenticated, rate-limited API client.
#[cfg(feature = "reqwest")]
pub struct Client<C = ReqwestHttpClient>
where
	C: HttpTransport,
{
	config: ClientConfig,
	refresher: TokenRefresher<C>,
	handle: Mutex<Option<RefresherHandle>>,
	signer: Option<Arc<RequestSigner>>,
	executor: CallExecutor<C>,
	limiters: RateLimiters,
}
/// Authenticated, rate-limited API client.
#[cfg(not(feature = "reqwest"))]
pub struct Client<C>
where
	C: HttpTransport,
{
	config: ClientConfig,
	refresher: TokenRefresher<C>,
	handle: Mutex<Option<RefresherHandle>>,
	signer: Option<Arc<RequestSigner>>,
	executor: CallExecutor<C>,
	limiters: RateLimiters,
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient> {
	/// Connects with the bundled reqwest transport.
	pub async fn connect(config: ClientConfig) -> Result<Self> {
		let transport = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Self::connect_with_transport(config, Arc::new(transport)).await
	}
}
impl<C> Client<C>
where
	C: HttpTransport,
{
	/// Connects through `transport`.
	///
	/// Fetches the first bearer token and starts the background refresher; with a role
	/// configured, also obtains the first delegated credential. Any failure is returned and
	/// leaves nothing running.
	pub async fn connect_with_transport(config: ClientConfig, transport: Arc<C>) -> Result<Self> {
		let refresher = TokenRefresher::new(transport.clone(), RefreshSettings::from(&config));
		let handle = refresher.start().await?;
		let signer = match config.role.clone() {
			Some(role) => {
				let provider = StsAssumeRole::new(transport.clone(), role)?;
				let signer = RequestSigner::new(Arc::new(provider), config.region.clone())
					.with_expiry_delta(config.expiry_delta);

				signer.refresh().await?;

				Some(Arc::new(signer))
			},
			None => None,
		};
		let request_signer: Arc<dyn RequestSignerExt> = match signer.clone() {
			Some(signer) => signer,
			None => Arc::new(Unsigned),
		};
		let tokens: Arc<dyn AccessTokenSource> = refresher.store().clone();
		let executor = CallExecutor::new(
			transport,
			config.endpoint.clone(),
			tokens,
			request_signer,
			config.retry.clone(),
		);

		Ok(Self {
			config,
			refresher,
			handle: Mutex::new(Some(handle)),
			signer,
			executor,
			limiters: RateLimiters::new(),
		})
	}

	/// Executes `spec` without a deadline.
	pub async fn execute<T>(&self, spec: &CallSpec<T>) -> Result<CallResult<T>>
	where
		T: DeserializeOwned,
	{
		self.executor.execute(spec).await
	}

	/// Executes `spec` under `context`.
	pub async fn execute_with<T>(&self, spec: &CallSpec<T>, context: &CallContext) -> Result<CallResult<T>>
	where
		T: DeserializeOwned,
	{
		self.executor.execute_with(spec, context).await
	}

	/// Returns this client's limiter for `operation`, creating it with `quota` on first use.
	pub fn rate_limiter(&self, operation: &str, quota: Quota) -> Arc<RateLimiter> {
		self.limiters.get_or_insert(operation, quota)
	}

	/// Returns this client's limiter registry.
	pub fn rate_limiters(&self) -> &RateLimiters {
		&self.limiters
	}

	/// Returns the current bearer token value.
	pub fn access_token(&self) -> String {
		self.refresher.current_token()
	}

	/// Returns the token refresher.
	pub fn refresher(&self) -> &TokenRefresher<C> {
		&self.refresher
	}

	/// Returns the request signer, when a role is configured.
	pub fn signer(&self) -> Option<&Arc<RequestSigner>> {
		self.signer.as_ref()
	}

	/// Returns the call executor.
	pub fn executor(&self) -> &CallExecutor<C> {
		&self.executor
	}

	/// Returns the configuration the client was built from.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Stops the background token refresher.
	///
	/// Calls keep working with the last published token. Closing twice is a no-op, and dropping
	/// the client closes it as well.
	pub fn close(&self) {
		if let Some(handle) = self.handle.lock().take() {
			handle.cancel();
		}
	}

	/// Returns `true` once [`close`](Self::close) was called.
	pub fn is_closed(&self) -> bool {
		self.handle.lock().is_none()
	}
}
impl<C> Debug for Client<C>
where
	C: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("endpoint", &self.config.endpoint.as_str())
			.field("region", &self.config.region)
			.field("refresher", &self.refresher)
			.field("signed", &self.signer.is_some())
			.field("closed", &self.is_closed())
			.finish()
	}
}
