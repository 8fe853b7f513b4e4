// crates.io
use oauth2::{ClientId, ClientSecret, RefreshToken};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessTokenStore, BearerToken, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, TokenError},
	ext::AccessTokenSource,
	http::{self, HttpRequest, HttpTransport, Method, Request, header},
	obs::{self, Outcome, Stage, StageSpan},
	token::{RefreshGrant, RefreshMetrics, parse_token_response, refresh_delay},
};

/// Lifecycle of a [`TokenRefresher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefresherState {
	/// No fetch has succeeded yet.
	Uninitialized,
	/// A fetch is in flight, or the last one failed and a retry is scheduled.
	Fetching,
	/// A token is published and the next fetch is scheduled.
	Active,
	/// The background task was stopped.
	Stopped,
}

/// Inputs of the refresh grant and the refresher's schedule.
#[derive(Clone, Debug)]
pub struct RefreshSettings {
	/// Token endpoint.
	pub token_url: Url,
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Long-lived refresh grant.
	pub refresh_token: RefreshToken,
	/// Margin subtracted from every token lifetime.
	pub expiry_delta: StdDuration,
	/// Delay before a failed fetch is retried.
	pub retry_backoff: StdDuration,
}
impl From<&ClientConfig> for RefreshSettings {
	fn from(config: &ClientConfig) -> Self {
		Self {
			token_url: config.token_url.clone(),
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			refresh_token: config.refresh_token.clone(),
			expiry_delta: config.expiry_delta,
			retry_backoff: config.token_retry_backoff,
		}
	}
}

/// Exchanges the refresh grant for bearer tokens and keeps the store current.
///
/// Clones share the same store, state, and counters.
pub struct TokenRefresher<C>
where
	C: HttpTransport,
{
	inner: Arc<Inner<C>>,
}
impl<C> TokenRefresher<C>
where
	C: HttpTransport,
{
	/// Creates a refresher publishing into a fresh [`AccessTokenStore`].
	pub fn new(transport: Arc<C>, settings: RefreshSettings) -> Self {
		Self::with_store(transport, settings, Arc::new(AccessTokenStore::new()))
	}

	/// Creates a refresher publishing into `store`.
	pub fn with_store(transport: Arc<C>, settings: RefreshSettings, store: Arc<AccessTokenStore>) -> Self {
		Self {
			inner: Arc::new(Inner {
				transport,
				settings,
				store,
				state: Arc::new(Mutex::new(RefresherState::Uninitialized)),
				metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Performs one synchronous fetch, then spawns the background refresh task.
	///
	/// A failed first fetch is returned as-is and nothing is spawned. Must be called from within
	/// a Tokio runtime.
	pub async fn start(&self) -> Result<RefresherHandle> {
		{
			let mut state = self.inner.state.lock();

			if *state != RefresherState::Uninitialized {
				return Err(TokenError::AlreadyStarted.into());
			}

			*state = RefresherState::Fetching;
		}

		let token = match self.inner.fetch().await {
			Ok(token) => token,
			Err(e) => {
				self.inner.set_state(RefresherState::Uninitialized);

				return Err(e);
			},
		};
		let first_delay = refresh_delay(token.lifetime(), self.inner.settings.expiry_delta);

		self.inner.set_state(RefresherState::Active);
		let cancel = CancellationToken::new();
		let task = tokio::spawn(run(self.inner.clone(), cancel.clone(), first_delay));

		obs::log_refresh_scheduled(first_delay);

		Ok(RefresherHandle { cancel, state: self.inner.state.clone(), task: Some(task) })
	}

	/// Fetches and publishes a token immediately, outside the schedule.
	///
	/// The lifecycle state is left untouched, so a refresher warmed up this way can still be
	/// started.
	pub async fn fetch_token(&self) -> Result<Arc<BearerToken>> {
		self.inner.fetch().await
	}

	/// Returns the most recently published token value, or an empty string before the first one.
	pub fn current_token(&self) -> String {
		self.inner.store.current_value()
	}

	/// Returns the store the refresher publishes into.
	pub fn store(&self) -> &Arc<AccessTokenStore> {
		&self.inner.store
	}

	/// Returns the current lifecycle state.
	pub fn state(&self) -> RefresherState {
		*self.inner.state.lock()
	}

	/// Returns the exchange counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}
}
impl<C> Clone for TokenRefresher<C>
where
	C: HttpTransport,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<C> Debug for TokenRefresher<C>
where
	C: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("token_url", &self.inner.settings.token_url.as_str())
			.field("state", &self.state())
			.finish()
	}
}
impl<C> AccessTokenSource for TokenRefresher<C>
where
	C: HttpTransport,
{
	fn access_token(&self) -> Option<TokenSecret> {
		self.inner.store.access_token()
	}
}

/// Stops the background refresh task.
///
/// Stopping is idempotent. Dropping the handle stops the task as well.
#[derive(Debug)]
pub struct RefresherHandle {
	cancel: CancellationToken,
	state: Arc<Mutex<RefresherState>>,
	task: Option<JoinHandle<()>>,
}
impl RefresherHandle {
	/// Signals the task to stop without waiting for it.
	pub fn cancel(&self) {
		self.cancel.cancel();
		*self.state.lock() = RefresherState::Stopped;
	}

	/// Returns `true` once the handle was cancelled.
	pub fn is_stopped(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Stops the task and waits for it to exit.
	pub async fn stop(mut self) {
		self.cancel();

		if let Some(task) = self.task.take() {
			let _ = task.await;
		}
	}
}
impl Drop for RefresherHandle {
	fn drop(&mut self) {
		self.cancel();
	}
}

struct Inner<C>
where
	C: HttpTransport,
{
	transport: Arc<C>,
	settings: RefreshSettings,
	store: Arc<AccessTokenStore>,
	state: Arc<Mutex<RefresherState>>,
	metrics: RefreshMetrics,
}
impl<C> Inner<C>
where
	C: HttpTransport,
{
	async fn fetch(&self) -> Result<Arc<BearerToken>> {
		const STAGE: Stage = Stage::TokenRefresh;

		let span = StageSpan::new(STAGE, "fetch_token");

		obs::record_outcome(STAGE, Outcome::Attempt);
		self.metrics.record_fetch();

		let result = span.instrument(self.exchange()).await;

		match result {
			Ok(token) => {
				let token = Arc::new(token);

				self.store.publish(token.clone());
				self.metrics.record_published(token.issued_at());
				obs::record_outcome(STAGE, Outcome::Success);

				Ok(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_outcome(STAGE, Outcome::Failure);

				Err(e)
			},
		}
	}

	async fn exchange(&self) -> Result<BearerToken> {
		let settings = &self.settings;
		let grant = RefreshGrant::new(
			settings.refresh_token.secret(),
			settings.client_id.as_str(),
			settings.client_secret.secret(),
		);
		let body = serde_json::to_vec(&grant).map_err(ConfigError::SerializeBody)?;
		let request: HttpRequest = Request::builder()
			.method(Method::POST)
			.uri(settings.token_url.as_str())
			.header(header::CONTENT_TYPE, "application/json")
			.header(header::ACCEPT, "application/json")
			.body(body)
			.map_err(ConfigError::from)?;
		let issued_at = OffsetDateTime::now_utc();
		let response =
			self.transport.send(request).await.map_err(http::map_transport_error)?;

		Ok(parse_token_response(response.status().as_u16(), response.body(), issued_at)?)
	}

	fn set_state(&self, next: RefresherState) {
		let mut state = self.state.lock();

		if *state != RefresherState::Stopped {
			*state = next;
		}
	}
}

async fn run<C>(inner: Arc<Inner<C>>, cancel: CancellationToken, mut delay: StdDuration)
where
	C: HttpTransport,
{
	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = tokio::time::sleep(delay) => {},
		}

		inner.set_state(RefresherState::Fetching);

		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			outcome = inner.fetch() => outcome,
		};

		delay = match outcome {
			Ok(token) => {
				let next = refresh_delay(token.lifetime(), inner.settings.expiry_delta);

				inner.set_state(RefresherState::Active);

				obs::log_refresh_scheduled(next);

				next
			},
			Err(e) => {
				obs::log_refresh_failure(&e, inner.settings.retry_backoff);

				inner.settings.retry_backoff
			},
		};
	}

	*inner.state.lock() = RefresherState::Stopped;

	obs::log_refresher_stopped();
}
