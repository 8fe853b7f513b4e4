// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	call::{CallContext, CallResult, CallSpec, ErrorList},
	config::RetryPolicy,
	error::{ConfigError, TokenError},
	ext::{AccessTokenSource, RequestSignerExt, inject_access_token},
	http::{self, HttpRequest, HttpResponse, HttpTransport, Request, ResponseMetadata},
	obs::{self, Outcome, Stage, StageSpan},
};

/// Runs [`CallSpec`]s against one endpoint.
///
/// The executor is stateless between calls; it holds only shared handles, so one instance serves
/// every caller task concurrently.
pub struct CallExecutor<C>
where
	C: HttpTransport,
{
	transport: Arc<C>,
	endpoint: Url,
	tokens: Arc<dyn AccessTokenSource>,
	signer: Arc<dyn RequestSignerExt>,
	retry: RetryPolicy,
}
impl<C> CallExecutor<C>
where
	C: HttpTransport,
{
	/// Creates an executor.
	pub fn new(
		transport: Arc<C>,
		endpoint: Url,
		tokens: Arc<dyn AccessTokenSource>,
		signer: Arc<dyn RequestSignerExt>,
		retry: RetryPolicy,
	) -> Self {
		Self { transport, endpoint, tokens, signer, retry }
	}

	/// Base URL every call path is resolved against.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Throttling retry policy.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	/// Executes `spec` without a deadline.
	pub async fn execute<T>(&self, spec: &CallSpec<T>) -> Result<CallResult<T>>
	where
		T: DeserializeOwned,
	{
		self.execute_with(spec, &CallContext::default()).await
	}

	/// Executes `spec`, letting `context` bound the rate-limiter and backoff waits.
	///
	/// Only HTTP 429 is retried. Every other failure, including signing and transport errors,
	/// ends the call immediately.
	pub async fn execute_with<T>(&self, spec: &CallSpec<T>, context: &CallContext) -> Result<CallResult<T>>
	where
		T: DeserializeOwned,
	{
		const STAGE: Stage = Stage::Call;

		let span = StageSpan::new(STAGE, spec.path());

		obs::record_outcome(STAGE, Outcome::Attempt);

		let result = span.instrument(self.run(spec, context)).await;

		match &result {
			Ok(_) => obs::record_outcome(STAGE, Outcome::Success),
			Err(_) => obs::record_outcome(STAGE, Outcome::Failure),
		}

		result
	}

	async fn run<T>(&self, spec: &CallSpec<T>, context: &CallContext) -> Result<CallResult<T>>
	where
		T: DeserializeOwned,
	{
		let template = spec.request(&self.endpoint)?;
		let max_attempts = self.retry.max_attempts.max(1);

		for attempt in 1..=max_attempts {
			if let Some(limiter) = spec.rate_limiter() {
				limiter.acquire(context).await?;
			}

			let response = self.send_once(&template).await?;
			let meta = ResponseMetadata::from_response(&response);

			if !meta.is_throttled() {
				return decode(spec, response, meta);
			}

			obs::record_outcome(Stage::Call, Outcome::Throttled);

			if attempt == max_attempts {
				break;
			}

			let delay = self.retry.backoff.delay(meta.rate_limit);

			obs::log_throttled(attempt, delay, meta.request_id.as_deref());
			context.sleep(delay).await?;
		}

		Err(Error::MaxRetriesExceeded { attempts: max_attempts })
	}

	async fn send_once(&self, template: &HttpRequest) -> Result<HttpResponse> {
		let mut request = clone_request(template)?;

		match self.tokens.access_token() {
			Some(token) if !token.is_empty() => {
				inject_access_token(&mut request, &token)?;
			},
			_ if request.headers().contains_key(http::ACCESS_TOKEN_HEADER) => {},
			_ => return Err(TokenError::Unavailable.into()),
		}

		self.signer.sign(&mut request).await?;
		self.transport.send(request).await.map_err(http::map_transport_error)
	}
}
impl<C> Debug for CallExecutor<C>
where
	C: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallExecutor")
			.field("endpoint", &self.endpoint.as_str())
			.field("retry", &self.retry)
			.finish()
	}
}

fn clone_request(template: &HttpRequest) -> Result<HttpRequest> {
	let mut builder = Request::builder()
		.method(template.method().clone())
		.uri(template.uri().clone())
		.version(template.version());

	if let Some(headers) = builder.headers_mut() {
		headers.extend(template.headers().iter().map(|(name, value)| (name.clone(), value.clone())));
	}

	Ok(builder.body(template.body().clone()).map_err(ConfigError::from)?)
}

fn decode<T>(spec: &CallSpec<T>, response: HttpResponse, meta: ResponseMetadata) -> Result<CallResult<T>>
where
	T: DeserializeOwned,
{
	let status = meta.status;
	let empty = meta.content_length == Some(0) || response.body().is_empty();
	let mut result = CallResult {
		status,
		body: None,
		error_list: None,
		request_id: meta.request_id,
		rate_limit: meta.rate_limit,
	};

	if result.is_success() {
		if !empty {
			result.body = Some(parse_json(status, response.body())?);
		}

		return Ok(result);
	}
	if !spec.parses_error_list() {
		return Err(Error::UnexpectedStatus { status, request_id: result.request_id });
	}
	if !empty {
		result.error_list = Some(parse_json::<ErrorList>(status, response.body())?);
	}

	Ok(result)
}

fn parse_json<T>(status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| Error::Decode { status, source })
}
