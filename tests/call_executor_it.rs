// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use sp_api_client::{
	_preludet::*,
	auth::{AccessTokenStore, DelegatedCredential, TokenSecret},
	call::{CallContext, CallExecutor, CallSpec},
	config::{Region, RetryPolicy, ThrottleBackoff},
	error::TokenError,
	ext::{AccessTokenSource, Unsigned},
	rate_limit::{Quota, RateLimiter},
	sign::{CredentialFuture, CredentialProvider, RequestSigner, sigv4},
};

#[derive(Debug, Deserialize, PartialEq)]
struct Report {
	#[serde(rename = "reportId")]
	report_id: String,
}

#[derive(Debug, Deserialize)]
struct Payload<T> {
	payload: T,
}

struct FixedCredential;
impl CredentialProvider for FixedCredential {
	fn credential(&self) -> CredentialFuture<'_> {
		Box::pin(async {
			Ok(DelegatedCredential {
				access_key_id: "ASIAEXAMPLE".into(),
				secret_key: TokenSecret::new("temporary-secret"),
				session_token: Some(TokenSecret::new("temporary-session")),
				expiry: OffsetDateTime::now_utc() + Duration::hours(1),
			})
		})
	}
}

const REPORT: &str = r#"{"payload":{"reportId":"ID323"}}"#;

fn executor_with(
	tokens: Arc<dyn AccessTokenSource>,
	retry: RetryPolicy,
) -> (Arc<ScriptedTransport>, CallExecutor<ScriptedTransport>) {
	let transport = Arc::new(ScriptedTransport::default());
	let endpoint =
		Url::parse("https://sellingpartnerapi-na.amazon.com").expect("Endpoint fixture should parse.");
	let executor = CallExecutor::new(transport.clone(), endpoint, tokens, Arc::new(Unsigned), retry);

	(transport, executor)
}

fn executor(max_attempts: u32) -> (Arc<ScriptedTransport>, CallExecutor<ScriptedTransport>) {
	executor_with(
		Arc::new(StaticTokenSource::new("ACCESS-TOKEN-XY")),
		RetryPolicy { max_attempts, backoff: ThrottleBackoff::Fixed(StdDuration::from_secs(1)) },
	)
}

fn report_spec() -> CallSpec<Payload<Report>> {
	CallSpec::get("/reports/2021-06-30/reports/ID323").build()
}

#[tokio::test(start_paused = true)]
async fn throttled_attempts_are_retried_after_a_delay() {
	let (transport, executor) = executor(20);

	transport.push(429, &[], "");
	transport.push(429, &[], "");
	transport.push_json(200, REPORT);

	let started = Instant::now();
	let result = executor.execute(&report_spec()).await.expect("Call should succeed after retries.");
	let elapsed = started.elapsed();

	assert_eq!(transport.request_count(), 3);
	assert!(elapsed >= StdDuration::from_secs(2) && elapsed < StdDuration::from_secs(3), "{elapsed:?}");
	assert_eq!(result.status, 200);
	assert_eq!(
		result.into_body().expect("Body should be available.").map(|body| body.payload),
		Some(Report { report_id: "ID323".into() })
	);
}

#[tokio::test(start_paused = true)]
async fn rate_hint_drives_the_throttle_delay() {
	let (transport, executor) = executor_with(
		Arc::new(StaticTokenSource::new("ACCESS-TOKEN-XY")),
		RetryPolicy::default(),
	);

	transport.push(429, &[("x-amzn-RateLimit-Limit", "0.5")], "");
	transport.push_json(200, REPORT);

	let started = Instant::now();

	executor.execute(&report_spec()).await.expect("Call should succeed after one retry.");

	let elapsed = started.elapsed();

	assert!(elapsed >= StdDuration::from_secs(2) && elapsed < StdDuration::from_secs(3), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn persistent_throttling_exhausts_the_attempts() {
	let (transport, executor) = executor(3);

	for _ in 0..3 {
		transport.push(429, &[("x-amzn-RequestId", "req-throttled")], "");
	}

	let err = executor.execute(&report_spec()).await.expect_err("Call should give up.");

	assert!(matches!(err, Error::MaxRetriesExceeded { attempts: 3 }));
	assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn empty_bodies_decode_to_none() {
	let (transport, executor) = executor(1);

	transport.push(204, &[], "");
	transport.push(200, &[("content-length", "0")], "");

	for status in [204, 200] {
		let result = executor.execute(&report_spec()).await.expect("Empty response should succeed.");

		assert_eq!(result.status, status);
		assert!(result.body.is_none());
	}
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
	let (transport, executor) = executor(1);

	transport.push_json(200, r#"{"payload":{"reportId":42}}"#);

	let err = executor.execute(&report_spec()).await.expect_err("Malformed body should fail.");

	match err {
		Error::Decode { status, source } => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "payload.reportId");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn error_list_is_returned_when_requested() {
	let (transport, executor) = executor(1);

	transport.push(
		400,
		&[("content-type", "application/json"), ("x-amzn-RequestId", "req-400")],
		r#"{"errors":[{"code":"InvalidInput","message":"Invalid marketplaceIds","details":""}]}"#,
	);

	let spec = CallSpec::<Payload<Report>>::get("/reports/2021-06-30/reports")
		.query("marketplaceIds", "ATVPDKIKX0DER")
		.parse_error_list(true)
		.build();
	let result = executor.execute(&spec).await.expect("Error list should be returned as a result.");

	assert!(result.is_error());
	assert_eq!(result.request_id.as_deref(), Some("req-400"));
	assert_eq!(result.error_summary().as_deref(), Some("InvalidInput: Invalid marketplaceIds"));

	let err = result.into_body().expect_err("Error result should convert into an error.");

	match err {
		Error::Api(errors) => {
			assert_eq!(errors.status, 400);
			assert_eq!(errors.errors[0].code, "InvalidInput");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn non_success_without_error_list_fails() {
	let (transport, executor) = executor(1);

	transport.push_json(403, r#"{"errors":[{"code":"Unauthorized","message":"Access denied"}]}"#);
	transport.push(403, &[("x-amzn-RequestId", "req-403")], "");

	let err = executor.execute(&report_spec()).await.expect_err("403 should fail.");

	assert!(matches!(err, Error::UnexpectedStatus { status: 403, request_id: None }));

	let err = executor.execute(&report_spec()).await.expect_err("403 should fail.");

	assert!(
		matches!(err, Error::UnexpectedStatus { status: 403, request_id: Some(ref id) } if id == "req-403")
	);
}

#[tokio::test]
async fn bearer_token_is_attached_unless_overridden() {
	let (transport, executor) = executor(1);

	transport.push(204, &[], "");
	transport.push(204, &[], "");

	executor.execute(&report_spec()).await.expect("Call should succeed.");

	let spec = CallSpec::<()>::get("/orders/v0/orders/902-3159896-1390916/address")
		.override_token("EXISTING-RDT")
		.build();

	executor.execute(&spec).await.expect("Call should succeed.");

	let recorded = transport.recorded();

	assert_eq!(recorded[0].header("x-amz-access-token"), Some("ACCESS-TOKEN-XY"));
	assert_eq!(recorded[1].header("x-amz-access-token"), Some("EXISTING-RDT"));
	assert_eq!(
		recorded[1].headers.iter().filter(|(name, _)| name == "x-amz-access-token").count(),
		1
	);
}

#[tokio::test]
async fn calls_without_any_token_are_rejected_locally() {
	let (transport, executor) = executor_with(
		Arc::new(AccessTokenStore::new()),
		RetryPolicy::default(),
	);
	let err = executor.execute(&report_spec()).await.expect_err("Call without a token should fail.");

	assert!(matches!(err, Error::Token(TokenError::Unavailable)));
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn query_is_sorted_by_key() {
	let (transport, executor) = executor(1);

	transport.push(204, &[], "");

	let spec = CallSpec::<()>::get("/orders/v0/orders")
		.query("MarketplaceIds", "ATVPDKIKX0DER")
		.query("CreatedAfter", "2024-01-01T00:00:00Z")
		.build();

	executor.execute(&spec).await.expect("Call should succeed.");

	assert_eq!(
		transport.recorded()[0].uri,
		"https://sellingpartnerapi-na.amazon.com/orders/v0/orders?CreatedAfter=2024-01-01T00%3A00%3A00Z&MarketplaceIds=ATVPDKIKX0DER"
	);
}

#[tokio::test(start_paused = true)]
async fn rate_limiter_gates_every_attempt() {
	let (transport, executor) = executor(20);
	let limiter = Arc::new(RateLimiter::new(Quota::per_second(1., 1).expect("Quota should be valid.")));
	let spec = CallSpec::<()>::get("/sellers/v1/marketplaceParticipations")
		.rate_limiter(limiter.clone())
		.build();

	transport.push(204, &[], "");
	transport.push(429, &[], "");
	transport.push(204, &[], "");

	let started = Instant::now();

	executor.execute(&spec).await.expect("First call should succeed.");

	assert!(started.elapsed() < StdDuration::from_millis(1));

	// One limiter wait, then the throttle delay; the bucket has refilled by the retry.
	executor.execute(&spec).await.expect("Second call should succeed.");

	assert_eq!(transport.request_count(), 3);
	assert!(started.elapsed() >= StdDuration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_the_backoff() {
	let (transport, executor) = executor_with(
		Arc::new(StaticTokenSource::new("ACCESS-TOKEN-XY")),
		RetryPolicy { max_attempts: 20, backoff: ThrottleBackoff::Fixed(StdDuration::from_secs(5)) },
	);

	transport.push(429, &[], "");

	let context = CallContext::new().with_timeout(StdDuration::from_secs(2));
	let started = Instant::now();
	let err = executor.execute_with(&report_spec(), &context).await.expect_err("Deadline should abort.");

	assert!(matches!(err, Error::DeadlineExceeded));
	assert_eq!(transport.request_count(), 1);
	assert!(started.elapsed() < StdDuration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_the_backoff() {
	let (transport, executor) = executor(20);
	let token = CancellationToken::new();
	let context = CallContext::new().with_cancellation(token.clone());

	transport.push(429, &[], "");
	token.cancel();

	let err = executor.execute_with(&report_spec(), &context).await.expect_err("Cancellation should abort.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn signed_calls_send_the_canonical_query() {
	let transport = Arc::new(ScriptedTransport::default());
	let signer = RequestSigner::new(Arc::new(FixedCredential), Region::UsEast1);
	let executor = CallExecutor::new(
		transport.clone(),
		Url::parse("https://sellingpartnerapi-na.amazon.com").expect("Endpoint fixture should parse."),
		Arc::new(StaticTokenSource::new("ACCESS-TOKEN-XY")),
		Arc::new(signer),
		RetryPolicy::default(),
	);
	let spec = CallSpec::<()>::get("/catalog/2022-04-01/items")
		.query("marketplaceIds", "ATVPDKIKX0DER")
		.query("keywords", "red shoe")
		.build();

	transport.push(204, &[], "");
	executor.execute(&spec).await.expect("Signed call should succeed.");

	let recorded = &transport.recorded()[0];
	let query = recorded.uri.split_once('?').map(|(_, query)| query).expect("Query should be sent.");

	assert_eq!(query, "keywords=red%20shoe&marketplaceIds=ATVPDKIKX0DER");
	assert_eq!(query, sigv4::canonical_query(query));
	assert_eq!(recorded.header("x-amz-security-token"), Some("temporary-session"));
	assert!(recorded.header("authorization").is_some_and(|value| value.starts_with("AWS4-HMAC-SHA256 ")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_executor_serves_concurrent_callers_within_the_quota() {
	let (transport, executor) = executor(1);
	let executor = Arc::new(executor);
	let limiter = Arc::new(RateLimiter::new(
		Quota::every(StdDuration::from_secs(3_600), 4).expect("Quota should be valid."),
	));
	let spec = CallSpec::<()>::get("/orders/v0/orders").rate_limiter(limiter).build();

	for _ in 0..32 {
		transport.push(204, &[], "");
	}

	let tasks = (0..32)
		.map(|_| {
			let executor = executor.clone();
			let spec = spec.clone();

			tokio::spawn(async move {
				let context = CallContext::new().with_timeout(StdDuration::from_secs(1));

				executor.execute_with(&spec, &context).await
			})
		})
		.collect::<Vec<_>>();
	let (mut admitted, mut rejected) = (0, 0);

	for task in tasks {
		match task.await.expect("Call task should not panic.") {
			Ok(result) => {
				assert_eq!(result.status, 204);
				admitted += 1;
			},
			Err(Error::DeadlineExceeded) => rejected += 1,
			Err(other) => panic!("Unexpected error: {other:?}"),
		}
	}

	assert_eq!(admitted, 4);
	assert_eq!(rejected, 28);
	assert_eq!(transport.request_count(), 4);
}
