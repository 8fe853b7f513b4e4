// self
use sp_api_client::{
	_preludet::*,
	config::ClientConfig,
	error::TokenError,
	token::{RefreshSettings, RefresherState, TokenRefresher},
};

const FIRST: &str = r#"{"access_token":"Atza|first","refresh_token":"Atzr|grant","token_type":"bearer","expires_in":3600}"#;
const SECOND: &str = r#"{"access_token":"Atza|second","refresh_token":"Atzr|grant","token_type":"bearer","expires_in":3600}"#;

fn settings() -> RefreshSettings {
	let config = ClientConfig::builder()
		.client("amzn1.application-oa2-client.test", "client-secret")
		.refresh_token("Atzr|grant")
		.token_url(Url::parse("https://auth.example.test/o2/token").expect("Token URL should parse."))
		.build()
		.expect("Client config should build.");

	RefreshSettings::from(&config)
}

fn refresher() -> (Arc<ScriptedTransport>, TokenRefresher<ScriptedTransport>) {
	let transport = Arc::new(ScriptedTransport::default());
	let refresher = TokenRefresher::new(transport.clone(), settings());

	(transport, refresher)
}

async fn advance(secs: u64) {
	tokio::time::sleep(StdDuration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn rejected_first_fetch_fails_fast_and_spawns_nothing() {
	let (transport, refresher) = refresher();

	transport.push_json(400, r#"{"error":"invalid_grant","error_description":"The request has an invalid grant parameter"}"#);

	let err = refresher.start().await.expect_err("Rejected grant should fail the start.");

	assert!(matches!(err, Error::Token(TokenError::Rejected { status: 400, .. })));
	assert_eq!(refresher.state(), RefresherState::Uninitialized);
	assert_eq!(refresher.current_token(), "");

	advance(3_600).await;

	assert_eq!(transport.request_count(), 1, "No background fetch should run after a failed start.");

	transport.push_json(200, FIRST);

	let _handle = refresher.start().await.expect("Second start should succeed.");

	assert_eq!(refresher.current_token(), "Atza|first");
	assert!(matches!(refresher.start().await, Err(Error::Token(TokenError::AlreadyStarted))));
}

#[tokio::test(start_paused = true)]
async fn first_fetch_posts_the_refresh_grant() {
	let (transport, refresher) = refresher();

	transport.push_json(200, FIRST);

	let _handle = refresher.start().await.expect("Start should succeed.");
	let recorded = transport.recorded();
	let body: serde_json::Value =
		serde_json::from_slice(&recorded[0].body).expect("Grant body should be JSON.");

	assert_eq!(recorded[0].method, "POST");
	assert_eq!(recorded[0].uri, "https://auth.example.test/o2/token");
	assert_eq!(recorded[0].header("content-type"), Some("application/json"));
	assert_eq!(body["grant_type"], "refresh_token");
	assert_eq!(body["refresh_token"], "Atzr|grant");
	assert_eq!(body["client_id"], "amzn1.application-oa2-client.test");
	assert_eq!(body["client_secret"], "client-secret");
	assert_eq!(refresher.state(), RefresherState::Active);
}

#[tokio::test(start_paused = true)]
async fn next_fetch_runs_one_expiry_delta_before_expiry() {
	let (transport, refresher) = refresher();

	transport.push_json(200, FIRST);
	transport.push_json(200, SECOND);

	let _handle = refresher.start().await.expect("Start should succeed.");

	advance(3_539).await;

	assert_eq!(transport.request_count(), 1);
	assert_eq!(refresher.current_token(), "Atza|first");

	advance(2).await;

	assert_eq!(transport.request_count(), 2);
	assert_eq!(refresher.current_token(), "Atza|second");
	assert_eq!(refresher.metrics().published(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_token_and_retries_after_backoff() {
	let (transport, refresher) = refresher();

	transport.push_json(200, FIRST);
	transport.push_json(200, r#"{"access_token":"","expires_in":3600}"#);
	transport.push_json(200, SECOND);

	let _handle = refresher.start().await.expect("Start should succeed.");

	advance(3_541).await;

	assert_eq!(transport.request_count(), 2);
	assert_eq!(refresher.current_token(), "Atza|first", "A failed fetch must not replace the token.");
	assert_eq!(refresher.metrics().failed(), 1);
	assert_eq!(refresher.metrics().consecutive_failures(), 1);

	advance(8).await;

	assert_eq!(transport.request_count(), 2);

	advance(2).await;

	assert_eq!(transport.request_count(), 3);
	assert_eq!(refresher.current_token(), "Atza|second");
	assert_eq!(refresher.metrics().consecutive_failures(), 0);
	assert_eq!(refresher.metrics().published(), 2);
}

#[tokio::test(start_paused = true)]
async fn stopping_is_idempotent_and_halts_fetches() {
	let (transport, refresher) = refresher();

	transport.push_json(200, FIRST);

	let handle = refresher.start().await.expect("Start should succeed.");

	handle.cancel();
	handle.cancel();

	assert!(handle.is_stopped());
	assert_eq!(refresher.state(), RefresherState::Stopped);

	handle.stop().await;
	advance(10_000).await;

	assert_eq!(transport.request_count(), 1);
	assert_eq!(refresher.current_token(), "Atza|first", "The last token stays readable after stop.");
}

#[tokio::test(start_paused = true)]
async fn manual_fetch_before_start_leaves_the_refresher_startable() {
	let (transport, refresher) = refresher();

	transport.push_json(200, FIRST);
	transport.push_json(200, SECOND);

	let token = refresher.fetch_token().await.expect("Manual fetch should succeed.");

	assert_eq!(token.value().expose(), "Atza|first");
	assert_eq!(refresher.state(), RefresherState::Uninitialized);

	let _handle = refresher.start().await.expect("Start after a manual fetch should succeed.");

	assert_eq!(refresher.state(), RefresherState::Active);
	assert_eq!(refresher.current_token(), "Atza|second");

	advance(3_541).await;

	assert_eq!(transport.request_count(), 3, "The background loop should be running.");
}
