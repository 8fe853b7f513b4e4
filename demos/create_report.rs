//! Connects a client against a mock SP-API deployment, assumes a signing role, and requests a
//! report through a rate-limited, signed call.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::{Deserialize, Serialize};
use url::Url;
// self
use sp_api_client::{
	auth::IamCredential,
	call::{CallContext, CallSpec},
	client::Client,
	config::{ClientConfig, Marketplace, Region, RoleSettings},
	http::ReqwestHttpClient,
	rate_limit::Quota,
	reqwest,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportSpecification<'a> {
	report_type: &'a str,
	marketplace_ids: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportResponse {
	report_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expiration = time::OffsetDateTime::now_utc().unix_timestamp() + 3_600;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/o2/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"Atza|demo","refresh_token":"Atzr|demo","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/sts");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"AssumeRoleResponse":{{"AssumeRoleResult":{{"Credentials":{{"AccessKeyId":"ASIADEMO","SecretAccessKey":"demo-secret","SessionToken":"demo-session","Expiration":{expiration}}}}}}}}}"#
			));
		})
		.await;

	let report_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/reports/2021-06-30/reports")
				.header("x-amz-access-token", "Atza|demo")
				.header_exists("authorization");
			then.status(202)
				.header("content-type", "application/json")
				.header("x-amzn-RateLimit-Limit", "0.0167")
				.body(r#"{"reportId":"ID323"}"#);
		})
		.await;
	let config = ClientConfig::builder()
		.client("amzn1.application-oa2-client.demo", "demo-client-secret")
		.refresh_token("Atzr|demo")
		.token_url(Url::parse(&server.url("/auth/o2/token"))?)
		.endpoint(Url::parse(&server.url("/"))?)
		.region(Region::UsEast1)
		.role(
			RoleSettings::new(
				IamCredential::new("AKIDDEMO", "demo-iam-secret"),
				"arn:aws:iam::123456789012:role/sp-api-demo",
			)
			.with_sts(Url::parse(&server.url("/sts"))?, Region::UsEast1),
		)
		.build()?;
	// The mock server presents a self-signed certificate.
	let transport = ReqwestHttpClient::with_client(
		reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(config.request_timeout)
			.build()?,
	);
	let client = Client::connect_with_transport(config, Arc::new(transport)).await?;
	let limiter = client.rate_limiter("createReport", Quota::per_second(0.0167, 15)?);
	let spec = CallSpec::<CreateReportResponse>::post("/reports/2021-06-30/reports")
		.json_body(&CreateReportSpecification {
			report_type: "GET_MERCHANT_LISTINGS_ALL_DATA",
			marketplace_ids: vec![Marketplace::UnitedStates.id()],
		})?
		.rate_limiter(limiter)
		.parse_error_list(true)
		.build();
	let context = CallContext::new().with_timeout(std::time::Duration::from_secs(30));
	let result = client.execute_with(&spec, &context).await?;

	match result.error_summary() {
		Some(summary) => println!("Report request failed: {summary}."),
		None => {
			if let Some(report) = result.into_body()? {
				println!("Report requested: {}.", report.report_id);
			}
		},
	}

	report_mock.assert_async().await;
	client.close();

	Ok(())
}
