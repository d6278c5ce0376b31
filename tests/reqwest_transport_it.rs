#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use identity_pipeline::{
	_preludet::url,
	config::{ResolvedOptions, TelemetryOptions, TokenCredentialOptions},
	error::Error,
	http::Request,
	pipeline::{Context, RetryOptions},
};

fn resolve(server: &MockServer, retry: RetryOptions) -> ResolvedOptions {
	let options = TokenCredentialOptions::default()
		.with_authority_host(server.base_url())
		.with_retry(retry)
		.with_telemetry(TelemetryOptions::default().with_application_id("it-app"));

	ResolvedOptions::resolve_with(Some(options), |_| None)
		.expect("Mock server options should resolve.")
}

fn token_request(resolved: &ResolvedOptions) -> Request {
	let endpoint =
		resolved.endpoint("tenant/oauth2/v2.0/token").expect("Token endpoint should join.");

	Request::form(endpoint, [("grant_type", "client_credentials"), ("client_id", "demo")])
}

#[tokio::test]
async fn default_transport_sends_pipeline_headers() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant/oauth2/v2.0/token")
				.header_exists("x-ms-client-request-id")
				.header_exists("user-agent")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let resolved = resolve(&server, RetryOptions::default());
	let response = resolved
		.pipeline
		.send_token_request(&Context::new(), token_request(&resolved))
		.await
		.expect("Token request should succeed.");

	assert_eq!(response.status.as_u16(), 200);
	assert!(String::from_utf8_lossy(&response.body).contains("demo-access"));

	mock.assert_async().await;
}

#[tokio::test]
async fn provider_rejection_surfaces_parsed_payload() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/tenant/oauth2/v2.0/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"expired\",\"trace_id\":\"t-42\"}",
			);
		})
		.await;
	let resolved = resolve(&server, RetryOptions::default());
	let err = resolved
		.pipeline
		.send_token_request(&Context::new(), token_request(&resolved))
		.await
		.expect_err("Status 400 should be classified.");
	let Error::ProviderAuthenticationFailed(inner) = &err else {
		panic!("Unexpected error variant: {err:?}.");
	};

	assert_eq!(err.to_string(), "invalid_grant expired");
	assert_eq!(inner.payload().trace_id.as_deref(), Some("t-42"));
	assert_eq!(inner.status().as_u16(), 400);

	mock.assert_async().await;
}

#[tokio::test]
async fn throttled_endpoint_is_retried_with_retry_after() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/tenant/oauth2/v2.0/token");
			then.status(429).header("retry-after", "0").body("{\"error\":\"throttled\"}");
		})
		.await;
	let retry = RetryOptions::default()
		.with_max_retries(2)
		.with_retry_delay(Duration::seconds(30))
		.with_max_retry_delay(Duration::seconds(30));
	let resolved = resolve(&server, retry);
	let err = resolved
		.pipeline
		.send_token_request(
			&Context::new().with_timeout(Duration::seconds(10)),
			token_request(&resolved),
		)
		.await
		.expect_err("Persistent throttling should surface after retries.");

	assert_eq!(err.to_string(), "throttled");

	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn unreachable_host_becomes_authentication_failure() {
	let retry = RetryOptions::default()
		.with_max_retries(1)
		.with_retry_delay(Duration::milliseconds(5))
		.with_max_retry_delay(Duration::milliseconds(5));
	let options = TokenCredentialOptions::default().with_retry(retry);
	let resolved =
		ResolvedOptions::resolve_with(Some(options), |_| None).expect("Defaults should resolve.");
	let err = resolved
		.pipeline
		.send(
			&Context::new(),
			Request::new(http::Method::GET, url("http://127.0.0.1:9/unreachable")),
		)
		.await
		.expect_err("Closed port should fail.");

	assert!(matches!(err, Error::AuthenticationFailed(_)));
	assert!(err.is_not_retriable());
}
