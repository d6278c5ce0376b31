//! Demonstrates the managed-identity pipeline against a mock instance-metadata endpoint.
//!
//! The endpoint answers with a token once the request carries the `Metadata` header. The
//! fixed managed-identity retry policy is printed so the extra 404/410 handling is visible.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use identity_pipeline::{
	config::{ManagedIdentityCredentialOptions, TelemetryOptions},
	http::{ReqwestTransport, Request},
	pipeline::{self, Context},
	scope,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let imds = server
		.mock_async(|when, then| {
			when.method(GET).path("/metadata/identity/oauth2/token").header("metadata", "true");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"imds-access\",\"expires_in\":\"3599\",\"token_type\":\"Bearer\"}",
			);
		})
		.await;
	let options = ManagedIdentityCredentialOptions::default()
		.with_transport(std::sync::Arc::new(ReqwestTransport::try_default()?))
		.with_telemetry(TelemetryOptions::default().with_application_id("mi-demo"));
	let pipeline = pipeline::new_managed_identity_pipeline(&options)?;

	if let Some(retry) = pipeline.retry_options() {
		println!(
			"Managed-identity retry policy: {} retries, statuses {:?}.",
			retry.max_retries, retry.status_codes,
		);
	}

	let mut endpoint = Url::parse(&server.url("/metadata/identity/oauth2/token"))?;

	endpoint
		.query_pairs_mut()
		.append_pair("api-version", "2018-02-01")
		.append_pair("resource", scope::scope_to_resource("https://management.azure.com/.default"));

	let request = Request::new(http::Method::GET, endpoint).with_header(
		http::HeaderName::from_static("metadata"),
		http::HeaderValue::from_static("true"),
	);
	let response = pipeline.send_token_request(&Context::new(), request).await?;

	println!("Token response: {}.", String::from_utf8_lossy(&response.body));

	imds.assert_async().await;

	Ok(())
}
