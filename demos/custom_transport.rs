//! Demonstrates plugging a non-reqwest transport into the general pipeline.
//!
//! 1. Implement [`Transport`] and return [`TransportError`]s for network-level failures.
//! 2. Pass the transport through [`TokenCredentialOptions::with_transport`].
//! 3. Let the retry stage absorb transient failures; terminal ones come back as [`Error`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use time::Duration;
// self
use identity_pipeline::{
	config::{ResolvedOptions, TokenCredentialOptions},
	error::{Error, TransportError},
	http::{Request, Response, Transport, TransportFuture},
	pipeline::{CLIENT_REQUEST_ID_HEADER, Context, RetryOptions},
};

const TOKEN_BODY: &[u8] =
	b"{\"access_token\":\"mock-access\",\"token_type\":\"Bearer\",\"expires_in\":900}";
const REJECTION_BODY: &[u8] =
	b"{\"error\":\"invalid_client\",\"error_description\":\"AADSTS7000215\",\"trace_id\":\"t-1\"}";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let flaky = Arc::new(MockTransport::new(MockBehavior::FailFirst(2)));
	let retry = RetryOptions::default()
		.with_retry_delay(Duration::milliseconds(50))
		.with_max_retry_delay(Duration::milliseconds(200));
	let resolved = ResolvedOptions::resolve_with(
		Some(
			TokenCredentialOptions::default()
				.with_authority_host("https://login.example.com")
				.with_transport(flaky.clone())
				.with_retry(retry.clone()),
		),
		|_| None,
	)?;
	let endpoint = resolved.endpoint("tenant-acme/oauth2/v2.0/token")?;
	let request = Request::form(endpoint.clone(), [
		("grant_type", "client_credentials"),
		("client_id", "demo-client"),
		("scope", "https://graph.example.com/.default"),
	]);
	let response = resolved.pipeline.send_token_request(&Context::new(), request).await?;

	println!(
		"Token issued after {} attempts: {}.",
		flaky.calls(),
		String::from_utf8_lossy(&response.body),
	);

	let rejecting = Arc::new(MockTransport::new(MockBehavior::Reject));
	let resolved = ResolvedOptions::resolve_with(
		Some(
			TokenCredentialOptions::default()
				.with_authority_host("https://login.example.com")
				.with_transport(rejecting)
				.with_retry(retry),
		),
		|_| None,
	)?;
	let request = Request::form(endpoint, [("grant_type", "client_credentials")]);

	match resolved.pipeline.send_token_request(&Context::new(), request).await {
		Ok(_) => println!("Rejecting transport unexpectedly issued a token."),
		Err(Error::ProviderAuthenticationFailed(e)) => println!(
			"Provider rejected the request with {}: {e} (trace {:?}).",
			e.status(),
			e.payload().trace_id,
		),
		Err(e) => println!("Unexpected failure: {e}."),
	}

	Ok(())
}

#[derive(Debug)]
struct DnsFailure {
	host: String,
}
impl Display for DnsFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DNS lookup failed for {}", self.host)
	}
}
impl StdError for DnsFailure {}

#[derive(Clone, Copy, Debug)]
enum MockBehavior {
	FailFirst(usize),
	Reject,
}

#[derive(Debug)]
struct MockTransport {
	behavior: MockBehavior,
	calls: AtomicUsize,
}
impl MockTransport {
	fn new(behavior: MockBehavior) -> Self {
		Self { behavior, calls: AtomicUsize::new(0) }
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl Transport for MockTransport {
	fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if let Some(id) = request.headers.get(CLIENT_REQUEST_ID_HEADER) {
				println!("Attempt {} carries request id {id:?}.", request.attempt);
			}

			match self.behavior {
				MockBehavior::FailFirst(failures) if call < failures => {
					let host = request.url.host_str().unwrap_or_default().to_owned();

					Err(TransportError::network(DnsFailure { host }))
				},
				MockBehavior::FailFirst(_) => Ok(Response::new(http::StatusCode::OK, TOKEN_BODY)),
				MockBehavior::Reject =>
					Ok(Response::new(http::StatusCode::UNAUTHORIZED, REJECTION_BODY)),
			}
		})
	}
}
