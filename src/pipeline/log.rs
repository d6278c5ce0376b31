//! Request-log stage: one event before and one after every attempt.
//!
//! Events are emitted through `tracing` when the feature is enabled and compile away
//! otherwise. Query values are redacted; bodies are logged only when
//! [`LogOptions::include_body`] is set.

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	config::LogOptions,
	error::TransportError,
	http::{Request, Response},
	pipeline::{Context, Next, Stage, StageFuture},
};

const REDACTED: &str = "REDACTED";

/// Stage that logs each attempt it observes.
#[derive(Clone, Debug, Default)]
pub struct RequestLogStage {
	options: LogOptions,
}
impl RequestLogStage {
	/// Stage label.
	pub const NAME: &'static str = "request_log";

	/// Creates the stage.
	pub fn new(options: LogOptions) -> Self {
		Self { options }
	}
}
impl Stage for RequestLogStage {
	fn name(&self) -> &'static str {
		Self::NAME
	}

	fn process<'a>(
		&'a self,
		ctx: &'a Context,
		request: Request,
		next: Next<'a>,
	) -> StageFuture<'a> {
		Box::pin(async move {
			let attempt = request.attempt;
			let started = Instant::now();

			log_request(&request);

			let outcome = next.run(ctx, request).await;

			log_outcome(attempt, started.elapsed(), &outcome, self.options.include_body);

			outcome
		})
	}
}

/// Renders `url` with every query value replaced by `REDACTED`.
pub fn redact_url(url: &Url) -> String {
	if url.query().is_none() {
		return url.to_string();
	}

	let keys: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();
	let mut redacted = url.clone();

	redacted
		.query_pairs_mut()
		.clear()
		.extend_pairs(keys.iter().map(|key| (key.as_str(), REDACTED)));

	redacted.to_string()
}

fn log_request(request: &Request) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			method = %request.method,
			url = %redact_url(&request.url),
			attempt = request.attempt,
			"Sending identity request."
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = request;
	}
}

fn log_outcome(
	attempt: u32,
	elapsed: std::time::Duration,
	outcome: &Result<Response, TransportError>,
	include_body: bool,
) {
	#[cfg(feature = "tracing")]
	{
		let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

		match outcome {
			Ok(response) if include_body => tracing::debug!(
				attempt,
				elapsed_ms,
				status = response.status.as_u16(),
				body = %String::from_utf8_lossy(&response.body),
				"Identity response received."
			),
			Ok(response) => tracing::debug!(
				attempt,
				elapsed_ms,
				status = response.status.as_u16(),
				"Identity response received."
			),
			Err(e) => tracing::warn!(attempt, elapsed_ms, error = %e, "Identity request failed."),
		}
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, elapsed, outcome, include_body);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedTransport, url},
		pipeline::Pipeline,
	};

	#[test]
	fn query_values_are_redacted() {
		let redacted = redact_url(&url(
			"http://169.254.169.254/metadata/identity/oauth2/token?resource=x&client_id=secret",
		));

		assert_eq!(
			redacted,
			"http://169.254.169.254/metadata/identity/oauth2/token?resource=REDACTED&client_id=REDACTED",
		);
		assert_eq!(redact_url(&url("https://login.example.com/t")), "https://login.example.com/t");
	}

	#[cfg(feature = "tracing")]
	#[derive(Default)]
	struct EventCounter {
		before: std::sync::atomic::AtomicUsize,
		after: std::sync::atomic::AtomicUsize,
	}
	#[cfg(feature = "tracing")]
	impl tracing::Subscriber for EventCounter {
		fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
			true
		}

		fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
			tracing::span::Id::from_u64(1)
		}

		fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

		fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

		fn event(&self, event: &tracing::Event<'_>) {
			// Only the request-log stage emits events in this pipeline.
			let counter = match *event.metadata().level() {
				tracing::Level::DEBUG if event.fields().any(|f| f.name() == "status") =>
					&self.after,
				tracing::Level::DEBUG => &self.before,
				_ => &self.after,
			};

			counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		}

		fn enter(&self, _: &tracing::span::Id) {}

		fn exit(&self, _: &tracing::span::Id) {}
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn every_retry_attempt_is_logged() {
		use std::sync::atomic::Ordering;

		use crate::{
			_preludet::Scripted,
			obs::PipelineKind,
			pipeline::{RetryOptions, RetryStage},
		};

		let counter = Arc::new(EventCounter::default());
		let _guard = tracing::subscriber::set_default(Arc::clone(&counter));
		let transport = Arc::new(ScriptedTransport::new([
			Scripted::respond(503, "busy"),
			Scripted::fail("connection reset"),
			Scripted::respond(200, "{}"),
		]));
		let retry = RetryOptions::default()
			.with_retry_delay(Duration::milliseconds(1))
			.with_max_retry_delay(Duration::milliseconds(5));
		let stages: [Arc<dyn Stage>; 2] = [
			Arc::new(
				RetryStage::new(PipelineKind::Custom, Arc::new(retry))
					.expect("Retry stage should build."),
			),
			Arc::new(RequestLogStage::default()),
		];
		let response = Pipeline::new(transport.clone(), stages)
			.send(&Context::new(), Request::new(Method::GET, url("https://login.example.com/")))
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(transport.calls(), 3);
		assert_eq!(counter.before.load(Ordering::SeqCst), 3);
		assert_eq!(counter.after.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn outcome_passes_through_unchanged() {
		let transport = Arc::new(ScriptedTransport::always(503, "busy"));
		let stage: Arc<dyn Stage> =
			Arc::new(RequestLogStage::new(LogOptions { include_body: true }));
		let response = Pipeline::new(transport, [stage])
			.send(&Context::new(), Request::new(Method::GET, url("https://login.example.com/")))
			.await
			.expect("Logging must not alter the outcome.");

		assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(response.body, b"busy");
	}
}
