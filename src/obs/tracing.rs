// self
use crate::{_prelude::*, http::Request, obs::PipelineKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedSend<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedSend<F> = F;

/// Span wrapped around one pipeline send.
#[derive(Clone, Debug)]
pub struct PipelineSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl PipelineSpan {
	/// Creates a span for one call of `request`, tagged with the pipeline kind, stage, method,
	/// and target host. Query strings never reach the span.
	pub fn new(kind: PipelineKind, stage: &'static str, request: &Request) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"identity_pipeline.send",
				pipeline = kind.as_str(),
				stage,
				method = %request.method,
				host = request.url.host_str().unwrap_or_default(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, request);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedSend<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_preserves_output() {
		let request = Request::new(
			Method::POST,
			Url::parse("https://login.example.com/t/token?secret=x").expect("URL should parse."),
		);
		let span = PipelineSpan::new(PipelineKind::General, "instrument", &request);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
