//! Ordered request pipeline through which every identity-provider request flows.
//!
//! A [`Pipeline`] owns a transport and an ordered list of [`Stage`]s. Each stage receives a
//! [`Next`] handle naming the rest of the chain, so composition is explicit and no pipeline
//! state lives outside the value. Stage and option data are read-only after construction,
//! which lets one pipeline serve many concurrent callers.

pub mod factory;
pub mod log;
pub mod request_id;
pub mod retry;
pub mod telemetry;

pub use factory::*;
pub use log::*;
pub use request_id::*;
pub use retry::*;
pub use telemetry::*;

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	error::{ProviderAuthenticationError, TransportError},
	http::{Request, Response, Transport},
	obs::{PipelineKind, PipelineSpan},
};

/// Boxed future returned by [`Stage::process`] and [`Next::run`].
pub type StageFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, TransportError>> + 'a + Send>>;

/// One link in the pipeline.
pub trait Stage
where
	Self: Send + Sync,
{
	/// Stable stage label used in logs and introspection.
	fn name(&self) -> &'static str;

	/// Processes `request`, delegating to `next` for the rest of the chain.
	fn process<'a>(
		&'a self,
		ctx: &'a Context,
		request: Request,
		next: Next<'a>,
	) -> StageFuture<'a>;
}

/// Handle to the remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
	stages: &'a [Arc<dyn Stage>],
	transport: &'a dyn Transport,
}
impl<'a> Next<'a> {
	/// Runs the remaining stages, ending at the transport.
	pub fn run(self, ctx: &'a Context, request: Request) -> StageFuture<'a> {
		match self.stages.split_first() {
			Some((stage, rest)) =>
				stage.process(ctx, request, Next { stages: rest, transport: self.transport }),
			None => Box::pin(async move { self.transport.send(&request).await }),
		}
	}
}
impl Debug for Next<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_list().entries(self.stages.iter().map(|stage| stage.name())).finish()
	}
}

/// Per-call deadline and cancellation signal.
///
/// The deadline bounds the whole retry sequence; the retry stage's try timeout bounds each
/// attempt inside it.
#[derive(Clone, Debug, Default)]
pub struct Context {
	deadline: Option<Instant>,
	cancellation: Option<CancellationToken>,
}
impl Context {
	/// Context with neither deadline nor cancellation.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets an absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline `timeout` from now. Negative values expire immediately; a timeout too
	/// large for the clock leaves the context without a deadline.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.deadline = Instant::now().checked_add(timeout.max(Duration::ZERO).unsigned_abs());

		self
	}

	/// Attaches a cancellation token.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Configured deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Whether the attached token, if any, has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
	}

	/// Time left before the deadline; `None` without a deadline.
	pub fn remaining(&self) -> Option<std::time::Duration> {
		self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
	}

	/// Fails fast when the context is already cancelled or expired.
	pub fn check(&self) -> Result<(), TransportError> {
		if self.is_cancelled() {
			return Err(TransportError::Cancelled);
		}
		if self.remaining().is_some_and(|left| left.is_zero()) {
			return Err(TransportError::DeadlineExceeded);
		}

		Ok(())
	}

	/// Resolves once the token is cancelled; never resolves without one.
	pub async fn cancelled(&self) {
		match &self.cancellation {
			Some(token) => token.cancelled().await,
			None => std::future::pending::<()>().await,
		}
	}
}

/// Immutable, shareable request pipeline.
#[derive(Clone)]
pub struct Pipeline {
	kind: PipelineKind,
	transport: Arc<dyn Transport>,
	stages: Arc<[Arc<dyn Stage>]>,
	retry: Option<Arc<RetryOptions>>,
}
impl Pipeline {
	/// Assembles a custom pipeline from caller-ordered stages, outermost first.
	pub fn new(
		transport: Arc<dyn Transport>,
		stages: impl IntoIterator<Item = Arc<dyn Stage>>,
	) -> Self {
		Self::assemble(PipelineKind::Custom, transport, stages.into_iter().collect(), None)
	}

	pub(crate) fn assemble(
		kind: PipelineKind,
		transport: Arc<dyn Transport>,
		stages: Vec<Arc<dyn Stage>>,
		retry: Option<Arc<RetryOptions>>,
	) -> Self {
		Self { kind, transport, stages: stages.into(), retry }
	}

	/// Variant that built the pipeline.
	pub fn kind(&self) -> PipelineKind {
		self.kind
	}

	/// Stage labels, outermost first.
	pub fn stage_names(&self) -> Vec<&'static str> {
		self.stages.iter().map(|stage| stage.name()).collect()
	}

	/// Retry options the factory installed; `None` for custom pipelines.
	pub fn retry_options(&self) -> Option<&RetryOptions> {
		self.retry.as_deref()
	}

	/// Sends `request` through every stage.
	///
	/// Transport failures leave the pipeline as [`Error::AuthenticationFailed`]. Any completed
	/// response is returned as-is, whatever its status.
	pub async fn send(&self, ctx: &Context, request: Request) -> Result<Response> {
		let span = PipelineSpan::new(self.kind, "send", &request);
		let next = Next { stages: &self.stages, transport: self.transport.as_ref() };

		span.instrument(next.run(ctx, request)).await.map_err(Error::from)
	}

	/// Sends a token request and classifies the response.
	///
	/// Exactly 200 and 201 count as success; anything else becomes
	/// [`Error::ProviderAuthenticationFailed`].
	pub async fn send_token_request(&self, ctx: &Context, request: Request) -> Result<Response> {
		let response = self.send(ctx, request).await?;

		if response.is_success() {
			Ok(response)
		} else {
			Err(ProviderAuthenticationError::from_response(response).into())
		}
	}
}
impl Debug for Pipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline")
			.field("kind", &self.kind)
			.field("stages", &self.stage_names())
			.field("retry", &self.retry)
			.finish()
	}
}
