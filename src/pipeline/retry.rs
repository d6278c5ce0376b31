//! Retry stage and its options.
//!
//! The retry stage is the only component allowed to re-attempt a request. It sits inside
//! telemetry and request-id tagging and outside request logging, so every attempt is logged
//! on its own and the outer stages run once per call.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	http::{Request, Response},
	obs::{self, AttemptOutcome, PipelineKind},
	pipeline::{Context, Next, Stage, StageFuture},
};

/// Retry and backoff contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOptions {
	/// Retries after the first attempt; `0` disables retrying.
	pub max_retries: u32,
	/// Base delay between attempts; doubled after every retry.
	pub retry_delay: Duration,
	/// Upper bound for the computed delay; must be at least `retry_delay`.
	pub max_retry_delay: Duration,
	/// Bound for a single attempt; must be positive.
	pub try_timeout: Duration,
	/// Statuses that trigger another attempt.
	pub status_codes: BTreeSet<u16>,
}
impl RetryOptions {
	/// Statuses retried by default against the general token endpoint.
	pub const DEFAULT_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];
	/// Statuses retried against managed-identity endpoints.
	///
	/// 404 and 410 are retried because a local metadata endpoint may not be ready yet.
	pub const MANAGED_IDENTITY_STATUS_CODES: [u16; 14] =
		[408, 429, 500, 502, 504, 404, 410, 501, 505, 506, 507, 508, 510, 511];

	const DEFAULT_MAX_RETRIES: u32 = 3;
	const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::minutes(2);
	const DEFAULT_RETRY_DELAY: Duration = Duration::seconds(4);
	const DEFAULT_TRY_TIMEOUT: Duration = Duration::minutes(1);
	const JITTER: f64 = 0.2;

	/// Fixed policy for managed-identity endpoints; not exposed to callers.
	pub(crate) fn managed_identity() -> Self {
		Self {
			max_retries: 4,
			retry_delay: Duration::seconds(2),
			max_retry_delay: Self::DEFAULT_MAX_RETRY_DELAY,
			try_timeout: Duration::minutes(1),
			status_codes: Self::MANAGED_IDENTITY_STATUS_CODES.into_iter().collect(),
		}
	}

	/// Overrides the retry count.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the base delay.
	pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
		self.retry_delay = retry_delay;

		self
	}

	/// Overrides the delay cap.
	pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
		self.max_retry_delay = max_retry_delay;

		self
	}

	/// Overrides the per-attempt timeout.
	pub fn with_try_timeout(mut self, try_timeout: Duration) -> Self {
		self.try_timeout = try_timeout;

		self
	}

	/// Replaces the retriable status set.
	pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
		self.status_codes = codes.into_iter().collect();

		self
	}

	/// Checks the documented ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let reason = if self.retry_delay.is_negative() {
			"retry_delay must not be negative"
		} else if self.max_retry_delay < self.retry_delay {
			"max_retry_delay must be at least retry_delay"
		} else if !self.try_timeout.is_positive() {
			"try_timeout must be positive"
		} else {
			return Ok(());
		};

		Err(ConfigError::InvalidRetryOptions { reason })
	}

	/// Whether a response with `status` should be re-attempted.
	pub fn should_retry_status(&self, status: StatusCode) -> bool {
		self.status_codes.contains(&status.as_u16())
	}

	/// Unjittered delay after `attempt` (1-based) failed: `retry_delay * 2^(attempt - 1)`,
	/// capped at `max_retry_delay`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(30);

		self.retry_delay
			.checked_mul(1_i32 << exponent)
			.map_or(self.max_retry_delay, |delay| delay.min(self.max_retry_delay))
	}

	fn jittered_backoff(&self, attempt: u32) -> Duration {
		let factor = rand::rng().random_range(1.0 - Self::JITTER..=1.0 + Self::JITTER);

		(self.backoff(attempt) * factor).min(self.max_retry_delay)
	}
}
impl Default for RetryOptions {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			retry_delay: Self::DEFAULT_RETRY_DELAY,
			max_retry_delay: Self::DEFAULT_MAX_RETRY_DELAY,
			try_timeout: Self::DEFAULT_TRY_TIMEOUT,
			status_codes: Self::DEFAULT_STATUS_CODES.into_iter().collect(),
		}
	}
}

/// Stage that re-attempts retriable failures within the caller's deadline.
#[derive(Clone, Debug)]
pub struct RetryStage {
	kind: PipelineKind,
	options: Arc<RetryOptions>,
}
impl RetryStage {
	/// Stage label.
	pub const NAME: &'static str = "retry";

	/// Validates `options` and builds the stage.
	pub fn new(kind: PipelineKind, options: Arc<RetryOptions>) -> Result<Self, ConfigError> {
		options.validate()?;

		Ok(Self { kind, options })
	}

	/// Options the stage enforces.
	pub fn options(&self) -> &RetryOptions {
		&self.options
	}

	async fn try_once<'a>(
		&'a self,
		ctx: &'a Context,
		request: Request,
		next: Next<'a>,
	) -> Result<Response, TransportError> {
		let try_timeout = self.options.try_timeout.unsigned_abs();
		let remaining = ctx.remaining();
		let deadline_bound = remaining.is_some_and(|left| left < try_timeout);
		let budget = remaining.map_or(try_timeout, |left| left.min(try_timeout));

		tokio::select! {
			biased;
			_ = ctx.cancelled() => Err(TransportError::Cancelled),
			outcome = tokio::time::timeout(budget, next.run(ctx, request)) => match outcome {
				Ok(outcome) => outcome,
				Err(_) if deadline_bound => Err(TransportError::DeadlineExceeded),
				Err(_) => Err(TransportError::TryTimeout { timeout: self.options.try_timeout }),
			},
		}
	}

	/// Delay before the attempt after `attempt`, never above `max_retry_delay`.
	fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
		retry_after
			.unwrap_or_else(|| self.options.jittered_backoff(attempt))
			.clamp(Duration::ZERO, self.options.max_retry_delay)
	}

	async fn wait(&self, ctx: &Context, delay: std::time::Duration) -> Result<(), TransportError> {
		tokio::select! {
			biased;
			_ = ctx.cancelled() => Err(TransportError::Cancelled),
			_ = tokio::time::sleep(delay) => Ok(()),
		}
	}
}
impl Stage for RetryStage {
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
			let max_attempts = self.options.max_retries.saturating_add(1);
			let mut attempt = 0;

			loop {
				attempt += 1;

				ctx.check()?;

				let mut try_request = request.clone();

				try_request.attempt = attempt;

				let outcome = self.try_once(ctx, try_request, next).await;
				let retry_after = match &outcome {
					Ok(response) if self.options.should_retry_status(response.status) =>
						Some(response.retry_after()),
					Err(e) if e.is_retriable() => Some(None),
					_ => None,
				};
				let Some(retry_after) = retry_after else {
					let label = if outcome.is_ok() {
						AttemptOutcome::Success
					} else {
						AttemptOutcome::Failure
					};

					obs::record_attempt(self.kind, label);

					return outcome;
				};

				let delay = self.delay_after(attempt, retry_after).unsigned_abs();

				// Out of attempts, or the wait alone would outlive the deadline.
				if attempt >= max_attempts || ctx.remaining().is_some_and(|left| left <= delay) {
					obs::record_attempt(self.kind, AttemptOutcome::Failure);

					return outcome;
				}

				obs::record_attempt(self.kind, AttemptOutcome::Retry);
				obs::record_retry_delay(self.kind, delay);

				self.wait(ctx, delay).await?;
			}
		})
	}
}
