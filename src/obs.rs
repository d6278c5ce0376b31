//! Optional observability helpers for pipeline sends.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `identity_pipeline.send` with the `pipeline`, `stage`,
//!   `method`, and `host` fields, plus the per-attempt events written by the request-log stage.
//! - Enable `metrics` to increment the `identity_pipeline_attempt_total` counter for every
//!   attempt, labeled by `pipeline` + `outcome`, and to record each scheduled retry wait in the
//!   `identity_pipeline_retry_delay_seconds` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline variants produced by the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
	/// Caller-configurable pipeline for the general token endpoint.
	General,
	/// Fixed-policy pipeline for managed-identity endpoints.
	ManagedIdentity,
	/// Pipeline assembled by hand from caller-supplied stages.
	Custom,
}
impl PipelineKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PipelineKind::General => "general",
			PipelineKind::ManagedIdentity => "managed_identity",
			PipelineKind::Custom => "custom",
		}
	}
}
impl Display for PipelineKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
	/// The attempt produced a final, non-retried result.
	Success,
	/// The attempt failed and another one is scheduled.
	Retry,
	/// The attempt failed and the retry budget is spent (or the failure is terminal).
	Failure,
}
impl AttemptOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AttemptOutcome::Success => "success",
			AttemptOutcome::Retry => "retry",
			AttemptOutcome::Failure => "failure",
		}
	}
}
impl Display for AttemptOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
