// self
use crate::obs::{AttemptOutcome, PipelineKind};

/// Records an attempt outcome via the global metrics recorder (when enabled).
pub fn record_attempt(kind: PipelineKind, outcome: AttemptOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"identity_pipeline_attempt_total",
			"pipeline" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the wait scheduled before a retry, in seconds (when enabled).
pub fn record_retry_delay(kind: PipelineKind, delay: std::time::Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("identity_pipeline_retry_delay_seconds", "pipeline" => kind.as_str())
			.record(delay.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, delay);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_is_safe_without_recorder() {
		record_attempt(PipelineKind::ManagedIdentity, AttemptOutcome::Retry);
		record_retry_delay(PipelineKind::General, std::time::Duration::from_millis(250));
	}
}
