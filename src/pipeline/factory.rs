//! Builders for the two pipeline variants every credential uses.
//!
//! Both variants assemble the same stage order, outermost to innermost:
//! telemetry → request id → retry → request log → transport.

// self
use crate::{
	_prelude::*,
	config::{
		LogOptions, ManagedIdentityCredentialOptions, TelemetryOptions, TokenCredentialOptions,
	},
	error::ConfigError,
	http::Transport,
	obs::PipelineKind,
	pipeline::{
		Pipeline, RequestLogStage, RetryOptions, RetryStage, Stage, TelemetryStage,
		UniqueRequestIdStage,
	},
};

/// Builds the general pipeline; retry behavior follows `options.retry` (or the defaults).
pub fn new_default_pipeline(options: &TokenCredentialOptions) -> Result<Pipeline, ConfigError> {
	let retry = options.retry.clone().unwrap_or_default();

	build(
		PipelineKind::General,
		options.transport.as_ref(),
		&options.telemetry,
		&options.logging,
		retry,
	)
}

/// Builds the managed-identity pipeline with its fixed, non-configurable retry policy.
pub fn new_managed_identity_pipeline(
	options: &ManagedIdentityCredentialOptions,
) -> Result<Pipeline, ConfigError> {
	build(
		PipelineKind::ManagedIdentity,
		options.transport.as_ref(),
		&options.telemetry,
		&options.logging,
		RetryOptions::managed_identity(),
	)
}

fn build(
	kind: PipelineKind,
	transport: Option<&Arc<dyn Transport>>,
	telemetry: &TelemetryOptions,
	logging: &LogOptions,
	retry: RetryOptions,
) -> Result<Pipeline, ConfigError> {
	let transport = default_transport(transport)?;
	let retry = Arc::new(retry);
	let stages: Vec<Arc<dyn Stage>> = vec![
		Arc::new(TelemetryStage::new(telemetry)?),
		Arc::new(UniqueRequestIdStage),
		Arc::new(RetryStage::new(kind, Arc::clone(&retry))?),
		Arc::new(RequestLogStage::new(logging.clone())),
	];

	Ok(Pipeline::assemble(kind, transport, stages, Some(retry)))
}

fn default_transport(
	supplied: Option<&Arc<dyn Transport>>,
) -> Result<Arc<dyn Transport>, ConfigError> {
	if let Some(transport) = supplied {
		return Ok(Arc::clone(transport));
	}

	#[cfg(feature = "reqwest")]
	{
		Ok(Arc::new(crate::http::ReqwestTransport::try_default()?))
	}
	#[cfg(not(feature = "reqwest"))]
	{
		Err(ConfigError::MissingTransport)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::ScriptedTransport;

	fn transport() -> Arc<dyn Transport> {
		Arc::new(ScriptedTransport::always(200, "{}"))
	}

	#[test]
	fn both_variants_share_stage_order() {
		let general =
			new_default_pipeline(&TokenCredentialOptions::default().with_transport(transport()))
				.expect("General pipeline should build.");
		let managed = new_managed_identity_pipeline(
			&ManagedIdentityCredentialOptions::default().with_transport(transport()),
		)
		.expect("Managed-identity pipeline should build.");
		let order = ["telemetry", "request_id", "retry", "request_log"];

		assert_eq!(general.stage_names(), order);
		assert_eq!(managed.stage_names(), order);
		assert_eq!(general.kind(), PipelineKind::General);
		assert_eq!(managed.kind(), PipelineKind::ManagedIdentity);
	}

	#[test]
	fn general_pipeline_honors_caller_retry_options() {
		let retry = RetryOptions::default().with_max_retries(7).with_status_codes([418]);
		let options =
			TokenCredentialOptions::default().with_transport(transport()).with_retry(retry.clone());
		let pipeline = new_default_pipeline(&options).expect("General pipeline should build.");

		assert_eq!(pipeline.retry_options(), Some(&retry));
	}

	#[test]
	fn invalid_retry_options_fail_construction() {
		let retry = RetryOptions::default().with_try_timeout(Duration::ZERO);
		let err = new_default_pipeline(
			&TokenCredentialOptions::default().with_transport(transport()).with_retry(retry),
		)
		.expect_err("Zero try timeout should be rejected.");

		assert!(matches!(err, ConfigError::InvalidRetryOptions { .. }));
	}

	#[cfg(not(feature = "reqwest"))]
	#[test]
	fn missing_transport_fails_loudly() {
		let err = new_managed_identity_pipeline(&ManagedIdentityCredentialOptions::default())
			.expect_err("No transport should be available without reqwest.");

		assert!(matches!(err, ConfigError::MissingTransport));
	}
}
