//! Telemetry stage that tags every request with a `User-Agent`.

// crates.io
use ::http::header::USER_AGENT;
// self
use crate::{
	_prelude::*,
	config::TelemetryOptions,
	error::ConfigError,
	http::Request,
	pipeline::{Context, Next, Stage, StageFuture},
};

const APPLICATION_ID_MAX_LEN: usize = 24;

/// Stage that writes the SDK `User-Agent`, prefixed by the caller's application id.
#[derive(Clone, Debug)]
pub struct TelemetryStage {
	user_agent: Option<HeaderValue>,
}
impl TelemetryStage {
	/// Stage label.
	pub const NAME: &'static str = "telemetry";

	/// Validates `options` and precomputes the header value.
	pub fn new(options: &TelemetryOptions) -> Result<Self, ConfigError> {
		if options.disabled {
			return Ok(Self { user_agent: None });
		}

		let sdk = format!(
			"azsdk-rust-identity/{} ({}; {})",
			env!("CARGO_PKG_VERSION"),
			std::env::consts::OS,
			std::env::consts::ARCH,
		);
		let value = match options.application_id.as_deref() {
			Some(id) => {
				validate_application_id(id)?;

				format!("{id} {sdk}")
			},
			None => sdk,
		};
		let user_agent = HeaderValue::try_from(value).map_err(|_| ConfigError::InvalidTelemetry {
			reason: "user agent contains invalid header characters",
		})?;

		Ok(Self { user_agent: Some(user_agent) })
	}

	/// Precomputed header value; `None` when telemetry is disabled.
	pub fn user_agent(&self) -> Option<&HeaderValue> {
		self.user_agent.as_ref()
	}
}
impl Stage for TelemetryStage {
	fn name(&self) -> &'static str {
		Self::NAME
	}

	fn process<'a>(
		&'a self,
		ctx: &'a Context,
		mut request: Request,
		next: Next<'a>,
	) -> StageFuture<'a> {
		if let Some(ours) = &self.user_agent {
			// Keep any caller-supplied agent after ours.
			let value = match request.headers.get(USER_AGENT) {
				Some(existing) =>
					HeaderValue::from_bytes(&[ours.as_bytes(), b" ", existing.as_bytes()].concat())
						.unwrap_or_else(|_| ours.clone()),
				None => ours.clone(),
			};

			request.headers.insert(USER_AGENT, value);
		}

		next.run(ctx, request)
	}
}

fn validate_application_id(id: &str) -> Result<(), ConfigError> {
	let reason = if id.len() > APPLICATION_ID_MAX_LEN {
		"application_id must be at most 24 characters"
	} else if !id.bytes().all(|b| b.is_ascii_graphic()) {
		"application_id must be visible ASCII without spaces"
	} else {
		return Ok(());
	};

	Err(ConfigError::InvalidTelemetry { reason })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn application_id_prefixes_user_agent() {
		let stage = TelemetryStage::new(&TelemetryOptions::default().with_application_id("billing"))
			.expect("Valid application id should build.");
		let agent = stage
			.user_agent()
			.and_then(|v| v.to_str().ok())
			.expect("User agent should be present when telemetry is enabled.");

		assert!(agent.starts_with("billing azsdk-rust-identity/"));
	}

	#[test]
	fn disabled_telemetry_sets_nothing() {
		let stage = TelemetryStage::new(&TelemetryOptions { disabled: true, ..Default::default() })
			.expect("Disabled telemetry should build.");

		assert!(stage.user_agent().is_none());
	}

	#[test]
	fn invalid_application_ids_are_rejected() {
		for id in ["has space", "an-application-id-that-is-too-long"] {
			let err = TelemetryStage::new(&TelemetryOptions::default().with_application_id(id))
				.expect_err("Invalid application id should fail.");

			assert!(matches!(err, ConfigError::InvalidTelemetry { .. }));
		}
	}
}
