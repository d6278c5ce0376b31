//! Caller-facing option sets consumed by the pipeline factory.

// self
use crate::{
	_prelude::*,
	authority::{self, AzureCloud},
	error::ConfigError,
	http::Transport,
	pipeline::{self, Pipeline, RetryOptions},
};

/// Configures how credentials talk to the identity provider.
#[derive(Clone, Default)]
pub struct TokenCredentialOptions {
	/// Authority host URL; `None` uses `AZURE_AUTHORITY_HOST` or the public cloud.
	pub authority_host: Option<String>,
	/// Transport for outbound requests; `None` uses the default reqwest client.
	pub transport: Option<Arc<dyn Transport>>,
	/// Request-log stage behavior.
	pub logging: LogOptions,
	/// Retry stage behavior; `None` uses [`RetryOptions::default`].
	pub retry: Option<RetryOptions>,
	/// Telemetry stage behavior.
	pub telemetry: TelemetryOptions,
}
impl TokenCredentialOptions {
	/// Sets an explicit authority host.
	pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
		self.authority_host = Some(host.into());

		self
	}

	/// Targets one of the well-known clouds.
	pub fn with_cloud(self, cloud: AzureCloud) -> Self {
		self.with_authority_host(cloud.authority_host_str())
	}

	/// Supplies a custom transport.
	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the request-log options.
	pub fn with_logging(mut self, logging: LogOptions) -> Self {
		self.logging = logging;

		self
	}

	/// Overrides the retry options.
	pub fn with_retry(mut self, retry: RetryOptions) -> Self {
		self.retry = Some(retry);

		self
	}

	/// Overrides the telemetry options.
	pub fn with_telemetry(mut self, telemetry: TelemetryOptions) -> Self {
		self.telemetry = telemetry;

		self
	}

	/// Resolves and normalizes the authority host against the process environment.
	pub fn resolve_authority_host(&self) -> Result<Url, ConfigError> {
		authority::resolve_authority_host(self.authority_host.as_deref())
	}
}
impl Debug for TokenCredentialOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCredentialOptions")
			.field("authority_host", &self.authority_host)
			.field("transport_set", &self.transport.is_some())
			.field("logging", &self.logging)
			.field("retry", &self.retry)
			.field("telemetry", &self.telemetry)
			.finish()
	}
}

/// Options for managed-identity credentials. Retry behavior is fixed and not configurable.
#[derive(Clone, Default)]
pub struct ManagedIdentityCredentialOptions {
	/// Transport for outbound requests; `None` uses the default reqwest client.
	pub transport: Option<Arc<dyn Transport>>,
	/// Request-log stage behavior.
	pub logging: LogOptions,
	/// Telemetry stage behavior.
	pub telemetry: TelemetryOptions,
}
impl ManagedIdentityCredentialOptions {
	/// Supplies a custom transport.
	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the request-log options.
	pub fn with_logging(mut self, logging: LogOptions) -> Self {
		self.logging = logging;

		self
	}

	/// Overrides the telemetry options.
	pub fn with_telemetry(mut self, telemetry: TelemetryOptions) -> Self {
		self.telemetry = telemetry;

		self
	}
}
impl Debug for ManagedIdentityCredentialOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ManagedIdentityCredentialOptions")
			.field("transport_set", &self.transport.is_some())
			.field("logging", &self.logging)
			.field("telemetry", &self.telemetry)
			.finish()
	}
}

/// Request-log stage options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
	/// Logs response bodies. Token responses carry secrets, so this stays off by default.
	pub include_body: bool,
}

/// Telemetry stage options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelemetryOptions {
	/// Prefix for the `User-Agent` header: at most 24 visible ASCII characters, no spaces.
	pub application_id: Option<String>,
	/// Skips the telemetry header entirely.
	pub disabled: bool,
}
impl TelemetryOptions {
	/// Sets the application identifier.
	pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
		self.application_id = Some(application_id.into());

		self
	}
}

/// Fully resolved credential context: normalized authority host plus the general pipeline.
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
	/// Normalized authority host; its path always ends in `/`.
	pub authority_host: Url,
	/// General pipeline built from the options.
	pub pipeline: Pipeline,
}
impl ResolvedOptions {
	/// Resolves `options` against the process environment. `None` means all defaults.
	pub fn resolve(options: Option<TokenCredentialOptions>) -> Result<Self> {
		Self::resolve_with(options, |key| std::env::var(key).ok())
	}

	/// Same as [`ResolvedOptions::resolve`] with an injectable environment lookup.
	pub fn resolve_with<F>(options: Option<TokenCredentialOptions>, env: F) -> Result<Self>
	where
		F: FnOnce(&str) -> Option<String>,
	{
		let options = options.unwrap_or_default();
		let authority_host =
			authority::resolve_authority_host_with(options.authority_host.as_deref(), env)?;
		let pipeline = pipeline::new_default_pipeline(&options)?;

		Ok(Self { authority_host, pipeline })
	}

	/// Joins `suffix` (tenant, endpoint path, ...) onto the authority host.
	pub fn endpoint(&self, suffix: &str) -> Result<Url, ConfigError> {
		self.authority_host
			.join(suffix)
			.map_err(|source| ConfigError::InvalidEndpoint { suffix: suffix.to_owned(), source })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::ScriptedTransport;

	fn options() -> TokenCredentialOptions {
		TokenCredentialOptions::default()
			.with_transport(Arc::new(ScriptedTransport::always(200, "")))
	}

	#[test]
	fn missing_options_resolve_to_defaults() {
		let resolved = ResolvedOptions::resolve_with(None, |_| None);

		// Without an injected transport this needs the default client.
		#[cfg(feature = "reqwest")]
		{
			let resolved = resolved.expect("Default options should resolve.");

			assert_eq!(resolved.authority_host.as_str(), authority::AZURE_PUBLIC_CLOUD);
		}
		#[cfg(not(feature = "reqwest"))]
		assert!(matches!(resolved, Err(Error::Config(ConfigError::MissingTransport))));
	}

	#[test]
	fn explicit_host_ignores_environment() {
		let resolved = ResolvedOptions::resolve_with(
			Some(options().with_cloud(AzureCloud::Government)),
			|_| Some(authority::AZURE_CHINA.into()),
		)
		.expect("Explicit cloud should resolve.");

		assert_eq!(resolved.authority_host.as_str(), authority::AZURE_GOVERNMENT);
	}

	#[test]
	fn environment_override_applies_without_explicit_host() {
		let resolved = ResolvedOptions::resolve_with(Some(options()), |_| {
			Some("https://login.sovereign.example".into())
		})
		.expect("Environment override should resolve.");

		assert_eq!(resolved.authority_host.as_str(), "https://login.sovereign.example/");
	}

	#[test]
	fn malformed_explicit_host_is_reported() {
		let err =
			ResolvedOptions::resolve_with(Some(options().with_authority_host("bogus")), |_| None)
				.expect_err("Malformed explicit host should fail.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidAuthorityHost { .. })));
	}

	#[test]
	fn endpoint_joins_onto_normalized_host() {
		let resolved = ResolvedOptions::resolve_with(
			Some(options().with_authority_host("https://login.example.com/root")),
			|_| None,
		)
		.expect("Custom host should resolve.");
		let endpoint =
			resolved.endpoint("tenant-a/oauth2/v2.0/token").expect("Endpoint should join.");

		assert_eq!(endpoint.as_str(), "https://login.example.com/root/tenant-a/oauth2/v2.0/token");
	}
}
