//! Terminal error taxonomy shared by every credential built on the request pipeline.
//!
//! Retry decisions belong to the pipeline's retry stage. Once an error leaves
//! [`Pipeline`](crate::pipeline::Pipeline) it is final, so every variant reports itself as
//! non-retriable to caller-side logic.

// self
use crate::{_prelude::*, http::Response};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// A precondition for attempting authentication is absent; no request was sent.
	#[error(transparent)]
	CredentialUnavailable(#[from] CredentialUnavailableError),
	/// The provider answered with a non-success status.
	#[error(transparent)]
	ProviderAuthenticationFailed(#[from] ProviderAuthenticationError),
	/// Authentication failed before any response was received (transport, timeout, ...).
	#[error(transparent)]
	AuthenticationFailed(#[from] AuthenticationFailedError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Always `false`: the pipeline already spent its retry budget before this error existed.
	pub fn is_retriable(&self) -> bool {
		!self.is_not_retriable()
	}

	/// Reports whether the error is terminal for caller-side retry logic.
	pub fn is_not_retriable(&self) -> bool {
		match self {
			Self::CredentialUnavailable(e) => e.is_not_retriable(),
			Self::ProviderAuthenticationFailed(e) => e.is_not_retriable(),
			Self::AuthenticationFailed(e) => e.is_not_retriable(),
			Self::Config(_) => true,
		}
	}

	/// Walks the [`source`](StdError::source) chain and returns the innermost error.
	pub fn root_cause(&self) -> &(dyn StdError + 'static) {
		let mut current: &(dyn StdError + 'static) = self;

		while let Some(next) = current.source() {
			current = next;
		}

		current
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		Self::AuthenticationFailed(AuthenticationFailedError::new(e))
	}
}

/// Raised by credentials when the inputs required to authenticate do not exist.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{credential_type}: {message}")]
pub struct CredentialUnavailableError {
	/// Name of the credential that is unavailable.
	pub credential_type: String,
	/// Reason the credential is unavailable.
	pub message: String,
}
impl CredentialUnavailableError {
	/// Creates a new error for `credential_type`.
	pub fn new(credential_type: impl Into<String>, message: impl Into<String>) -> Self {
		Self { credential_type: credential_type.into(), message: message.into() }
	}

	/// Always `true`.
	pub const fn is_not_retriable(&self) -> bool {
		true
	}
}

/// Error body returned by the identity provider on failure.
///
/// Every field is optional because providers (and proxies in front of them) are free to
/// omit any of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderErrorPayload {
	/// OAuth `error` code.
	#[serde(rename = "error")]
	pub message: Option<String>,
	/// OAuth `error_description`.
	#[serde(rename = "error_description")]
	pub description: Option<String>,
	/// Provider timestamp of the failure.
	pub timestamp: Option<String>,
	/// Provider trace identifier.
	pub trace_id: Option<String>,
	/// Provider correlation identifier.
	pub correlation_id: Option<String>,
	/// Documentation link for the failure.
	#[serde(rename = "error_uri")]
	pub uri: Option<String>,
}
impl ProviderErrorPayload {
	/// Joins the non-empty parts of `error` and `error_description` with a single space.
	pub fn summary(&self) -> String {
		[&self.message, &self.description]
			.into_iter()
			.filter_map(|part| part.as_deref().filter(|p| !p.is_empty()))
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn is_blank(&self) -> bool {
		let blank = |field: &Option<String>| field.as_deref().is_none_or(str::is_empty);

		blank(&self.message) && blank(&self.description)
	}
}

/// Non-success response from the identity provider, parsed into a [`ProviderErrorPayload`].
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct ProviderAuthenticationError {
	message: String,
	payload: ProviderErrorPayload,
	response: Response,
}
impl ProviderAuthenticationError {
	/// Classifies a completed response.
	///
	/// Never fails: a body that is not a JSON error object yields a payload whose message is
	/// the status line and whose description names the parse failure.
	pub fn from_response(response: Response) -> Self {
		let payload = match response.unmarshal_json::<ProviderErrorPayload>() {
			Ok(payload) if !payload.is_blank() => payload,
			Ok(payload) => ProviderErrorPayload {
				message: Some(response.status_line()),
				description: None,
				..payload
			},
			Err(e) => ProviderErrorPayload {
				message: Some(response.status_line()),
				description: Some(format!("Failed to unmarshal response: {e}")),
				..Default::default()
			},
		};
		let message = payload.summary();

		Self { message, payload, response }
	}

	/// Parsed provider payload.
	pub fn payload(&self) -> &ProviderErrorPayload {
		&self.payload
	}

	/// Response that produced the error.
	pub fn response(&self) -> &Response {
		&self.response
	}

	/// HTTP status of the originating response.
	pub fn status(&self) -> StatusCode {
		self.response.status
	}

	/// Releases the originating response.
	pub fn into_response(self) -> Response {
		self.response
	}

	/// Always `true`.
	pub const fn is_not_retriable(&self) -> bool {
		true
	}
}

/// Generic authentication failure wrapping a lower-level cause.
pub struct AuthenticationFailedError {
	inner: BoxError,
	message: Option<String>,
}
impl AuthenticationFailedError {
	/// Wraps `inner`; the message falls back to the inner error's display output.
	pub fn new(inner: impl Into<BoxError>) -> Self {
		Self { inner: inner.into(), message: None }
	}

	/// Wraps `inner` with a precomputed message. An empty message is ignored.
	pub fn with_message(message: impl Into<String>, inner: impl Into<BoxError>) -> Self {
		let message = Some(message.into()).filter(|m| !m.is_empty());

		Self { inner: inner.into(), message }
	}

	/// Wrapped cause.
	pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
		self.inner.as_ref()
	}

	/// Downcasts the wrapped cause.
	pub fn downcast_inner<E>(&self) -> Option<&E>
	where
		E: 'static + StdError,
	{
		self.inner.downcast_ref()
	}

	/// Always `true`.
	pub const fn is_not_retriable(&self) -> bool {
		true
	}
}
impl Debug for AuthenticationFailedError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticationFailedError")
			.field("message", &self.message)
			.field("inner", &self.inner)
			.finish()
	}
}
impl Display for AuthenticationFailedError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if let Some(message) = &self.message {
			return f.write_str(message);
		}

		let inner = self.inner.to_string();

		if inner.is_empty() { f.write_str("Authentication failed.") } else { f.write_str(&inner) }
	}
}
impl StdError for AuthenticationFailedError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		Some(self.inner.as_ref())
	}
}

/// Configuration and validation failures raised while building pipelines.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Default HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No transport was supplied and no default transport is compiled in.
	#[error("No HTTP transport was supplied and the `reqwest` feature is disabled.")]
	MissingTransport,
	/// Authority host could not be parsed.
	#[error("Authority host `{value}` is not a valid URL.")]
	InvalidAuthorityHost {
		/// Rejected input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority host parsed but has no host component.
	#[error("Authority host `{value}` has no host component.")]
	AuthorityHostWithoutHost {
		/// Rejected input.
		value: String,
	},
	/// Endpoint suffix could not be joined onto the authority host.
	#[error("Endpoint suffix `{suffix}` cannot be joined onto the authority host.")]
	InvalidEndpoint {
		/// Rejected suffix.
		suffix: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Retry options are out of range.
	#[error("Retry options are invalid: {reason}.")]
	InvalidRetryOptions {
		/// Violated constraint.
		reason: &'static str,
	},
	/// Telemetry options are invalid.
	#[error("Telemetry options are invalid: {reason}.")]
	InvalidTelemetry {
		/// Violated constraint.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures observed inside the pipeline.
///
/// These never reach callers directly; [`Pipeline`](crate::pipeline::Pipeline) wraps them in
/// [`AuthenticationFailedError`] on the way out.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
	/// A single attempt exceeded the configured try timeout.
	#[error("Attempt exceeded the try timeout of {timeout}.")]
	TryTimeout {
		/// Timeout that elapsed.
		timeout: Duration,
	},
	/// The caller cancelled the request.
	#[error("Request was cancelled by the caller.")]
	Cancelled,
	/// The caller's deadline elapsed.
	#[error("Request deadline elapsed.")]
	DeadlineExceeded,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Whether the retry stage may re-attempt after this failure.
	pub fn is_retriable(&self) -> bool {
		!matches!(self, Self::Cancelled | Self::DeadlineExceeded)
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
