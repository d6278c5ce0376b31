//! Authority resolution, retrying request pipelines, and a terminal error taxonomy shared by
//! every credential that talks to an Azure-Active-Directory-style identity provider.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod authority;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod scope;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use parking_lot::Mutex;
	// self
	use crate::{
		error::TransportError,
		http::{Request, Response, Transport, TransportFuture},
		pipeline::{Context, Next, Stage, StageFuture},
	};

	/// One scripted outcome replayed by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub enum Scripted {
		/// Respond with the given status and body.
		Respond(u16, String),
		/// Respond with a fully built response, headers included.
		Reply(Response),
		/// Fail with a network error carrying the given message.
		Fail(String),
		/// Sleep, then respond with `200 {}`; used to trip try timeouts.
		Stall(Duration),
	}
	impl Scripted {
		/// Shorthand for [`Scripted::Respond`].
		pub fn respond(status: u16, body: impl Into<String>) -> Self {
			Self::Respond(status, body.into())
		}

		/// Shorthand for [`Scripted::Fail`].
		pub fn fail(message: impl Into<String>) -> Self {
			Self::Fail(message.into())
		}
	}

	/// In-process transport that replays a fixed script and counts calls.
	///
	/// Once the script is exhausted the last entry is repeated.
	#[derive(Debug)]
	pub struct ScriptedTransport {
		script: Vec<Scripted>,
		calls: AtomicUsize,
		seen: Mutex<VecDeque<Request>>,
	}
	impl ScriptedTransport {
		/// Creates a transport replaying `script` in order.
		pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
			Self {
				script: script.into_iter().collect(),
				calls: AtomicUsize::new(0),
				seen: Default::default(),
			}
		}

		/// Creates a transport that always answers with `status` and `body`.
		pub fn always(status: u16, body: impl Into<String>) -> Self {
			Self::new([Scripted::respond(status, body)])
		}

		/// Number of requests dispatched so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Requests observed by the transport, oldest first.
		pub fn seen(&self) -> Vec<Request> {
			self.seen.lock().iter().cloned().collect()
		}
	}
	impl Transport for ScriptedTransport {
		fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
			let idx = self.calls.fetch_add(1, Ordering::SeqCst);
			let step = self
				.script
				.get(idx)
				.or_else(|| self.script.last())
				.cloned()
				.unwrap_or(Scripted::Respond(200, String::new()));

			self.seen.lock().push_back(request.clone());

			Box::pin(async move {
				match step {
					Scripted::Respond(status, body) => Ok(response(status, body)),
					Scripted::Reply(response) => Ok(response),
					Scripted::Fail(message) =>
						Err(TransportError::network(std::io::Error::other(message))),
					Scripted::Stall(delay) => {
						tokio::time::sleep(delay.unsigned_abs()).await;

						Ok(response(200, "{}"))
					},
				}
			})
		}
	}

	/// Echoes the request body back with status 200 after a short, body-dependent pause.
	#[derive(Clone, Copy, Debug, Default)]
	pub struct EchoTransport;
	impl Transport for EchoTransport {
		fn send<'a>(&'a self, request: &'a Request) -> TransportFuture<'a> {
			Box::pin(async move {
				let pause = request.body.len() as u64 % 7;

				tokio::time::sleep(std::time::Duration::from_millis(pause)).await;

				Ok(Response::new(StatusCode::OK, request.body.clone()))
			})
		}
	}

	/// Stage recording the attempt number of every request it sees.
	#[derive(Debug, Default)]
	pub struct AttemptRecorder {
		attempts: Mutex<Vec<u32>>,
	}
	impl AttemptRecorder {
		/// Attempt numbers observed so far, oldest first.
		pub fn attempts(&self) -> Vec<u32> {
			self.attempts.lock().clone()
		}
	}
	impl Stage for AttemptRecorder {
		fn name(&self) -> &'static str {
			"attempt_recorder"
		}

		fn process<'a>(
			&'a self,
			ctx: &'a Context,
			request: Request,
			next: Next<'a>,
		) -> StageFuture<'a> {
			self.attempts.lock().push(request.attempt);

			next.run(ctx, request)
		}
	}

	/// Builds a header-less response.
	pub fn response(status: u16, body: impl Into<Vec<u8>>) -> Response {
		Response::new(
			StatusCode::from_u16(status).expect("Scripted status should be valid."),
			body.into(),
		)
	}

	/// Parses a URL literal used by tests.
	pub fn url(value: &str) -> Url {
		Url::parse(value).expect("Test URL should parse.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
