//! Stage that stamps each call with a unique client request id.

// self
use crate::{
	_prelude::*,
	http::Request,
	pipeline::{Context, Next, Stage, StageFuture},
};

/// Header carrying the client request id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Sets [`CLIENT_REQUEST_ID_HEADER`] to a random v4 UUID unless the caller set one.
///
/// The stage sits outside retry, so every attempt of one call shares the same id.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniqueRequestIdStage;
impl UniqueRequestIdStage {
	/// Stage label.
	pub const NAME: &'static str = "request_id";
}
impl Stage for UniqueRequestIdStage {
	fn name(&self) -> &'static str {
		Self::NAME
	}

	fn process<'a>(
		&'a self,
		ctx: &'a Context,
		mut request: Request,
		next: Next<'a>,
	) -> StageFuture<'a> {
		let generated = (!request.headers.contains_key(CLIENT_REQUEST_ID_HEADER))
			.then(new_request_id)
			.and_then(|id| HeaderValue::try_from(id).ok());

		if let Some(value) = generated {
			request.headers.insert(CLIENT_REQUEST_ID_HEADER, value);
		}

		next.run(ctx, request)
	}
}

/// Formats 128 random bits as a v4 UUID.
pub fn new_request_id() -> String {
	let mut bytes: [u8; 16] = rand::random();

	bytes[6] = (bytes[6] & 0x0f) | 0x40;
	bytes[8] = (bytes[8] & 0x3f) | 0x80;

	let v = u128::from_be_bytes(bytes);

	format!(
		"{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
		v >> 96,
		(v >> 80) & 0xffff,
		(v >> 64) & 0xffff,
		(v >> 48) & 0xffff,
		v & 0xffff_ffff_ffff,
	)
}
