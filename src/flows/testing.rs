//! Scripted transport and token helpers shared by flow unit tests.

// std
use std::collections::HashMap;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::TransportError,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
};

#[derive(Clone, Debug)]
pub(crate) enum Reply {
	Json(u16, serde_json::Value),
	Raw(u16, &'static str),
	Timeout,
}

/// Answers requests per path from a FIFO script; the last reply for a path repeats.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
	replies: Mutex<HashMap<String, VecDeque<Reply>>>,
	gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
	requests: Mutex<Vec<ApiRequest>>,
}
impl ScriptedTransport {
	pub(crate) fn reply(&self, path: &str, reply: Reply) -> &Self {
		self.replies.lock().entry(path.to_owned()).or_default().push_back(reply);

		self
	}

	/// Holds the next call to `path` until the returned sender fires (or is dropped).
	pub(crate) fn gate(&self, path: &str) -> oneshot::Sender<()> {
		let (release, gate) = oneshot::channel();

		self.gates.lock().insert(path.to_owned(), gate);

		release
	}

	pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
		self.requests.lock().iter().filter(|request| request.path == path).cloned().collect()
	}

	pub(crate) fn calls_to(&self, path: &str) -> usize {
		self.requests_to(path).len()
	}

	fn next_reply(&self, path: &str) -> Option<Reply> {
		let mut replies = self.replies.lock();
		let queue = replies.get_mut(path)?;

		if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let path = request.path.clone();
		let reply = self.next_reply(&path);
		let gate = self.gates.lock().remove(&path);

		self.requests.lock().push(request);

		Box::pin(async move {
			if let Some(gate) = gate {
				let _ = gate.await;
			}

			match reply {
				Some(Reply::Json(status, body)) => Ok(ApiResponse::new(path, status, body.to_string())),
				Some(Reply::Raw(status, body)) => Ok(ApiResponse::new(path, status, body)),
				Some(Reply::Timeout) => Err(TransportError::Timeout { path }),
				None => Ok(ApiResponse::new(path, 404, "")),
			}
		})
	}
}

/// Mints an unsigned JWT whose `exp` claim is `exp`.
pub(crate) fn jwt(exp: OffsetDateTime) -> AccessToken {
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{}}}"#, exp.unix_timestamp()));

	AccessToken::new(format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig"))
}

/// JWT expiring `secs` seconds from now.
pub(crate) fn jwt_expiring_in(secs: i64) -> AccessToken {
	jwt(OffsetDateTime::now_utc() + Duration::seconds(secs))
}
