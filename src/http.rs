//! Transport primitives for API calls.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. The session core builds
//! transport-neutral [`ApiRequest`] values, hands them to the transport, and inspects the
//! returned [`ApiResponse`]. The default [`ReqwestTransport`] keeps a cookie jar so the
//! renewal endpoint can authenticate through the ambient session cookie, and applies the
//! per-request timeout carried by the request.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, ResponseError, TransportError},
};
#[cfg(feature = "reqwest")]
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute [`ApiRequest`]s.
///
/// Implementations must not interpret status codes: every HTTP answer, including 401, is an
/// `Ok` response. Only failures to obtain an answer (network, timeout) are errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves with the server's answer.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Transport-neutral outbound request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path appended to the configured base URL; starts with `/`.
	pub path: String,
	/// Query parameters in insertion order.
	pub query: Vec<(String, String)>,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
	/// Bearer token attached as the `Authorization` header.
	pub bearer: Option<AccessToken>,
	/// Upper bound for the whole exchange.
	pub timeout: Option<StdDuration>,
	retried: bool,
}
impl ApiRequest {
	/// Creates an unauthenticated request without body or query.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
			bearer: None,
			timeout: None,
			retried: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<B>(mut self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body)?);

		Ok(self)
	}

	/// Bounds the exchange with a timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Attaches a bearer token.
	pub fn with_bearer(mut self, token: AccessToken) -> Self {
		self.bearer = Some(token);

		self
	}

	/// Removes any bearer token.
	pub fn without_bearer(mut self) -> Self {
		self.bearer = None;

		self
	}

	/// Returns `true` once the request has spent its single refresh-and-retry cycle.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	pub(crate) fn mark_retried(mut self) -> Self {
		self.retried = true;

		self
	}
}

/// Server answer captured by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// Path of the request that produced this response.
	pub path: String,
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Status code signalling an authorization failure.
	pub const UNAUTHORIZED: u16 = 401;

	/// Creates a response for the request at `path`.
	pub fn new(path: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { path: path.into(), status, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for 401 responses.
	pub fn is_unauthorized(&self) -> bool {
		self.status == Self::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing field path on mismatch.
	pub fn json<T>(&self) -> Result<T, ResponseError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| ResponseError::Parse {
			path: self.path.clone(),
			source,
			status: self.status,
		})
	}

	/// Short human-readable failure description taken from the body.
	///
	/// Prefers a `respText` or `message` field, then falls back to the (truncated) raw text.
	pub fn error_message(&self) -> String {
		const MAX_PREVIEW: usize = 200;

		if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) {
			for key in ["respText", "message", "error"] {
				if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
					return text.to_owned();
				}
			}
		}

		let text = String::from_utf8_lossy(&self.body);
		let trimmed = text.trim();

		if trimmed.is_empty() {
			return "empty response body".into();
		}

		trimmed.chars().take(MAX_PREVIEW).collect()
	}
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`] with a cookie jar.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a cookie-enabled client for `base_url`.
	pub fn new(base_url: Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self::with_client(client, base_url))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Enable its cookie store if the renewal
	/// endpoint relies on the session cookie.
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, TransportError> {
		let joined = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
		let mut url = Url::parse(&joined)
			.map_err(|source| TransportError::InvalidUrl { path: path.to_owned(), source })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		Ok(url)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let ApiRequest { method, path, query, body, bearer, timeout, .. } = request;
			let url = self.url_for(&path, &query)?;
			let mut builder =
				self.client.request(reqwest_method(method), url).header(ACCEPT, "application/json");

			if let Some(token) = bearer {
				builder = builder.header(AUTHORIZATION, token.bearer_header());
			}
			if let Some(body) = body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}
			if let Some(timeout) = timeout {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await.map_err(|e| map_reqwest_error(&path, e))?;
			let status = response.status().as_u16();
			let bytes = response.bytes().await.map_err(|e| map_reqwest_error(&path, e))?;

			Ok(ApiResponse::new(path, status, bytes.to_vec()))
		})
	}
}

#[cfg(feature = "reqwest")]
fn reqwest_method(method: Method) -> reqwest::Method {
	match method {
		Method::Get => reqwest::Method::GET,
		Method::Post => reqwest::Method::POST,
		Method::Put => reqwest::Method::PUT,
		Method::Patch => reqwest::Method::PATCH,
		Method::Delete => reqwest::Method::DELETE,
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		TransportError::Timeout { path: path.to_owned() }
	} else {
		TransportError::network(path, err)
	}
}
