//! Client-level error types shared across the session core, stores, and API operations.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared error handle used where one failure fans out to several callers.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server answered with a body the client could not decode.
	#[error(transparent)]
	Response(#[from] ResponseError),
	/// Token renewal failed; the session has been terminated.
	#[error(transparent)]
	Refresh(#[from] RefreshError),

	/// A protected call was rejected again after its single refresh-and-retry cycle.
	#[error("Request was rejected as unauthorized (status {status}).")]
	Unauthorized {
		/// HTTP status code of the final rejection.
		status: u16,
	},
	/// The login response did not carry a bearer token under any accepted field name.
	#[error("Login response did not contain an access token.")]
	MissingToken,
	/// The login response announced a validity window that is not a positive number of seconds.
	#[error("Login response carried an invalid token lifetime: {value}.")]
	InvalidTokenLifetime {
		/// Raw value found in the response.
		value: String,
	},
	/// The API answered with a non-success status.
	#[error("API call to {path} failed with status {status}: {message}.")]
	Api {
		/// Request path that failed.
		path: String,
		/// HTTP status code returned by the server.
		status: u16,
		/// Short description extracted from the response body.
		message: String,
	},
}

/// Configuration and validation failures raised while building the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Endpoint path or route does not start with `/`.
	#[error("The {name} path must start with '/': {path}.")]
	InvalidPath {
		/// Which path failed validation.
		name: &'static str,
		/// Offending value.
		path: String,
	},
	/// Duration setting must be strictly positive.
	#[error("The {name} duration must be positive.")]
	NonPositiveDuration {
		/// Which setting failed validation.
		name: &'static str,
	},
	/// Required environment variable is not set.
	#[error("Environment variable {var} is not set.")]
	MissingEnv {
		/// Variable name.
		var: &'static str,
	},
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable {var} is invalid: {value}.")]
	InvalidEnv {
		/// Variable name.
		var: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Response decoding failures.
#[derive(Debug, ThisError)]
pub enum ResponseError {
	/// Endpoint responded with JSON that does not match the expected shape.
	#[error("Response from {path} is malformed JSON.")]
	Parse {
		/// Request path that produced the body.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded its timeout.
	#[error("Request to {path} timed out.")]
	Timeout {
		/// Request path.
		path: String,
	},
	/// Request URL could not be assembled from the base URL and path.
	#[error("Request URL for {path} is invalid.")]
	InvalidUrl {
		/// Request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(path: impl Into<String>, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

/// Token renewal failures. Cloneable so a single outcome can be handed to every waiter.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// Renewal endpoint answered with a non-success status.
	#[error("Renewal endpoint rejected the session with status {status}.")]
	Rejected {
		/// HTTP status code returned by the renewal endpoint.
		status: u16,
	},
	/// Renewal endpoint did not answer before the refresh timeout.
	#[error("Renewal endpoint timed out.")]
	Timeout,
	/// Renewal endpoint could not be reached.
	#[error("Renewal endpoint is unreachable.")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: SharedError,
	},
	/// Renewal endpoint answered without a usable token or validity window.
	#[error("Renewal response is malformed: {source}.")]
	MalformedResponse {
		/// What was wrong with the body.
		#[source]
		source: SharedError,
	},
	/// The renewed token could not be persisted.
	#[error("Renewed token could not be stored.")]
	Storage(#[source] crate::store::StoreError),
	/// The refreshing task was dropped before it produced an outcome.
	#[error("Refresh was abandoned before completion.")]
	Abandoned,
}
impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Timeout { .. } => Self::Timeout,
			other => Self::Transport { source: Arc::new(other) },
		}
	}
}

#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
