//! Shared helpers for flows that receive freshly issued tokens (login and renewal).

// self
use crate::{_prelude::*, auth::AccessToken, error::ResponseError, http::ApiResponse};

/// JSON pointers tried, in order, for the bearer token.
///
/// The backend has answered with several shapes over time, so every known location is
/// accepted.
pub const TOKEN_POINTERS: [&str; 6] = [
	"/accessToken",
	"/access_token",
	"/token",
	"/data/accessToken",
	"/data/access_token",
	"/data/token",
];

/// JSON pointers tried, in order, for the validity window in seconds.
pub const EXPIRES_IN_POINTERS: [&str; 4] =
	["/expiresIn", "/expires_in", "/data/expiresIn", "/data/expires_in"];

/// Token issued by the login or renewal endpoint.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// The bearer token.
	pub token: AccessToken,
	/// Validity window announced by the server, if any.
	pub expires_in: Option<Duration>,
	/// Full decoded response body.
	pub body: serde_json::Value,
}
impl IssuedToken {
	/// Lifetime to hand to the token store: the announced window or `fallback`.
	pub fn ttl_or(&self, fallback: Duration) -> Duration {
		self.expires_in.unwrap_or(fallback)
	}
}

#[derive(Debug, ThisError)]
pub(crate) enum IssuedTokenError {
	#[error(transparent)]
	Body(#[from] ResponseError),
	#[error("no access token field")]
	MissingToken,
	#[error("invalid expires_in value {0}")]
	InvalidExpiresIn(String),
}

/// Extracts the token and optional validity window from a success response.
pub(crate) fn parse_issued_token(response: &ApiResponse) -> Result<IssuedToken, IssuedTokenError> {
	let body: serde_json::Value = response.json()?;
	let token = TOKEN_POINTERS
		.iter()
		.filter_map(|pointer| body.pointer(pointer))
		.filter_map(serde_json::Value::as_str)
		.find(|value| !value.trim().is_empty())
		.map(AccessToken::new)
		.ok_or(IssuedTokenError::MissingToken)?;
	let expires_in = match EXPIRES_IN_POINTERS.iter().find_map(|pointer| body.pointer(pointer)) {
		None | Some(serde_json::Value::Null) => None,
		Some(raw) => Some(parse_expires_in(raw)?),
	};

	Ok(IssuedToken { token, expires_in, body })
}

fn parse_expires_in(raw: &serde_json::Value) -> Result<Duration, IssuedTokenError> {
	let secs = raw
		.as_i64()
		.or_else(|| raw.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
		.ok_or_else(|| IssuedTokenError::InvalidExpiresIn(raw.to_string()))?;

	if secs <= 0 {
		return Err(IssuedTokenError::InvalidExpiresIn(raw.to_string()));
	}

	Ok(Duration::seconds(secs))
}
