//! Login credentials submitted to the login endpoint.

// self
use crate::_prelude::*;

/// Username/password pair posted to the login endpoint as `{ "username", "password" }`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
	/// Account name.
	pub username: String,
	password: String,
}
impl LoginCredentials {
	/// Creates credentials for the provided account.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into() }
	}

	/// Returns the password. Callers must avoid logging this string.
	pub fn expose_password(&self) -> &str {
		&self.password
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}
