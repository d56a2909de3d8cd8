//! Client configuration: API location, endpoint paths, and token lifetime policy.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the API base URL.
pub const ENV_API_URL: &str = "LABREC_API_URL";
/// Environment variable overriding the proactive refresh threshold, in seconds.
pub const ENV_REFRESH_THRESHOLD_SECS: &str = "LABREC_REFRESH_THRESHOLD_SECS";
/// Environment variable overriding the stored token lifetime, in seconds.
pub const ENV_TOKEN_TTL_SECS: &str = "LABREC_TOKEN_TTL_SECS";
/// Environment variable overriding the renewal call timeout, in seconds.
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "LABREC_REFRESH_TIMEOUT_SECS";

/// Paths of the API endpoints consumed by the client, relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Login endpoint accepting `{ username, password }`.
	pub login: String,
	/// Best-effort logout endpoint.
	pub logout: String,
	/// Renewal endpoint authenticated by the ambient session cookie.
	pub refresh: String,
	/// Current-user endpoint.
	pub me: String,
	/// Default-value list/create endpoint.
	pub default_values: String,
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			logout: "/auth/logout".into(),
			refresh: "/auth/refresh".into(),
			me: "/auth/me".into(),
			default_values: "/default-value".into(),
		}
	}
}

/// Immutable client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// API base URL; endpoint paths are appended to it.
	pub base_url: Url,
	/// Endpoint paths.
	pub endpoints: Endpoints,
	/// Route of the login boundary handed to the navigator on session expiry.
	pub login_route: String,
	/// Remaining lifetime below which a token is renewed before use.
	pub refresh_threshold: Duration,
	/// Lifetime enforced by the token store for newly stored tokens.
	pub token_ttl: Duration,
	/// Upper bound for a single renewal call.
	pub refresh_timeout: Duration,
}
impl ClientConfig {
	/// Default proactive refresh threshold.
	pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::seconds(300);
	/// Default stored token lifetime.
	pub const DEFAULT_TOKEN_TTL: Duration = Duration::minutes(15);
	/// Default renewal call timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Builds a configuration from `LABREC_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|var| env::var(var).ok())
	}

	/// Builds a configuration from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let raw_url = lookup(ENV_API_URL).ok_or(ConfigError::MissingEnv { var: ENV_API_URL })?;
		let base_url =
			Url::parse(&raw_url).map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let mut builder = Self::builder(base_url);

		if let Some(secs) = lookup_secs(&lookup, ENV_REFRESH_THRESHOLD_SECS)? {
			builder = builder.refresh_threshold(secs);
		}
		if let Some(secs) = lookup_secs(&lookup, ENV_TOKEN_TTL_SECS)? {
			builder = builder.token_ttl(secs);
		}
		if let Some(secs) = lookup_secs(&lookup, ENV_REFRESH_TIMEOUT_SECS)? {
			builder = builder.refresh_timeout(secs);
		}

		builder.build()
	}

	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}

		validate_path("login", &self.endpoints.login)?;
		validate_path("logout", &self.endpoints.logout)?;
		validate_path("refresh", &self.endpoints.refresh)?;
		validate_path("me", &self.endpoints.me)?;
		validate_path("default_values", &self.endpoints.default_values)?;
		validate_path("login_route", &self.login_route)?;
		validate_positive("refresh_threshold", self.refresh_threshold)?;
		validate_positive("token_ttl", self.token_ttl)?;
		validate_positive("refresh_timeout", self.refresh_timeout)?;

		Ok(())
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	endpoints: Endpoints,
	login_route: String,
	refresh_threshold: Duration,
	token_ttl: Duration,
	refresh_timeout: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder with default paths and lifetimes.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: Endpoints::default(),
			login_route: "/login".into(),
			refresh_threshold: ClientConfig::DEFAULT_REFRESH_THRESHOLD,
			token_ttl: ClientConfig::DEFAULT_TOKEN_TTL,
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
		}
	}

	/// Overrides every endpoint path.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the renewal endpoint path.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the login boundary route.
	pub fn login_route(mut self, route: impl Into<String>) -> Self {
		self.login_route = route.into();

		self
	}

	/// Overrides the proactive refresh threshold.
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold = threshold;

		self
	}

	/// Overrides the stored token lifetime.
	pub fn token_ttl(mut self, ttl: Duration) -> Self {
		self.token_ttl = ttl;

		self
	}

	/// Overrides the renewal call timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			login_route: self.login_route,
			refresh_threshold: self.refresh_threshold,
			token_ttl: self.token_ttl,
			refresh_timeout: self.refresh_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

fn lookup_secs<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let Some(raw) = lookup(var) else {
		return Ok(None);
	};

	raw.trim()
		.parse::<i64>()
		.map(|secs| Some(Duration::seconds(secs)))
		.map_err(|_| ConfigError::InvalidEnv { var, value: raw })
}

fn validate_path(name: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::InvalidPath { name, path: path.to_owned() })
	}
}

fn validate_positive(name: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { name }) }
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn builder_applies_defaults() {
		let config = ClientConfig::builder(url("https://lab.example.com/api"))
			.build()
			.expect("Default configuration should validate.");

		assert_eq!(config.endpoints.login, "/auth/login");
		assert_eq!(config.endpoints.refresh, "/auth/refresh");
		assert_eq!(config.login_route, "/login");
		assert_eq!(config.refresh_threshold, Duration::seconds(300));
		assert_eq!(config.token_ttl, Duration::seconds(900));
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let err = ClientConfig::builder(url("ftp://lab.example.com"))
			.build()
			.expect_err("Non-HTTP schemes should be rejected.");

		assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));

		let err = ClientConfig::builder(url("https://lab.example.com"))
			.refresh_endpoint("auth/refresh")
			.build()
			.expect_err("Relative endpoint paths should be rejected.");

		assert!(matches!(err, ConfigError::InvalidPath { name: "refresh", .. }));

		let err = ClientConfig::builder(url("https://lab.example.com"))
			.token_ttl(Duration::ZERO)
			.build()
			.expect_err("Zero token lifetimes should be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveDuration { name: "token_ttl" }));
	}

	#[test]
	fn lookup_reads_overrides() {
		let vars = HashMap::from([
			(ENV_API_URL, "http://localhost:8080"),
			(ENV_REFRESH_THRESHOLD_SECS, "120"),
			(ENV_TOKEN_TTL_SECS, " 600 "),
		]);
		let config = ClientConfig::from_lookup(|var| vars.get(var).map(|v| v.to_string()))
			.expect("Environment lookup should produce a valid configuration.");

		assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
		assert_eq!(config.refresh_threshold, Duration::seconds(120));
		assert_eq!(config.token_ttl, Duration::seconds(600));
		assert_eq!(config.refresh_timeout, ClientConfig::DEFAULT_REFRESH_TIMEOUT);
	}

	#[test]
	fn lookup_reports_missing_and_invalid_values() {
		let err = ClientConfig::from_lookup(|_| None)
			.expect_err("A missing base URL should be reported.");

		assert!(matches!(err, ConfigError::MissingEnv { var: ENV_API_URL }));

		let vars = HashMap::from([(ENV_API_URL, "http://localhost"), (ENV_TOKEN_TTL_SECS, "soon")]);
		let err = ClientConfig::from_lookup(|var| vars.get(var).map(|v| v.to_string()))
			.expect_err("Non-numeric durations should be reported.");

		assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_TOKEN_TTL_SECS, .. }));
	}
}
