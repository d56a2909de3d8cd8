//! Drives the client against an in-process backend through a custom [`HttpTransport`].
//!
//! 1. Implement [`HttpTransport`] so every request is answered locally.
//! 2. Hand it to [`LabClient::with_transport`] together with a token store and a navigator.
//! 3. Log in with a short-lived token and watch the pipeline renew it before the first listing.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use labrec_client::{
	auth::{AccessToken, LoginCredentials},
	config::ClientConfig,
	flows::LabClient,
	http::{ApiRequest, ApiResponse, HttpTransport, Method, TransportFuture},
	records::DefaultValueType,
	session::LogNavigator,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let backend = Arc::new(InProcessBackend::default());
	let config = ClientConfig::builder(Url::parse("https://lab.example.com/api")?).build()?;
	let client = LabClient::with_transport(
		config,
		backend.clone(),
		Arc::new(MemoryStore::default()),
		Arc::new(LogNavigator),
	);
	let session = client.login(&LoginCredentials::new("alice", "s3cret")).await?;

	println!("Logged in; token stored for {}.", session.ttl);

	for kind in DefaultValueType::ALL {
		let values = client.default_values(kind).await?;

		println!("{kind}: {:?}", values.iter().map(|value| value.value.as_str()).collect::<Vec<_>>());
	}

	let metrics = client.refresh_metrics();

	println!(
		"Renewals sent: {}, coalesced: {}, backend refresh calls: {}.",
		metrics.attempts(),
		metrics.coalesced(),
		backend.refreshes.load(Ordering::Relaxed)
	);

	client.logout().await;

	Ok(())
}

/// Backend answering login, renewal, logout, and default-value calls from memory.
#[derive(Default)]
struct InProcessBackend {
	refreshes: AtomicUsize,
}
impl InProcessBackend {
	fn answer(&self, request: &ApiRequest) -> ApiResponse {
		let reply = |status: u16, body: serde_json::Value| {
			ApiResponse::new(request.path.clone(), status, body.to_string())
		};

		match (request.method, request.path.as_str()) {
			// Two minutes left: inside the default five-minute refresh threshold.
			(Method::Post, "/auth/login") => reply(200, json!({ "accessToken": jwt(120).expose() })),
			(Method::Post, "/auth/refresh") => {
				self.refreshes.fetch_add(1, Ordering::Relaxed);

				reply(200, json!({ "accessToken": jwt(900).expose(), "expiresIn": 900 }))
			},
			(Method::Post, "/auth/logout") => reply(200, json!({ "respCode": 200 })),
			(Method::Get, "/default-value") if request.bearer.is_some() => {
				let kind = request
					.query
					.iter()
					.find_map(|(key, value)| (key == "type").then_some(value.as_str()))
					.unwrap_or_default();
				let items = match kind {
					"FormulaUnit" => vec!["mg/L", "µg/kg"],
					"TestGroup" => vec!["Metals", "Nutrients"],
					_ => vec!["ICP-MS"],
				};
				let items = items
					.into_iter()
					.enumerate()
					.map(|(id, value)| json!({ "id": id + 1, "value": value, "type": kind }))
					.collect::<Vec<_>>();
				let total = items.len();

				reply(200, json!({ "respCode": 200, "data": { "items": items, "total": total } }))
			},
			_ => reply(401, json!({ "respText": "Unauthorized" })),
		}
	}
}
impl HttpTransport for InProcessBackend {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let response = self.answer(&request);

		Box::pin(async move { Ok(response) })
	}
}

fn jwt(lifetime_secs: i64) -> AccessToken {
	let exp = (OffsetDateTime::now_utc() + Duration::seconds(lifetime_secs)).unix_timestamp();
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{exp}}}"#));

	AccessToken::new(format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig"))
}
