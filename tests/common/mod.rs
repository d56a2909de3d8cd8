#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use labrec_client::{
	auth::AccessToken,
	config::ClientConfig,
	flows::LabClient,
	http::ReqwestTransport,
	reqwest::Client,
	session::LoginNavigator,
	store::{MemoryStore, TokenStore},
	url::Url,
};

/// Navigator that records every redirect.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
	routes: Mutex<Vec<String>>,
}
impl RecordingNavigator {
	pub fn redirects(&self) -> usize {
		self.routes.lock().len()
	}

	pub fn routes(&self) -> Vec<String> {
		self.routes.lock().clone()
	}
}
impl LoginNavigator for RecordingNavigator {
	fn navigate_to_login(&self, route: &str) {
		self.routes.lock().push(route.to_owned());
	}
}

pub struct TestClient {
	pub client: LabClient,
	pub store: Arc<MemoryStore>,
	pub navigator: Arc<RecordingNavigator>,
}
impl TestClient {
	pub async fn seed(&self, token: &AccessToken) {
		self.store
			.set(token.clone(), Duration::minutes(15))
			.await
			.expect("Seeding the token store should succeed.");
	}

	pub async fn stored(&self) -> Option<AccessToken> {
		self.store.get().await.expect("Reading the token store should succeed.")
	}
}

/// Cookie-enabled reqwest client that trusts the mock server's self-signed certificate.
pub fn test_reqwest_client() -> Client {
	Client::builder()
		.cookie_store(true)
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.")
}

pub fn build_client(server: &MockServer) -> TestClient {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config = ClientConfig::builder(base_url)
		.build()
		.expect("Test client configuration should validate.");
	let store = Arc::new(MemoryStore::default());
	let navigator = Arc::new(RecordingNavigator::default());
	let transport = ReqwestTransport::with_client(test_reqwest_client(), config.base_url.clone());
	let client =
		LabClient::with_transport(config, Arc::new(transport), store.clone(), navigator.clone());

	TestClient { client, store, navigator }
}

/// Mints an unsigned JWT whose `exp` claim lies `secs` seconds from now.
pub fn jwt_expiring_in(secs: i64) -> AccessToken {
	let exp = (OffsetDateTime::now_utc() + Duration::seconds(secs)).unix_timestamp();
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{exp}}}"#));

	AccessToken::new(format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig"))
}
