//! Session flows wired together behind the [`LabClient`] facade.

pub mod common;
pub mod login;
pub mod pipeline;
pub mod refresh;

#[cfg(test)] mod testing;

pub use common::*;
pub use login::*;
pub use pipeline::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	http::{ApiRequest, ApiResponse, HttpTransport},
	session::{LoginNavigator, SessionExpiryHandler},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Lab-records API client.
///
/// Owns one token store shared by the refresh coordinator, the request pipeline, and the
/// session expiry handler, so every component observes the same session. Cloning is cheap and
/// clones share that session.
#[derive(Clone)]
pub struct LabClient {
	config: Arc<ClientConfig>,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	refresh: Arc<RefreshCoordinator>,
	expiry: Arc<SessionExpiryHandler>,
	pipeline: Arc<RequestPipeline>,
}
impl LabClient {
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn LoginNavigator>,
	) -> Self {
		let refresh = Arc::new(RefreshCoordinator::new(
			transport.clone(),
			store.clone(),
			config.endpoints.refresh.clone(),
			config.refresh_timeout.unsigned_abs(),
			config.token_ttl,
		));
		let expiry =
			Arc::new(SessionExpiryHandler::new(store.clone(), navigator, config.login_route.clone()));
		let pipeline = Arc::new(RequestPipeline::new(
			transport.clone(),
			store.clone(),
			refresh.clone(),
			expiry.clone(),
			config.refresh_threshold,
		));

		Self { config: Arc::new(config), transport, store, refresh, expiry, pipeline }
	}

	/// Returns the client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the shared token store.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Returns the refresh coordinator.
	pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
		&self.refresh
	}

	/// Returns the session expiry handler.
	pub fn expiry_handler(&self) -> &SessionExpiryHandler {
		&self.expiry
	}

	/// Returns the request pipeline.
	pub fn pipeline(&self) -> &RequestPipeline {
		&self.pipeline
	}

	/// Returns the renewal counters.
	pub fn refresh_metrics(&self) -> Arc<RefreshMetrics> {
		self.refresh.metrics()
	}

	/// Sends a protected call through the request pipeline.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.pipeline.send(request).await
	}

	/// Sends a protected call and decodes a success body as `T`.
	///
	/// Non-success statuses surface as [`Error::Api`].
	pub async fn send_json<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.send(request).await?;

		if !response.is_success() {
			return Err(Error::Api {
				message: response.error_message(),
				path: response.path,
				status: response.status,
			});
		}

		Ok(response.json()?)
	}

	/// Returns `true` when the store currently holds a token.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.store.get().await?.is_some())
	}
}
#[cfg(feature = "reqwest")]
impl LabClient {
	/// Creates a client backed by a cookie-enabled reqwest transport for `config.base_url`.
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn LoginNavigator>,
	) -> Result<Self> {
		let transport = ReqwestTransport::new(config.base_url.clone())?;

		Ok(Self::with_transport(config, Arc::new(transport), store, navigator))
	}
}
impl Debug for LabClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LabClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh", &self.refresh)
			.field("expiry", &self.expiry)
			.finish()
	}
}
