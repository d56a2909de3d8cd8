//! Request pipeline: bearer attachment, proactive renewal, and one refresh-and-retry on 401.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenInspector},
	error::RefreshError,
	flows::RefreshCoordinator,
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionExpiryHandler,
	store::TokenStore,
};

/// What to do with a response after [`RequestPipeline::post_receive`] inspected it.
#[derive(Debug)]
pub enum PostReceive {
	/// Hand the response to the caller.
	Deliver(ApiResponse),
	/// Resend this request; it already carries the renewed token and is marked as retried.
	Retry(ApiRequest),
}

/// Wraps every protected call.
///
/// Before sending, the pipeline attaches the stored token, dropping it when expired and renewing
/// it when it expires within the configured threshold. After receiving, a 401 triggers one
/// renewal and one resend; a request that already spent its retry is terminal.
pub struct RequestPipeline {
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	refresh: Arc<RefreshCoordinator>,
	expiry: Arc<SessionExpiryHandler>,
	refresh_threshold: Duration,
}
impl RequestPipeline {
	/// Creates a pipeline sharing the given store, coordinator, and expiry handler.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
		refresh: Arc<RefreshCoordinator>,
		expiry: Arc<SessionExpiryHandler>,
		refresh_threshold: Duration,
	) -> Self {
		Self { transport, store, refresh, expiry, refresh_threshold }
	}

	/// Sends `request` and applies the refresh-and-retry policy to the answer.
	///
	/// Non-401 responses are delivered as-is, whatever their status.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut request = self.pre_send(request).await?;

				// Terminates: a retried request never yields another `Retry`.
				loop {
					let response = self.transport.execute(request.clone()).await?;

					match self.post_receive(request, response).await? {
						PostReceive::Deliver(response) => return Ok(response),
						PostReceive::Retry(retry) => request = retry,
					}
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Attaches the stored token to `request`, if one is usable.
	///
	/// - No token: the request goes out unauthenticated.
	/// - Expired (or undecodable) token: the store is cleared and the request goes out
	///   unauthenticated; the server's answer decides what happens next.
	/// - Token expiring within the threshold: renewed first. If renewal fails the request goes
	///   out unauthenticated and has already spent its retry.
	pub async fn pre_send(&self, request: ApiRequest) -> Result<ApiRequest> {
		let request = request.without_bearer();
		let Some(token) = self.store.get().await? else {
			tracing::debug!(path = %request.path, "No stored token; sending unauthenticated.");

			return Ok(request);
		};
		let now = OffsetDateTime::now_utc();

		if TokenInspector::is_expired_at(&token, now) {
			tracing::debug!(path = %request.path, "Stored token expired; clearing it.");

			self.store.clear().await?;

			return Ok(request);
		}
		if !TokenInspector::expires_within_at(&token, self.refresh_threshold, now) {
			return Ok(request.with_bearer(token));
		}

		match self.renew().await {
			Ok(fresh) => Ok(request.with_bearer(fresh)),
			Err(e) => {
				tracing::warn!(
					path = %request.path,
					error = %e,
					"Proactive renewal failed; sending unauthenticated."
				);

				Ok(request.mark_retried())
			},
		}
	}

	/// Decides whether `response` is delivered, retried, or ends the session.
	///
	/// On a first 401 the token is renewed and the request is returned for a single resend. A
	/// failed renewal, or a 401 on the resend, invokes the session expiry handler and fails the
	/// call.
	pub async fn post_receive(
		&self,
		request: ApiRequest,
		response: ApiResponse,
	) -> Result<PostReceive> {
		if !response.is_unauthorized() {
			return Ok(PostReceive::Deliver(response));
		}
		if request.is_retried() {
			tracing::warn!(path = %request.path, "Request rejected after its retry; ending the session.");

			self.expiry.on_unrecoverable_auth_failure().await;

			return Err(Error::Unauthorized { status: response.status });
		}

		tracing::debug!(path = %request.path, "Request rejected; renewing the token.");

		match self.renew().await {
			Ok(fresh) => Ok(PostReceive::Retry(request.mark_retried().with_bearer(fresh))),
			Err(e) => {
				self.expiry.on_unrecoverable_auth_failure().await;

				Err(e.into())
			},
		}
	}

	async fn renew(&self) -> Result<AccessToken, RefreshError> {
		let fresh = self.refresh.request_refresh().await?;

		self.expiry.session_started();

		Ok(fresh)
	}
}
impl Debug for RequestPipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("refresh", &self.refresh)
			.field("expiry", &self.expiry)
			.field("refresh_threshold", &self.refresh_threshold)
			.finish()
	}
}
