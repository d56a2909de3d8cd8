//! Credential login, logout, and current-user lookup.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, LoginCredentials},
	flows::{LabClient, common::{self, IssuedTokenError}},
	http::ApiRequest,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Successful login.
#[derive(Clone, Debug)]
pub struct LoginSession {
	/// Token now held by the store.
	pub token: AccessToken,
	/// Lifetime the store enforces for the token.
	pub ttl: Duration,
	/// Full decoded login response, including any user profile it carries.
	pub body: serde_json::Value,
}

impl LabClient {
	/// Exchanges credentials for a bearer token and stores it.
	///
	/// The token is accepted under any of the field names in [`common::TOKEN_POINTERS`]; it is
	/// stored as-is, even when it is not a decodable JWT.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginSession> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = ApiRequest::post(&self.config().endpoints.login).json(credentials)?;
				let response = self.transport.execute(request).await?;

				if !response.is_success() {
					return Err(Error::Api {
						message: response.error_message(),
						path: response.path,
						status: response.status,
					});
				}

				let issued = common::parse_issued_token(&response).map_err(|e| match e {
					IssuedTokenError::Body(e) => Error::Response(e),
					IssuedTokenError::MissingToken => Error::MissingToken,
					IssuedTokenError::InvalidExpiresIn(value) => Error::InvalidTokenLifetime { value },
				})?;
				let ttl = issued.ttl_or(self.config().token_ttl);

				self.store.set(issued.token.clone(), ttl).await?;
				self.expiry.session_started();

				Ok(LoginSession { token: issued.token, ttl, body: issued.body })
			})
			.await;

		match &result {
			Ok(_) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::info!(username = %credentials.username, "Login succeeded.");
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::warn!(username = %credentials.username, error = %e, "Login failed.");
			},
		}

		result
	}

	/// Logs out.
	///
	/// The server call is best-effort: whatever it answers, the store is cleared and the
	/// navigator is sent to the login boundary. Returns the server's body when it succeeded.
	pub async fn logout(&self) -> Option<serde_json::Value> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let body = span
			.instrument(async move {
				let mut request = ApiRequest::post(&self.config().endpoints.logout);

				match self.store.get().await {
					Ok(Some(token)) => request = request.with_bearer(token),
					Ok(None) => {},
					Err(e) => tracing::warn!(error = %e, "Failed to read the token store during logout."),
				}

				let body = match self.transport.execute(request).await {
					Ok(response) if response.is_success() =>
						Some(response.json::<serde_json::Value>().unwrap_or(serde_json::Value::Null)),
					Ok(response) => {
						tracing::warn!(
							status = response.status,
							message = %response.error_message(),
							"Logout call was rejected; ending the session locally."
						);

						None
					},
					Err(e) => {
						tracing::warn!(error = %e, "Logout call failed; ending the session locally.");

						None
					},
				};

				self.expiry.end_session().await;

				body
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		body
	}

	/// Fetches the current user through the request pipeline.
	pub async fn me(&self) -> Result<serde_json::Value> {
		self.send_json(ApiRequest::get(&self.config().endpoints.me)).await
	}
}
