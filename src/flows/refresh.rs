//! Single-flight token renewal.
//!
//! [`RefreshCoordinator::request_refresh`] guarantees at most one renewal call is in flight.
//! The first caller to arrive while the coordinator is idle becomes the leader and performs the
//! network exchange; every caller arriving meanwhile parks a oneshot sender in a FIFO queue and
//! receives the leader's outcome once it settles. Success stores the new token; failure clears
//! the store. If the leader's future is dropped mid-flight, the coordinator returns to idle and
//! the queued callers rejoin in arrival order: the first becomes the new leader.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::RefreshError,
	flows::common,
	http::{ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

type RefreshOutcome = Result<AccessToken, RefreshError>;

enum RefreshState {
	Idle,
	Refreshing { waiters: VecDeque<oneshot::Sender<RefreshOutcome>> },
}

enum Role {
	Leader,
	Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Serializes token renewals so concurrent callers share a single network call.
pub struct RefreshCoordinator {
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	endpoint: String,
	timeout: StdDuration,
	token_ttl: Duration,
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator renewing at `endpoint` through `transport`.
	///
	/// Renewed tokens are stored for the validity window announced by the server, falling back
	/// to `token_ttl`. Each renewal call is bounded by `timeout`.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
		endpoint: impl Into<String>,
		timeout: StdDuration,
		token_ttl: Duration,
	) -> Self {
		Self {
			transport,
			store,
			endpoint: endpoint.into(),
			timeout,
			token_ttl,
			state: Mutex::new(RefreshState::Idle),
			metrics: Default::default(),
		}
	}

	/// Returns a fresh token, joining the in-flight renewal when one exists.
	///
	/// Every caller that joined the same renewal observes the same outcome. A waiter whose
	/// leader was dropped rejoins, becoming the next leader or waiting on the next renewal, so
	/// [`RefreshError::Abandoned`] never reaches callers.
	pub async fn request_refresh(&self) -> Result<AccessToken, RefreshError> {
		let mut coalesced = false;

		loop {
			match self.join() {
				Role::Waiter(receiver) => {
					if !coalesced {
						coalesced = true;

						self.metrics.record_coalesced();
					}

					tracing::debug!("Joined in-flight token renewal.");

					match receiver.await {
						Ok(Err(RefreshError::Abandoned)) | Err(oneshot::Canceled) => {
							tracing::debug!("In-flight token renewal was abandoned; rejoining.");
						},
						Ok(outcome) => return outcome,
					}
				},
				Role::Leader => {
					let mut batch = LeaderGuard { coordinator: self, settled: false };
					let outcome = self.renew().await;

					batch.settle(outcome.clone());

					return outcome;
				},
			}
		}
	}

	/// Returns `true` while a renewal call is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.state.lock(), RefreshState::Refreshing { .. })
	}

	/// Returns the shared renewal counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	fn join(&self) -> Role {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			let (sender, receiver) = oneshot::channel();

			waiters.push_back(sender);

			return Role::Waiter(receiver);
		}

		*state = RefreshState::Refreshing { waiters: VecDeque::new() };

		Role::Leader
	}

	/// Resolves queued callers in arrival order, then returns to idle.
	fn settle(&self, outcome: &RefreshOutcome) {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			for waiter in waiters.drain(..) {
				// A waiter whose future was dropped no longer listens.
				let _ = waiter.send(outcome.clone());
			}
		}

		*state = RefreshState::Idle;
	}

	async fn renew(&self) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "request_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				match self.exchange().await {
					Ok(token) => Ok(token),
					Err(e) => {
						if let Err(clear_err) = self.store.clear().await {
							tracing::warn!(
								error = %clear_err,
								"Failed to clear the token store after a failed renewal."
							);
						}

						Err(e)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::info!("Token renewed.");
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::warn!(error = %e, "Token renewal failed.");
			},
		}

		result
	}

	async fn exchange(&self) -> RefreshOutcome {
		let request = ApiRequest::post(&self.endpoint).timeout(self.timeout);
		let response = self.transport.execute(request).await?;

		if !response.is_success() {
			return Err(RefreshError::Rejected { status: response.status });
		}

		let issued = common::parse_issued_token(&response)
			.map_err(|e| RefreshError::MalformedResponse { source: Arc::new(e) })?;

		self.store
			.set(issued.token.clone(), issued.ttl_or(self.token_ttl))
			.await
			.map_err(RefreshError::Storage)?;

		Ok(issued.token)
	}

	#[cfg(test)]
	fn waiting(&self) -> usize {
		match &*self.state.lock() {
			RefreshState::Idle => 0,
			RefreshState::Refreshing { waiters } => waiters.len(),
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("endpoint", &self.endpoint)
			.field("timeout", &self.timeout)
			.field("token_ttl", &self.token_ttl)
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}

/// Settles the leader's batch exactly once, including when the leader's future is dropped.
struct LeaderGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl LeaderGuard<'_> {
	fn settle(&mut self, outcome: RefreshOutcome) {
		self.settled = true;
		self.coordinator.settle(&outcome);
	}
}
impl Drop for LeaderGuard<'_> {
	fn drop(&mut self) {
		if !self.settled {
			tracing::warn!("Token renewal was abandoned; releasing queued callers.");

			self.coordinator.settle(&Err(RefreshError::Abandoned));
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::future;
	// self
	use super::*;
	use crate::{
		flows::testing::{Reply, ScriptedTransport, jwt_expiring_in},
		store::MemoryStore,
	};

	const REFRESH: &str = "/auth/refresh";

	fn coordinator(transport: Arc<ScriptedTransport>) -> (RefreshCoordinator, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let coordinator = RefreshCoordinator::new(
			transport,
			store.clone(),
			REFRESH,
			StdDuration::from_secs(30),
			Duration::minutes(15),
		);

		(coordinator, store)
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_renewal() {
		let transport = Arc::new(ScriptedTransport::default());
		let fresh = jwt_expiring_in(900);

		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "accessToken": fresh.expose() })));

		let release = transport.gate(REFRESH);
		let (coordinator, store) = coordinator(transport.clone());
		let callers = future::join_all((0..5).map(|_| coordinator.request_refresh()));
		let (outcomes, ()) = futures::join!(callers, async {
			let _ = release.send(());
		});

		for outcome in outcomes {
			assert_eq!(outcome.expect("Every caller should receive the renewed token."), fresh);
		}

		assert_eq!(transport.calls_to(REFRESH), 1);
		assert_eq!(store.get().await.expect("Store get should succeed."), Some(fresh));
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().coalesced(), 4);
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn failure_fans_out_and_clears_the_store() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.reply(REFRESH, Reply::Json(401, serde_json::json!({ "respText": "expired" })));

		let release = transport.gate(REFRESH);
		let (coordinator, store) = coordinator(transport.clone());

		store
			.set(jwt_expiring_in(30), Duration::minutes(1))
			.await
			.expect("Seeding the store should succeed.");

		let callers = future::join_all((0..3).map(|_| coordinator.request_refresh()));
		let (outcomes, ()) = futures::join!(callers, async {
			let _ = release.send(());
		});

		for outcome in outcomes {
			assert!(matches!(outcome, Err(RefreshError::Rejected { status: 401 })));
		}

		assert_eq!(transport.calls_to(REFRESH), 1);
		assert_eq!(store.get().await.expect("Store get should succeed."), None);
		assert_eq!(coordinator.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn settled_coordinator_starts_a_new_renewal() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "token": "first" })));
		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "token": "second" })));

		let (coordinator, _store) = coordinator(transport.clone());
		let first = coordinator.request_refresh().await.expect("First renewal should succeed.");
		let second = coordinator.request_refresh().await.expect("Second renewal should succeed.");

		assert_eq!(first.expose(), "first");
		assert_eq!(second.expose(), "second");
		assert_eq!(transport.calls_to(REFRESH), 2);
	}

	#[tokio::test]
	async fn renewal_requests_carry_the_timeout_and_no_bearer() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "token": "abc" })));

		let (coordinator, _store) = coordinator(transport.clone());

		coordinator.request_refresh().await.expect("Renewal should succeed.");

		let sent = transport.requests_to(REFRESH);

		assert_eq!(sent[0].timeout, Some(StdDuration::from_secs(30)));
		assert_eq!(sent[0].bearer, None);
	}

	#[tokio::test]
	async fn timeouts_and_malformed_bodies_are_typed() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.reply(REFRESH, Reply::Timeout);
		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "user": "alice" })));

		let (coordinator, _store) = coordinator(transport);

		assert!(matches!(coordinator.request_refresh().await, Err(RefreshError::Timeout)));
		assert!(matches!(
			coordinator.request_refresh().await,
			Err(RefreshError::MalformedResponse { .. })
		));
	}

	#[tokio::test]
	async fn malformed_bodies_keep_their_cause() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "user": "alice" })));
		transport.reply(REFRESH, Reply::Raw(200, "<html>gateway</html>"));

		let (coordinator, _store) = coordinator(transport);
		let err = coordinator.request_refresh().await.expect_err("Tokenless body should fail.");
		let cause = StdError::source(&err).expect("Malformed renewal should expose its cause.");

		assert!(matches!(err, RefreshError::MalformedResponse { .. }));
		assert_eq!(cause.to_string(), "no access token field");

		let err = coordinator.request_refresh().await.expect_err("Non-JSON body should fail.");
		let cause = StdError::source(&err).expect("Malformed renewal should expose its cause.");

		assert!(cause.to_string().contains(REFRESH));
		// The JSON decoding failure stays reachable below the response error.
		assert!(cause.source().is_some());
	}

	#[tokio::test]
	async fn waiters_of_a_dropped_leader_rejoin() {
		let transport = Arc::new(ScriptedTransport::default());
		let fresh = jwt_expiring_in(900);

		transport.reply(REFRESH, Reply::Json(200, serde_json::json!({ "accessToken": fresh.expose() })));

		let _stalled = transport.gate(REFRESH);
		let (coordinator, store) = coordinator(transport.clone());
		let mut leader = Box::pin(coordinator.request_refresh());

		assert!(futures::poll!(&mut leader).is_pending());

		let mut first = Box::pin(coordinator.request_refresh());
		let mut second = Box::pin(coordinator.request_refresh());

		assert!(futures::poll!(&mut first).is_pending());
		assert!(futures::poll!(&mut second).is_pending());
		assert_eq!(coordinator.waiting(), 2);

		let release = transport.gate(REFRESH);

		drop(leader);

		// The first waiter takes over the renewal; the second queues behind it.
		assert!(futures::poll!(&mut first).is_pending());
		assert!(futures::poll!(&mut second).is_pending());
		assert!(coordinator.is_refreshing());
		assert_eq!(coordinator.waiting(), 1);

		let _ = release.send(());
		let (first, second) = futures::join!(first, second);

		assert_eq!(first.expect("New leader should renew."), fresh);
		assert_eq!(second.expect("Remaining waiter should share the renewal."), fresh);
		assert_eq!(store.get().await.expect("Store get should succeed."), Some(fresh));
		assert_eq!(transport.calls_to(REFRESH), 2);
		assert_eq!(coordinator.metrics().coalesced(), 2);
		assert!(!coordinator.is_refreshing());
	}
}
