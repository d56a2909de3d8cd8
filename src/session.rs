//! Session termination: clearing the token store and sending the user to the login boundary.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{_prelude::*, store::TokenStore};

/// Capability that moves the active client to the login boundary.
///
/// The UI runtime supplies the implementation; closures `Fn(&str)` qualify.
pub trait LoginNavigator
where
	Self: Send + Sync,
{
	/// Redirects to `route`.
	fn navigate_to_login(&self, route: &str);
}
impl<F> LoginNavigator for F
where
	F: Fn(&str) + Send + Sync,
{
	fn navigate_to_login(&self, route: &str) {
		self(route)
	}
}

/// Navigator that only logs the redirect; useful for headless callers.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;
impl LoginNavigator for LogNavigator {
	fn navigate_to_login(&self, route: &str) {
		tracing::info!(route, "Session ended; login required.");
	}
}

/// Reacts to unrecoverable authorization failures.
///
/// Redirects at most once per session: after a redirect, further calls only make sure the
/// store is empty until [`SessionExpiryHandler::session_started`] records a new session.
pub struct SessionExpiryHandler {
	store: Arc<dyn TokenStore>,
	navigator: Arc<dyn LoginNavigator>,
	login_route: String,
	redirect_armed: AtomicBool,
}
impl SessionExpiryHandler {
	/// Creates a handler that clears `store` and redirects through `navigator`.
	pub fn new(
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn LoginNavigator>,
		login_route: impl Into<String>,
	) -> Self {
		Self { store, navigator, login_route: login_route.into(), redirect_armed: AtomicBool::new(true) }
	}

	/// Clears the token store and redirects to the login boundary.
	///
	/// Idempotent: repeated calls leave the store empty and redirect only once.
	pub async fn on_unrecoverable_auth_failure(&self) {
		if let Err(e) = self.store.clear().await {
			tracing::warn!(error = %e, "Failed to clear the token store while ending the session.");
		}

		self.redirect();
	}

	/// Ends the session on request (logout): clears the store and always redirects.
	pub async fn end_session(&self) {
		if let Err(e) = self.store.clear().await {
			tracing::warn!(error = %e, "Failed to clear the token store while logging out.");
		}

		self.redirect_armed.store(false, Ordering::Release);

		tracing::info!(route = %self.login_route, "Redirecting to the login boundary.");

		self.navigator.navigate_to_login(&self.login_route);
	}

	/// Re-arms the redirect after a successful login or refresh.
	pub fn session_started(&self) {
		self.redirect_armed.store(true, Ordering::Release);
	}

	/// Route handed to the navigator.
	pub fn login_route(&self) -> &str {
		&self.login_route
	}

	fn redirect(&self) {
		if self.redirect_armed.swap(false, Ordering::AcqRel) {
			tracing::info!(route = %self.login_route, "Redirecting to the login boundary.");

			self.navigator.navigate_to_login(&self.login_route);
		} else {
			tracing::debug!("Login redirect already issued for this session.");
		}
	}
}
impl Debug for SessionExpiryHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionExpiryHandler")
			.field("login_route", &self.login_route)
			.field("redirect_armed", &self.redirect_armed.load(Ordering::Acquire))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;
	use crate::{auth::AccessToken, store::MemoryStore};

	fn handler_with_counter() -> (SessionExpiryHandler, Arc<MemoryStore>, Arc<AtomicUsize>) {
		let store = Arc::new(MemoryStore::default());
		let redirects = Arc::new(AtomicUsize::new(0));
		let counter = redirects.clone();
		let navigator = move |route: &str| {
			assert_eq!(route, "/login");
			counter.fetch_add(1, Ordering::SeqCst);
		};
		let handler = SessionExpiryHandler::new(store.clone(), Arc::new(navigator), "/login");

		(handler, store, redirects)
	}

	#[tokio::test]
	async fn repeated_failures_redirect_once() {
		let (handler, store, redirects) = handler_with_counter();

		store
			.set(AccessToken::new("abc"), Duration::minutes(5))
			.await
			.expect("Seeding the store should succeed.");
		handler.on_unrecoverable_auth_failure().await;
		handler.on_unrecoverable_auth_failure().await;

		assert_eq!(store.get().await.expect("Store get should succeed."), None);
		assert_eq!(redirects.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn redirects_even_without_a_session() {
		let (handler, store, redirects) = handler_with_counter();

		handler.on_unrecoverable_auth_failure().await;

		assert_eq!(store.get().await.expect("Store get should succeed."), None);
		assert_eq!(redirects.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn new_session_rearms_redirect() {
		let (handler, _store, redirects) = handler_with_counter();

		handler.on_unrecoverable_auth_failure().await;
		handler.session_started();
		handler.on_unrecoverable_auth_failure().await;

		assert_eq!(redirects.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn explicit_logout_always_redirects_and_disarms() {
		let (handler, _store, redirects) = handler_with_counter();

		handler.on_unrecoverable_auth_failure().await;
		handler.end_session().await;
		handler.on_unrecoverable_auth_failure().await;

		assert_eq!(redirects.load(Ordering::SeqCst), 2);
	}
}
