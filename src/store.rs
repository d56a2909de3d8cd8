//! Storage contract and built-in media for the current bearer token.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{_prelude::*, auth::AccessToken};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage medium holding at most one bearer token with a bounded lifetime.
///
/// The medium enforces the lifetime passed to [`TokenStore::set`] on its own: once the
/// absolute expiry is reached, [`TokenStore::get`] returns `None` regardless of what the
/// token's embedded claims say.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists `token`, replacing any previous value, until `now + ttl`.
	fn set(&self, token: AccessToken, ttl: Duration) -> StoreFuture<'_, ()>;

	/// Returns the current token, or `None` when absent or past its stored lifetime.
	fn get(&self) -> StoreFuture<'_, Option<AccessToken>>;

	/// Removes the current token, if any.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Persisted form of the current token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
	/// Bearer token value.
	pub token: AccessToken,
	/// Instant the token was written.
	pub stored_at: OffsetDateTime,
	/// Absolute instant after which the medium no longer returns the token.
	pub expires_at: OffsetDateTime,
}
impl StoredToken {
	/// Stamps `token` with an absolute expiry computed from `ttl`.
	pub fn new(token: AccessToken, ttl: Duration, now: OffsetDateTime) -> Self {
		let expires_at = if ttl.is_positive() {
			now.checked_add(ttl).unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
		} else {
			now
		};

		Self { token, stored_at: now, expires_at }
	}

	/// Returns `true` once the stored lifetime has elapsed at `now`.
	pub fn is_lapsed_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
impl Debug for StoredToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StoredToken")
			.field("token", &"<redacted>")
			.field("stored_at", &self.stored_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage medium.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
