//! Thread-safe in-memory [`TokenStore`] for process-lifetime sessions and tests.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	store::{StoreError, StoreFuture, StoredToken, TokenStore},
};

type Slot = Arc<RwLock<Option<StoredToken>>>;

/// Storage medium that keeps the token in-process; it is gone when the process exits.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slot);
impl MemoryStore {
	fn set_now(slot: Slot, token: AccessToken, ttl: Duration) -> Result<(), StoreError> {
		*slot.write() = Some(StoredToken::new(token, ttl, OffsetDateTime::now_utc()));

		Ok(())
	}

	fn get_at(slot: Slot, now: OffsetDateTime) -> Option<AccessToken> {
		{
			let guard = slot.read();

			match guard.as_ref() {
				None => return None,
				Some(stored) if !stored.is_lapsed_at(now) => return Some(stored.token.clone()),
				Some(_) => {},
			}
		}

		let mut guard = slot.write();

		// Another writer may have replaced the lapsed entry between the two locks.
		if guard.as_ref().is_some_and(|stored| stored.is_lapsed_at(now)) {
			*guard = None;
		}

		guard.as_ref().map(|stored| stored.token.clone())
	}
}
impl TokenStore for MemoryStore {
	fn set(&self, token: AccessToken, ttl: Duration) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move { Self::set_now(slot, token, ttl) })
	}

	fn get(&self) -> StoreFuture<'_, Option<AccessToken>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(Self::get_at(slot, OffsetDateTime::now_utc())) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
