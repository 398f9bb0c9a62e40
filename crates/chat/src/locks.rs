//! Per-identity mutual exclusion.

use std::sync::Arc;

use {
    dashmap::{DashMap, mapref::entry::Entry},
    lexlinker_sessions::ConversationIdentity,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

type LockMap = DashMap<ConversationIdentity, Arc<Mutex<()>>>;

/// One async mutex per identity, created on demand and dropped once nobody
/// holds or waits on it.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    locks: Arc<LockMap>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    pub async fn acquire(&self, identity: &ConversationIdentity) -> IdentityGuard {
        let mutex = match self.locks.entry(identity.clone()) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => Arc::clone(vacant.insert(Arc::new(Mutex::new(()))).value()),
        };
        let guard = mutex.lock_owned().await;
        IdentityGuard {
            guard: Some(guard),
            identity: identity.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Identities with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of a pipeline run.
pub struct IdentityGuard {
    guard: Option<OwnedMutexGuard<()>>,
    identity: ConversationIdentity,
    locks: Arc<LockMap>,
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters clone the Arc under the shard lock, so a count of one means
        // only the map still references this mutex.
        self.locks
            .remove_if(&self.identity, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
