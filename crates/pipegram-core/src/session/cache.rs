use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use tracing::debug;

use crate::remote::RemoteClient;

/// Default number of live clients kept per process.
pub const DEFAULT_CAPACITY: usize = 32;

/// Identity-scoped cache of restored remote clients.
///
/// An entry reflects the session as it was when the client was built. Saving
/// a new session does not refresh it; callers invalidate explicitly.
pub struct ClientCache<C: ?Sized = dyn RemoteClient> {
    entries: Mutex<LruCache<String, Arc<C>>>,
    capacity: usize,
}

impl<C: ?Sized> ClientCache<C> {
    /// Create a cache holding at most `capacity` clients. `0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        let entries = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<C>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the cached client for `username`, marking it recently used.
    pub fn get(&self, username: &str) -> Option<Arc<C>> {
        let hit = self.lock().get(username).cloned();
        debug!(
            "Client cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            username
        );
        hit
    }

    /// Insert or replace the client for `username`.
    pub fn insert(&self, username: &str, client: Arc<C>) {
        if let Some((evicted, _)) = self.lock().push(username.to_string(), client) {
            if evicted != username {
                debug!("Client cache evicted {}", evicted);
            }
        }
    }

    /// Drop the client for `username`. Returns whether one was cached.
    pub fn invalidate(&self, username: &str) -> bool {
        self.lock().pop(username).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Configured capacity, `0` when unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<C: ?Sized> Default for ClientCache<C> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
