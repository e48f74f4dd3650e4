//! Concurrent session store with per-sender synchronization.
//!
//! The map lock is held only to look up or insert an entry; all state
//! access goes through the per-sender mutex, so updates for different
//! senders proceed fully in parallel while updates for the *same* sender
//! are serialized. Eviction takes the same per-sender mutex and therefore
//! cannot race an in-flight update.
//!
//! The TTL is a sliding window: every `snapshot`/`get_or_create`/`update`
//! resets the activity timestamp. Expiry is handled lazily on access (an
//! expired record is replaced by a fresh one) and by the explicit
//! [`SessionStore::evict_expired`] sweep.
//!
//! Locks are never held across an await point; callers snapshot state,
//! perform their async work, and apply the resulting transition in one
//! atomic read-modify-write.

use crate::session::state::SessionState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::debug;

type Entry = Arc<Mutex<SessionState>>;

/// Concurrent map of sender id → session state
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionStore {
    /// Create a store with the given idle TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The configured idle TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry(&self, sender_id: &str) -> Entry {
        if let Some(entry) = read_lock(&self.sessions).get(sender_id) {
            return Arc::clone(entry);
        }
        let mut map = write_lock(&self.sessions);
        Arc::clone(
            map.entry(sender_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(sender_id)))),
        )
    }

    /// Get the live entry for a sender, creating it if absent and
    /// resetting it in place if the TTL has elapsed. Slides the TTL.
    pub fn get_or_create(&self, sender_id: &str) -> Entry {
        let entry = self.entry(sender_id);
        {
            let mut state = lock(&entry);
            if state.is_expired(self.ttl) {
                debug!(sender_id, idle_secs = state.idle_secs(), "session expired, starting fresh");
                *state = SessionState::new(sender_id);
            }
            state.touch();
        }
        entry
    }

    /// Clone the current state for a sender (creating/resetting as needed)
    pub fn snapshot(&self, sender_id: &str) -> SessionState {
        let entry = self.get_or_create(sender_id);
        let state = lock(&entry);
        state.clone()
    }

    /// Atomically read-modify-write a sender's state. Slides the TTL.
    pub fn update<F, R>(&self, sender_id: &str, mutator: F) -> R
    where
        F: FnOnce(&mut SessionState) -> R,
    {
        let entry = self.get_or_create(sender_id);
        let mut state = lock(&entry);
        let result = mutator(&mut state);
        state.touch();
        result
    }

    /// Remove every record idle longer than the TTL. Returns the count.
    ///
    /// A record whose mutex is currently held belongs to an in-flight
    /// turn and is skipped: a busy sender is not idle.
    pub fn evict_expired(&self) -> usize {
        let mut map = write_lock(&self.sessions);
        let before = map.len();
        map.retain(|_, entry| match entry.try_lock() {
            Ok(state) => !state.is_expired(self.ttl),
            Err(_) => true,
        });
        let evicted = before - map.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired sessions");
        }
        evicted
    }

    /// Number of live records (including any not yet swept)
    pub fn len(&self) -> usize {
        read_lock(&self.sessions).len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record exists for this sender, without creating one
    pub fn contains(&self, sender_id: &str) -> bool {
        read_lock(&self.sessions).contains_key(sender_id)
    }

    /// Spawn a periodic eviction sweep on the tokio runtime
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.evict_expired();
            }
        })
    }
}

// A poisoned lock means a panic elsewhere; the state itself is still
// consistent (mutators are transition-complete before unlock), so recover
// rather than propagate.
fn lock(entry: &Entry) -> MutexGuard<'_, SessionState> {
    entry.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock(
    sessions: &RwLock<HashMap<String, Entry>>,
) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
    sessions.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock(
    sessions: &RwLock<HashMap<String, Entry>>,
) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
    sessions.write().unwrap_or_else(|e| e.into_inner())
}
