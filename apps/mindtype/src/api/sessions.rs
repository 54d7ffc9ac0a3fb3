//! # Session Registry
//!
//! One `Wizard` per participant, keyed by an opaque session token.
//!
//! - Tokens are random v4 UUIDs returned by `POST /sessions`
//! - Each wizard sits behind its own mutex, so actions on one session are
//!   serialized while different sessions proceed independently
//! - Sessions idle for longer than the TTL are evicted; an evicted or
//!   closed session is simply unknown afterwards

use mindtype_core::{SystemClock, Wizard};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Wizard type driven by the HTTP layer.
pub type SessionWizard = Wizard<SystemClock>;

/// Shared handle to one session's wizard.
pub type SharedWizard = Arc<Mutex<SessionWizard>>;

struct Entry {
    wizard: SharedWizard,
    last_seen: Instant,
}

/// Registry of live participant sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a wizard and return its token.
    pub fn create(&self, wizard: SessionWizard) -> Uuid {
        let id = Uuid::new_v4();
        self.entries().insert(
            id,
            Entry {
                wizard: Arc::new(Mutex::new(wizard)),
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Look up a live session and mark it as used.
    pub fn get(&self, id: &Uuid) -> Option<SharedWizard> {
        let mut entries = self.entries();
        let now = Instant::now();
        let expired = entries
            .get(id)
            .is_some_and(|entry| now.duration_since(entry.last_seen) > self.ttl);
        if expired {
            entries.remove(id);
            tracing::info!(session = %id, "Session expired");
            return None;
        }
        entries.get_mut(id).map(|entry| {
            entry.last_seen = now;
            Arc::clone(&entry.wizard)
        })
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Drop every session idle for longer than the TTL.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_seen) <= self.ttl);
        before.saturating_sub(entries.len())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idle timeout.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_remove() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let id = registry.create(Wizard::system());
        assert!(registry.get(&id).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let id = registry.create(Wizard::system());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(registry.evict_expired(), 1);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn expired_session_is_unknown_on_lookup() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let id = registry.create(Wizard::system());
        std::thread::sleep(Duration::from_millis(30));
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn sessions_are_isolated() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let a = registry.create(Wizard::system());
        let b = registry.create(Wizard::system());
        assert_ne!(a, b);

        let wa = registry.get(&a).expect("a");
        let wb = registry.get(&b).expect("b");
        let id_a = wa.lock().expect("lock").session().participant_id().clone();
        let id_b = wb.lock().expect("lock").session().participant_id().clone();
        assert_ne!(id_a, id_b);
    }
}
