use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use shared::{Session, SessionServices};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

pub type SharedSession = Arc<Mutex<Session>>;

struct RegistryEntry {
    session: SharedSession,
    last_touched: Instant,
}

impl RegistryEntry {
    /// Sessions still referenced by a handler or an in-flight turn are never idle.
    fn is_idle(&self, now: Instant, idle_ttl: Duration) -> bool {
        Arc::strong_count(&self.session) == 1
            && now.saturating_duration_since(self.last_touched) >= idle_ttl
    }
}

/// In-memory table of live sessions keyed by id. Entries untouched for
/// longer than the idle TTL are dropped on lookup and by the pruner.
#[derive(Clone)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<Uuid, RegistryEntry>>>,
    idle_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    pub fn spawn_pruner(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.prune_idle_at(Instant::now());
            }
        })
    }

    pub fn create(&self, services: SessionServices) -> SharedSession {
        let session = Session::new(services);
        let session_id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.entries().insert(
            session_id,
            RegistryEntry {
                session: Arc::clone(&shared),
                last_touched: Instant::now(),
            },
        );
        shared
    }

    /// Returns the session and marks it as recently used.
    pub fn get(&self, session_id: Uuid) -> Option<SharedSession> {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.get_mut(&session_id)?;
        if entry.is_idle(now, self.idle_ttl) {
            entries.remove(&session_id);
            info!(session_id = %session_id, "chat session expired");
            return None;
        }

        entry.last_touched = now;
        Some(Arc::clone(&entry.session))
    }

    pub fn remove(&self, session_id: Uuid) -> bool {
        self.entries().remove(&session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops idle sessions and returns how many were removed.
    pub fn prune_idle_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_idle(now, self.idle_ttl));
        let pruned = before - entries.len();
        if pruned > 0 {
            info!(pruned, remaining = entries.len(), "pruned idle chat sessions");
        }
        pruned
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, RegistryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Locks one session. A panic in another handler leaves the session usable.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
