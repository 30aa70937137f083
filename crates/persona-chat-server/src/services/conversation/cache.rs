use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::session::Session;
use crate::models::chat::{SessionConfiguration, SessionId};

pub type SharedSession = Arc<Mutex<Session>>;

/// Live sessions keyed by id.
///
/// Each session sits behind its own async mutex; a submission holds it for the
/// whole generation, which serializes submissions within one session while
/// other sessions proceed independently.
#[derive(Clone)]
pub struct SessionRegistry {
    storage: Arc<DashMap<SessionId, SharedSession>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        info!("Initializing session registry (idle timeout: {:?})", idle_timeout);
        Self {
            storage: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    /// Start a session seeded with the hidden system turn.
    pub fn create(&self, system_instruction: &str, config: SessionConfiguration) -> SharedSession {
        let id = uuid::Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(id, system_instruction, config)));
        self.storage.insert(id, session.clone());
        debug!("Created session {}", id);
        session
    }

    pub fn get(&self, session_id: SessionId) -> Option<SharedSession> {
        self.storage.get(&session_id).map(|entry| entry.value().clone())
    }

    /// End a session; its log is dropped with it.
    pub fn remove(&self, session_id: SessionId) -> Option<SharedSession> {
        self.storage.remove(&session_id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Drop sessions idle for longer than the timeout.
    /// Returns number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        let start_len = self.storage.len();

        // A locked session is mid-submission, hence active.
        self.storage.retain(|_, session| match session.try_lock() {
            Ok(guard) => !guard.is_expired(self.idle_timeout),
            Err(_) => true,
        });

        let count = start_len.saturating_sub(self.storage.len());
        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }
        count
    }
}
