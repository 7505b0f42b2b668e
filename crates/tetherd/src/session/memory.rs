//! In-memory session store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Session, SessionError, SessionProvider};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");
const MINTED_ID_LEN: usize = 32;

#[derive(Debug)]
struct SessionState {
    data: BTreeMap<String, Value>,
    last_accessed: SystemTime,
    timeout: Duration,
    expired: bool,
}

/// Session held entirely in process memory.
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    started_at: SystemTime,
    state: Mutex<SessionState>,
}

impl MemorySession {
    #[must_use]
    pub fn new(id: impl Into<String>, timeout: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            id: id.into(),
            started_at: now,
            state: Mutex::new(SessionState {
                data: BTreeMap::new(),
                last_accessed: now,
                timeout,
                expired: false,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.with_state(|state| state.data.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Option<Value> {
        self.with_state(|state| state.data.insert(key.to_owned(), value))
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.with_state(|state| state.data.remove(key))
    }

    fn entries(&self) -> Vec<(String, Value)> {
        self.with_state(|state| {
            state
                .data
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
    }

    fn clear(&self) {
        self.with_state(|state| state.data.clear());
    }

    fn touch(&self) {
        self.with_state(|state| state.last_accessed = SystemTime::now());
    }

    fn started_at(&self) -> SystemTime {
        self.started_at
    }

    fn last_accessed(&self) -> SystemTime {
        self.with_state(|state| state.last_accessed)
    }

    fn timeout(&self) -> Duration {
        self.with_state(|state| state.timeout)
    }

    fn set_timeout(&self, timeout: Duration) {
        self.with_state(|state| state.timeout = timeout);
    }

    fn expire(&self) {
        self.with_state(|state| {
            state.expired = true;
            state.data.clear();
        });
    }

    fn is_expired(&self) -> bool {
        self.with_state(|state| {
            state.expired
                || state
                    .last_accessed
                    .elapsed()
                    .is_ok_and(|idle| idle > state.timeout)
        })
    }
}

/// Provider backed by a map of [`MemorySession`]s.
///
/// Known live sessions are touched and returned. Unknown or expired ids get a
/// fresh session; an empty id gets a newly minted one.
#[derive(Debug)]
pub struct MemorySessionProvider {
    sessions: Mutex<HashMap<String, Arc<MemorySession>>>,
    timeout: Duration,
    minted: AtomicU64,
}

impl MemorySessionProvider {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            minted: AtomicU64::new(0),
        }
    }

    /// Removes expired sessions, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        purge(&mut sessions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mint_id(&self, remote_address: Option<&str>) -> String {
        let counter = self.minted.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        let mut hasher = Sha256::new();
        hasher.update(remote_address.unwrap_or_default().as_bytes());
        hasher.update(counter.to_be_bytes());
        hasher.update(nanos.to_be_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..MINTED_ID_LEN / 2])
    }
}

impl SessionProvider for MemorySessionProvider {
    fn get_session(
        &self,
        session_id: &str,
        remote_address: Option<&str>,
    ) -> Result<Arc<dyn Session>, SessionError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(session_id)
            && !session.is_expired()
        {
            session.touch();
            return Ok(Arc::clone(session) as Arc<dyn Session>);
        }

        let purged = purge(&mut sessions);
        if purged > 0 {
            debug!(target: SESSION_TARGET, purged, "dropped expired sessions");
        }

        let id = if session_id.is_empty() {
            self.mint_id(remote_address)
        } else {
            session_id.to_owned()
        };
        debug!(
            target: SESSION_TARGET,
            session = %id,
            remote = remote_address.unwrap_or("unknown"),
            "creating session"
        );
        let session = Arc::new(MemorySession::new(id.clone(), self.timeout));
        sessions.insert(id, Arc::clone(&session));
        Ok(session)
    }
}

fn purge(sessions: &mut HashMap<String, Arc<MemorySession>>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired());
    before - sessions.len()
}
