//! Session contract consumed by the bridge.
//!
//! Session storage lives behind [`SessionProvider`]; the bridge only touches,
//! reads and writes entries. [`SessionAdapter`] is the view handed to jobs.

mod adapter;
mod locale;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use thiserror::Error;

pub use self::adapter::SessionAdapter;
pub use self::locale::{Collator, Locale, LocaleError, NumberFormat};
pub use self::memory::{MemorySession, MemorySessionProvider};

/// Key/value session with touch-and-expire semantics.
pub trait Session: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value, returning the previous one.
    fn set(&self, key: &str, value: Value) -> Option<Value>;

    fn remove(&self, key: &str) -> Option<Value>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Snapshot of every entry.
    fn entries(&self) -> Vec<(String, Value)>;

    fn clear(&self);

    /// Marks the session as accessed now.
    fn touch(&self);

    fn started_at(&self) -> SystemTime;

    fn last_accessed(&self) -> SystemTime;

    fn timeout(&self) -> Duration;

    fn set_timeout(&self, timeout: Duration);

    /// Ends the session immediately.
    fn expire(&self);

    fn is_expired(&self) -> bool;
}

/// Errors raised by session providers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {message}")]
    Unavailable { message: String },
}

/// Looks up or creates the session for an OPEN call.
pub trait SessionProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SessionError`] when the store cannot serve the session.
    fn get_session(
        &self,
        session_id: &str,
        remote_address: Option<&str>,
    ) -> Result<Arc<dyn Session>, SessionError>;
}

impl<T> SessionProvider for Arc<T>
where
    T: SessionProvider + ?Sized,
{
    fn get_session(
        &self,
        session_id: &str,
        remote_address: Option<&str>,
    ) -> Result<Arc<dyn Session>, SessionError> {
        (**self).get_session(session_id, remote_address)
    }
}
