//! Durable session storage behind an injectable trait, so the gateway and
//! controller can be unit-tested against an in-memory store.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::models::session::Session;

/// Process-wide session storage. Readers must tolerate the session being
/// cleared concurrently (logout mid-request) and treat absence as
/// "unauthenticated"; no method ever fails a read.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: Session);
    /// Replaces only the access token, keeping refresh token and role.
    fn set_access(&self, access: &str);
    /// Idempotent.
    fn clear(&self);
}

/// JSON file on disk, mirrored through an in-memory copy so reads stay cheap
/// and a failed disk write degrades to a process-lifetime session instead of
/// a lost one.
pub struct FileSessionStore {
    path: PathBuf,
    cached: Mutex<Option<Session>>,
}

impl FileSessionStore {
    /// Opens the store, loading any previously persisted session. A corrupt
    /// or unreadable file is treated as "no session".
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Session>(&contents) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("ignoring corrupt session file {}: {e}", path.display());
                    None
                }
            },
            Err(_) => None,
        };
        FileSessionStore {
            path,
            cached: Mutex::new(cached),
        }
    }

    fn persist(&self, session: Option<&Session>) {
        let result: anyhow::Result<()> = match session {
            Some(session) => serde_json::to_string(session)
                .map_err(anyhow::Error::from)
                .and_then(|json| std::fs::write(&self.path, json).map_err(Into::into)),
            None => match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            },
        };
        if let Err(e) = result {
            warn!("failed to persist session to {}: {e}", self.path.display());
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.cached.lock().expect("session store lock poisoned")
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        self.guard().clone()
    }

    fn save(&self, session: Session) {
        let mut cached = self.guard();
        *cached = Some(session);
        self.persist(cached.as_ref());
    }

    fn set_access(&self, access: &str) {
        let mut cached = self.guard();
        if let Some(session) = cached.as_mut() {
            session.access = access.to_string();
        } else {
            debug!("set_access on an empty session store ignored");
        }
        self.persist(cached.as_ref());
    }

    fn clear(&self) {
        let mut cached = self.guard();
        *cached = None;
        self.persist(None);
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        MemorySessionStore {
            inner: Mutex::new(Some(session)),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner.lock().expect("session store lock poisoned")
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.guard().clone()
    }

    fn save(&self, session: Session) {
        *self.guard() = Some(session);
    }

    fn set_access(&self, access: &str) {
        if let Some(session) = self.guard().as_mut() {
            session.access = access.to_string();
        }
    }

    fn clear(&self) {
        *self.guard() = None;
    }
}
