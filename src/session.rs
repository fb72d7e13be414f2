//! Per-connection session state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Opaque identifier of a live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of [`SessionStore::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Bound,
    /// The session already belongs to a tenant; the binding is unchanged.
    AlreadyBound,
    /// No live session with that id, e.g. the client already disconnected.
    NoSession,
}

#[derive(Debug, Default)]
struct Session {
    tenant: Option<String>,
}

/// Maps connections to the tenant they authenticated as.
///
/// Lookups take a shared lock and never block each other; `bind` and
/// `remove` take the exclusive lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, unauthenticated session.
    pub fn create(&self) -> ConnectionId {
        let id = ConnectionId::new();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Session::default());
        id
    }

    /// Bind a live session to `tenant`. A session is bound at most once.
    pub fn bind(&self, id: ConnectionId, tenant: &str) -> Binding {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&id) {
            None => Binding::NoSession,
            Some(session) if session.tenant.is_some() => Binding::AlreadyBound,
            Some(session) => {
                session.tenant = Some(tenant.to_string());
                Binding::Bound
            }
        }
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<String> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|s| s.tenant.clone())
    }

    pub fn remove(&self, id: ConnectionId) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
