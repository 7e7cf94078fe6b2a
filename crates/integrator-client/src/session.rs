//! Login session storage

use integrator_core::{Secret, User};
use parking_lot::RwLock;
use std::fmt;

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token from `POST /token`
    pub token: Secret,
    /// Account behind the token, once fetched
    pub user: Option<User>,
}

impl Session {
    /// Session for a freshly issued token
    #[must_use]
    pub const fn new(token: Secret) -> Self {
        Self { token, user: None }
    }
}

/// Where the current session lives
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Current session, if logged in
    fn get(&self) -> Option<Session>;

    /// Replace the current session
    fn set(&self, session: Session);

    /// Forget the current session
    fn clear(&self);
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.session.read().clone()
    }

    fn set(&self, session: Session) {
        *self.session.write() = Some(session);
    }

    fn clear(&self) {
        self.session.write().take();
    }
}
