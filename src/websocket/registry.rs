//! Multi-user session bookkeeping.
//!
//! A bidirectional map between application-defined users and their sessions,
//! for callbacks that broadcast or address one client by name.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use crate::net::connection::ConnectionId;
use crate::websocket::WebSocketSession;

/// Concurrent user ↔ session map.
#[derive(Debug)]
pub struct SessionRegistry<U>
where
    U: Eq + Hash + Clone,
{
    sessions: DashMap<U, Arc<WebSocketSession>>,
    users: DashMap<ConnectionId, U>,
}

impl<U> Default for SessionRegistry<U>
where
    U: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            users: DashMap::new(),
        }
    }
}

impl<U> SessionRegistry<U>
where
    U: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` for `session`. Returns `false` if the session is already registered.
    pub fn add_user(&self, session: Arc<WebSocketSession>, user: U) -> bool {
        let id = session.id();
        if self.users.contains_key(&id) {
            return false;
        }
        self.users.insert(id, user.clone());
        if let Some(previous) = self.sessions.insert(user, session) {
            self.users.remove(&previous.id());
        }
        true
    }

    /// Forget a session and its user. Returns the user that was registered.
    pub fn remove_user(&self, session: &WebSocketSession) -> Option<U> {
        let (_, user) = self.users.remove(&session.id())?;
        self.sessions.remove_if(&user, |_, s| s.id() == session.id());
        Some(user)
    }

    pub fn user_of(&self, session: &WebSocketSession) -> Option<U> {
        self.users.get(&session.id()).map(|u| u.value().clone())
    }

    pub fn session_of(&self, user: &U) -> Option<Arc<WebSocketSession>> {
        self.sessions.get(user).map(|s| Arc::clone(s.value()))
    }

    /// All registered users, in no particular order.
    pub fn users(&self) -> Vec<U> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Send `message` to every session. Failures are logged and skipped.
    ///
    /// Returns the number of sessions that received it.
    pub async fn send_to_all(&self, message: &str) -> usize {
        // Snapshot first: no map guard may be held across an await.
        let targets: Vec<_> = self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut delivered = 0;
        for session in targets {
            match session.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(session = %session.id(), key = %session.key(), error = %e, "Broadcast send failed"),
            }
        }
        delivered
    }

    /// Send `message` to one user. Returns `false` if the user is unknown.
    pub async fn send_to_user(&self, user: &U, message: &str) -> bool {
        let Some(session) = self.session_of(user) else {
            return false;
        };
        if let Err(e) = session.send(message).await {
            tracing::warn!(user = ?user, session = %session.id(), error = %e, "Send to user failed");
        }
        true
    }
}
