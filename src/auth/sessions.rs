//! Active session registry.
//!
//! Records which tokens were handed out to which user so that operators can
//! see active sessions and drop them in bulk. The registry is advisory:
//! token verification never reads it, so a token removed here keeps working
//! until it expires. It lives in memory and is lost on restart.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<i64, HashSet<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a token issued to `user_id`.
    pub fn track(&self, user_id: i64, token: &str) {
        self.sessions
            .lock()
            .entry(user_id)
            .or_default()
            .insert(token.to_string());
    }

    /// Forget a single token (logout).
    pub fn forget(&self, user_id: i64, token: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(tokens) = sessions.get_mut(&user_id) {
            tokens.remove(token);
            if tokens.is_empty() {
                sessions.remove(&user_id);
            }
        }
    }

    /// Drop every tracked token for a user, returning how many were removed.
    pub fn invalidate_all(&self, user_id: i64) -> usize {
        self.sessions
            .lock()
            .remove(&user_id)
            .map(|tokens| tokens.len())
            .unwrap_or(0)
    }

    pub fn active_for(&self, user_id: i64) -> usize {
        self.sessions
            .lock()
            .get(&user_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    pub fn is_tracked(&self, user_id: i64, token: &str) -> bool {
        self.sessions
            .lock()
            .get(&user_id)
            .is_some_and(|tokens| tokens.contains(token))
    }
}
