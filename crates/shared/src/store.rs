use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Message;

/// Append-only conversation log keyed by session id.
pub trait ConversationStore: Send + Sync {
    fn append(&self, session_id: &str, message: Message);

    /// Ordered copy of the session's messages. Unknown sessions are empty.
    fn snapshot(&self, session_id: &str) -> Vec<Message>;

    /// Removes the most recent message equal to `message`. Used to drop a
    /// user turn the gateway never answered.
    fn retract(&self, session_id: &str, message: &Message) -> bool;

    fn session_count(&self) -> usize;
}

type SessionLog = Arc<RwLock<Vec<Message>>>;

/// Process-local store. The session map lock is only held long enough to
/// look up or create a session; each session log has its own lock.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, SessionLog>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self, session_id: &str) -> Option<SessionLog> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn session_or_insert(&self, session_id: &str) -> SessionLog {
        if let Some(log) = self.session(session_id) {
            return log;
        }

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn append(&self, session_id: &str, message: Message) {
        let log = self.session_or_insert(session_id);
        log.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn snapshot(&self, session_id: &str) -> Vec<Message> {
        let Some(log) = self.session(session_id) else {
            return Vec::new();
        };

        let messages = log.read().unwrap_or_else(PoisonError::into_inner);
        messages.to_vec()
    }

    fn retract(&self, session_id: &str, message: &Message) -> bool {
        let Some(log) = self.session(session_id) else {
            return false;
        };

        let mut messages = log.write().unwrap_or_else(PoisonError::into_inner);
        match messages.iter().rposition(|existing| existing == message) {
            Some(index) => {
                messages.remove(index);
                true
            }
            None => false,
        }
    }

    fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
