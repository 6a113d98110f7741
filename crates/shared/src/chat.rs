use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::Mutex as TurnLock;
use tracing::{debug, info, warn};

use crate::llm::{Extraction, GatewayError, ModelGateway, extract_reply_bytes};
use crate::models::{ChatRequest, ChatResponse, DEFAULT_SESSION_KEY, Message};
use crate::store::ConversationStore;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Runs one chat turn: record the user message, send the whole session to the
/// gateway, record the reply.
///
/// Turns on the same session run one at a time, so the stored log always
/// alternates user and assistant messages in gateway call order. Different
/// sessions do not wait on each other.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ModelGateway>,
    turn_locks: Arc<Mutex<HashMap<String, Arc<TurnLock<()>>>>>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            store,
            gateway,
            turn_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn handle_turn(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let ChatRequest {
            session_id,
            message,
        } = request;
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let session_key = session_id.as_deref().unwrap_or(DEFAULT_SESSION_KEY);
        let turn_lock = self.turn_lock(session_key);
        let _turn = turn_lock.lock().await;

        let user_message = Message::user(message);
        self.store.append(session_key, user_message.clone());

        let history = self.store.snapshot(session_key);
        debug!(
            session_id = session_key,
            history_len = history.len(),
            "invoking model gateway"
        );

        let reply = match self.complete(&history).await {
            Ok(reply) => reply,
            Err(err) => {
                // A failed turn must not leave an unanswered user message behind.
                if !self.store.retract(session_key, &user_message) {
                    warn!(session_id = session_key, "user turn was already gone on rollback");
                }
                return Err(err.into());
            }
        };

        self.store
            .append(session_key, Message::assistant(reply.as_str()));
        info!(
            session_id = session_key,
            history_len = history.len() + 1,
            session_count = self.store.session_count(),
            "chat turn completed"
        );

        Ok(ChatResponse { session_id, reply })
    }

    fn turn_lock(&self, session_key: &str) -> Arc<TurnLock<()>> {
        self.turn_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_key.to_string())
            .or_default()
            .clone()
    }

    async fn complete(&self, history: &[Message]) -> Result<String, GatewayError> {
        let body = self.gateway.invoke(history).await?;

        let extraction = extract_reply_bytes(&body).map_err(|_| {
            GatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        match extraction {
            Extraction::Text { shape, text } => {
                debug!(?shape, "extracted reply text");
                Ok(text)
            }
            Extraction::NoText => Err(GatewayError::InvalidProviderPayload(
                "no_reply_text".to_string(),
            )),
        }
    }
}
