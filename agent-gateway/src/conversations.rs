use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One turn of a conversation, in the shape the LLM API expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// In-memory per-conversation history, append-only per key.
///
/// The async RwLock makes access safe on the multi-threaded runtime; history
/// is cloned out under the read lock so no lock is ever held across an LLM
/// call. Single-instance deployments only; horizontal scaling needs this in
/// a shared store.
#[derive(Default)]
pub struct ConversationStore {
    inner: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_conversation_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub async fn append(&self, conversation_id: &str, turn: ChatTurn) {
        let mut guard = self.inner.write().await;
        guard
            .entry(conversation_id.to_owned())
            .or_default()
            .push(turn);
    }

    /// Most recent `limit` turns, oldest first.
    pub async fn recent(&self, conversation_id: &str, limit: usize) -> Vec<ChatTurn> {
        let guard = self.inner.read().await;
        match guard.get(conversation_id) {
            Some(history) => {
                let start = history.len().saturating_sub(limit);
                history[start..].to_vec()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let store = ConversationStore::new();
        for i in 0..15 {
            store.append("c1", ChatTurn::user(format!("msg-{i}"))).await;
        }

        let recent = store.recent("c1", 10).await;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.first().unwrap().content, "msg-5");
        assert_eq!(recent.last().unwrap().content, "msg-14");
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let store = ConversationStore::new();
        assert!(store.recent("missing", 10).await.is_empty());
    }

    #[tokio::test]
    async fn conversations_do_not_bleed_into_each_other() {
        let store = ConversationStore::new();
        store.append("a", ChatTurn::user("hello")).await;
        store.append("b", ChatTurn::user("goodbye")).await;

        let a = store.recent("a", 10).await;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "hello");
    }
}
