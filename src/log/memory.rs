//! In-memory conversation log — the default backend for tests and
//! single-process use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ConversationLog, Fanout, LogSubscription};
use crate::error::LogError;
use crate::message::{ConversationKey, Message};

/// In-memory log with broadcast fan-out per conversation.
pub struct MemoryLog {
    conversations: RwLock<HashMap<ConversationKey, Vec<Message>>>,
    fanout: Fanout,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            fanout: Fanout::new(),
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for MemoryLog {
    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), LogError> {
        {
            let mut conversations = self.conversations.write().await;
            let entries = conversations.entry(key.clone()).or_default();
            entries.push(message.clone());
        }
        debug!(conversation = %key, sender = message.sender.as_str(), "Message appended");
        self.fanout.publish(key, &message).await;
        Ok(())
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>, LogError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_delivered(&self, key: &ConversationKey, id: Uuid) -> Result<(), LogError> {
        let mut conversations = self.conversations.write().await;
        if let Some(entries) = conversations.get_mut(key)
            && let Some(message) = entries.iter_mut().find(|m| m.id == id)
        {
            message.delivered = true;
        }
        Ok(())
    }

    async fn subscribe(&self, key: &ConversationKey) -> LogSubscription {
        self.fanout.subscribe(key).await
    }
}
