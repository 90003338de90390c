//! Conversation log — append-only per-conversation message sequences with
//! reactive subscription.
//!
//! The log is consumed through the `ConversationLog` trait: `append` and
//! `subscribe` are the load-bearing operations. Subscriptions are explicit
//! handles with explicit teardown; there is no process-wide singleton.

pub mod libsql_log;
pub mod memory;

pub use libsql_log::LibSqlLog;
pub use memory::MemoryLog;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::error::LogError;
use crate::message::{ConversationKey, Message};

/// Fan-out capacity per conversation. A lagged subscriber re-reads history.
const BROADCAST_CAPACITY: usize = 256;

/// Backend-agnostic conversation log contract.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Append a message to a conversation. Created implicitly on first append.
    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), LogError>;

    /// All messages of a conversation, oldest first. Ordering is by timestamp
    /// with insertion order breaking ties, deterministically.
    async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>, LogError>;

    /// The last `n` messages, oldest first.
    async fn tail(&self, key: &ConversationKey, n: usize) -> Result<Vec<Message>, LogError> {
        let mut all = self.history(key).await?;
        let skip = all.len().saturating_sub(n);
        Ok(all.split_off(skip))
    }

    /// Narrow field patch: mark a message as delivered.
    async fn mark_delivered(&self, key: &ConversationKey, id: Uuid) -> Result<(), LogError>;

    /// Subscribe to live appends for one conversation.
    async fn subscribe(&self, key: &ConversationKey) -> LogSubscription;
}

/// A live, ordered stream of appended messages for one conversation.
///
/// Dropping (or calling [`LogSubscription::close`]) tears the subscription
/// down; nothing is retained for slow readers beyond the fan-out buffer.
pub struct LogSubscription {
    key: ConversationKey,
    rx: broadcast::Receiver<Message>,
}

impl LogSubscription {
    /// The next appended message, or `None` once the log is gone.
    ///
    /// A lagged subscriber skips the missed entries and keeps going; callers
    /// that need the gap re-read `history`.
    pub async fn next(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conversation = %self.key, missed = n, "Log subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The conversation this subscription observes.
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Adapter for combinator-style consumption.
    pub fn into_stream(self) -> BroadcastStream<Message> {
        BroadcastStream::new(self.rx)
    }

    /// Explicit teardown.
    pub fn close(self) {}
}

/// Per-conversation broadcast fan-out shared by the log backends.
pub(crate) struct Fanout {
    senders: RwLock<HashMap<ConversationKey, broadcast::Sender<Message>>>,
}

impl Fanout {
    pub(crate) fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an append. Fine if nobody is listening yet.
    pub(crate) async fn publish(&self, key: &ConversationKey, message: &Message) {
        if let Some(tx) = self.senders.read().await.get(key) {
            let _ = tx.send(message.clone());
        }
    }

    pub(crate) async fn subscribe(&self, key: &ConversationKey) -> LogSubscription {
        let mut senders = self.senders.write().await;
        let tx = senders
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0);
        LogSubscription {
            key: key.clone(),
            rx: tx.subscribe(),
        }
    }
}
