//! libSQL conversation log — durable `ConversationLog` backend.
//!
//! Uses libsql's native async API with a local file or in-memory database.
//! Live subscribers are served by the same broadcast fan-out as the memory
//! backend, layered over the durable writes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ConversationLog, Fanout, LogSubscription};
use crate::error::LogError;
use crate::message::{ConversationKey, Message, SenderId};

/// Durable conversation log backed by libSQL.
pub struct LibSqlLog {
    conn: Connection,
    fanout: Fanout,
}

impl LibSqlLog {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LogError::Open(format!("Failed to create log directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LogError::Open(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| LogError::Open(format!("Failed to create connection: {e}")))?;

        let log = Self {
            conn,
            fanout: Fanout::new(),
        };
        log.init_schema().await?;
        info!(path = %path.display(), "Conversation log opened");
        Ok(log)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, LogError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| LogError::Open(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| LogError::Open(format!("Failed to create connection: {e}")))?;

        let log = Self {
            conn,
            fanout: Fanout::new(),
        };
        log.init_schema().await?;
        Ok(log)
    }

    async fn init_schema(&self) -> Result<(), LogError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    conversation_key TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    text TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    image_url TEXT,
                    voice_url TEXT,
                    reply_to TEXT,
                    delivered INTEGER NOT NULL DEFAULT 0
                )",
                (),
            )
            .await
            .map_err(|e| LogError::Open(format!("init_schema: {e}")))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation
                 ON messages (conversation_key, timestamp)",
                (),
            )
            .await
            .map_err(|e| LogError::Open(format!("init_schema: {e}")))?;

        Ok(())
    }
}

/// Parse an RFC 3339 timestamp (our canonical write format).
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn row_to_message(row: &libsql::Row) -> Result<Message, LogError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| LogError::Query(format!("row id: {e}")))?;
    let sender_str: String = row
        .get(1)
        .map_err(|e| LogError::Query(format!("row sender: {e}")))?;
    let text: String = row
        .get(2)
        .map_err(|e| LogError::Query(format!("row text: {e}")))?;
    let timestamp_str: String = row
        .get(3)
        .map_err(|e| LogError::Query(format!("row timestamp: {e}")))?;
    let image_url: Option<String> = row.get(4).ok();
    let voice_url: Option<String> = row.get(5).ok();
    let reply_to_str: Option<String> = row.get(6).ok();
    let delivered: i64 = row.get(7).unwrap_or(0);

    Ok(Message {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        text,
        sender: SenderId::from_raw(&sender_str),
        timestamp: parse_timestamp(&timestamp_str),
        image_url,
        voice_url,
        reply_to: reply_to_str.and_then(|s| Uuid::parse_str(&s).ok()),
        delivered: delivered != 0,
    })
}

#[async_trait]
impl ConversationLog for LibSqlLog {
    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), LogError> {
        self.conn
            .execute(
                "INSERT INTO messages
                    (id, conversation_key, sender, text, timestamp,
                     image_url, voice_url, reply_to, delivered)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id.to_string(),
                    key.as_str(),
                    message.sender.as_str(),
                    message.text.clone(),
                    message.timestamp.to_rfc3339(),
                    message.image_url.clone(),
                    message.voice_url.clone(),
                    message.reply_to.map(|id| id.to_string()),
                    message.delivered as i64,
                ],
            )
            .await
            .map_err(|e| LogError::Append(format!("append: {e}")))?;

        debug!(conversation = %key, id = %message.id, "Message appended");
        self.fanout.publish(key, &message).await;
        Ok(())
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>, LogError> {
        // rowid breaks timestamp ties with insertion order, deterministically
        let mut rows = self
            .conn
            .query(
                "SELECT id, sender, text, timestamp, image_url, voice_url, reply_to, delivered
                 FROM messages WHERE conversation_key = ?1
                 ORDER BY timestamp ASC, rowid ASC",
                params![key.as_str()],
            )
            .await
            .map_err(|e| LogError::Query(format!("history: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn mark_delivered(&self, key: &ConversationKey, id: Uuid) -> Result<(), LogError> {
        self.conn
            .execute(
                "UPDATE messages SET delivered = 1
                 WHERE id = ?1 AND conversation_key = ?2",
                params![id.to_string(), key.as_str()],
            )
            .await
            .map_err(|e| LogError::Query(format!("mark_delivered: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self, key: &ConversationKey) -> LogSubscription {
        self.fanout.subscribe(key).await
    }
}
