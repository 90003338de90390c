//! Conversation data model — messages, sender identities, conversation keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved identity string for assistant-authored messages.
pub const ASSISTANT_ID: &str = "afu-ai";

/// Reserved identity string for system notices.
pub const SYSTEM_ID: &str = "system";

/// Who authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SenderId {
    /// A human participant, identified by their user id.
    User(String),
    /// The embedded assistant.
    Assistant,
    /// Reserved identity for notices written into the transcript.
    System,
}

impl SenderId {
    pub fn as_str(&self) -> &str {
        match self {
            SenderId::User(id) => id,
            SenderId::Assistant => ASSISTANT_ID,
            SenderId::System => SYSTEM_ID,
        }
    }

    /// True for assistant or system authorship (counts toward the
    /// one-assistant-message-per-turn invariant).
    pub fn is_assistant_authored(&self) -> bool {
        matches!(self, SenderId::Assistant | SenderId::System)
    }

    pub fn from_raw(raw: &str) -> Self {
        match raw {
            ASSISTANT_ID => SenderId::Assistant,
            SYSTEM_ID => SenderId::System,
            other => SenderId::User(other.to_string()),
        }
    }
}

/// One durable entry in a conversation log.
///
/// Immutable once appended, except the narrowly-scoped `delivered` patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: SenderId,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub voice_url: Option<String>,
    /// Id of the message this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub delivered: bool,
}

impl Message {
    pub fn user(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(SenderId::User(user_id.into()), text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(SenderId::Assistant, text)
    }

    /// A notice authored by the reserved system identity.
    pub fn system_notice(text: impl Into<String>) -> Self {
        Self::new(SenderId::System, text)
    }

    fn new(sender: SenderId, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            image_url: None,
            voice_url: None,
            reply_to: None,
            delivered: false,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_voice(mut self, url: impl Into<String>) -> Self {
        self.voice_url = Some(url.into());
        self
    }

    pub fn in_reply_to(mut self, id: Uuid) -> Self {
        self.reply_to = Some(id);
        self
    }
}

/// Stable key identifying one conversation.
///
/// Derived from the participant pair independent of order, or the reserved
/// assistant identity for the AI conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key for a human-to-human conversation. Symmetric in its arguments.
    pub fn for_pair(a: &str, b: &str) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}:{hi}"))
    }

    /// Key for a user's conversation with the assistant.
    pub fn for_assistant(user_id: &str) -> Self {
        Self::for_pair(user_id, ASSISTANT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
