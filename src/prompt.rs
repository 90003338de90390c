//! Prompt assembler — builds a structured request from history, reply
//! context, the new user input, and the available tools.
//!
//! Validation happens here, before any network call: the question text is
//! required (a placeholder stands in for media-only submissions) and media
//! fields must be well-formed data URIs.

use std::fmt::Write as _;

use crate::config::HISTORY_WINDOW;
use crate::error::SchemaError;
use crate::gateway::ModelTier;
use crate::media::{DataUri, MediaKind};
use crate::message::{Message, SenderId};
use crate::tools::ToolDescriptor;

/// Placeholder question used when the user sends only a voice clip.
pub const VOICE_PLACEHOLDER: &str = "This is a voice message. Please respond to it.";

/// Placeholder question used when the user sends only a photo.
pub const PHOTO_PLACEHOLDER: &str = "This is a photo. Please respond to it.";

/// Validated user input for one turn.
#[derive(Debug, Clone)]
pub struct PromptInput {
    pub question: String,
    pub photo: Option<DataUri>,
    pub voice: Option<DataUri>,
}

impl PromptInput {
    pub fn text(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            photo: None,
            voice: None,
        }
    }

    pub fn with_photo(mut self, photo: DataUri) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn with_voice(mut self, voice: DataUri) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Build from raw strings, checking the data-URI shape of media fields.
    /// An empty question with media gets the matching placeholder (voice
    /// wins when both kinds are present); empty without media is an error.
    pub fn from_raw(
        question: &str,
        photo_url: Option<&str>,
        voice_url: Option<&str>,
    ) -> Result<Self, SchemaError> {
        let photo = photo_url
            .map(|s| {
                DataUri::parse(MediaKind::Photo, s).ok_or(SchemaError::MalformedDataUri {
                    field: "photo",
                    reason: format!("not a data URI: {s}"),
                })
            })
            .transpose()?;

        let voice = voice_url
            .map(|s| {
                DataUri::parse(MediaKind::Voice, s).ok_or(SchemaError::MalformedDataUri {
                    field: "voice",
                    reason: format!("not a data URI: {s}"),
                })
            })
            .transpose()?;

        let question = if question.trim().is_empty() {
            if voice.is_some() {
                VOICE_PLACEHOLDER.to_string()
            } else if photo.is_some() {
                PHOTO_PLACEHOLDER.to_string()
            } else {
                return Err(SchemaError::MissingQuestion);
            }
        } else {
            question.to_string()
        };

        Ok(Self {
            question,
            photo,
            voice,
        })
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }
}

/// The assembled prompt handed to the gateway. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct Request {
    pub system: String,
    /// Transcript, quoted reply context, and the new question as one text part.
    pub prompt_text: String,
    /// Media parts in submission order (photo before voice).
    pub media: Vec<DataUri>,
    pub tools: Vec<ToolDescriptor>,
    pub tier: ModelTier,
}

impl Request {
    pub fn has_voice(&self) -> bool {
        self.media.iter().any(|m| m.kind() == MediaKind::Voice)
    }
}

/// Transcript label for a sender. Notices are assistant-authored, so system
/// messages render under the assistant label.
fn label(sender: &SenderId) -> &'static str {
    match sender {
        SenderId::User(_) => "User",
        SenderId::Assistant | SenderId::System => "Assistant",
    }
}

/// Build a request from the conversation tail and the new input.
///
/// The history window is the last [`HISTORY_WINDOW`] messages, rendered
/// oldest first. Input is validated before assembly.
pub fn assemble(
    system: &str,
    history: &[Message],
    reply_to: Option<&Message>,
    input: PromptInput,
    tier: ModelTier,
    tools: Vec<ToolDescriptor>,
) -> Result<Request, SchemaError> {
    if input.question.trim().is_empty() {
        return Err(SchemaError::MissingQuestion);
    }

    let window = &history[history.len().saturating_sub(HISTORY_WINDOW)..];

    let mut prompt_text = String::new();
    if !window.is_empty() {
        prompt_text.push_str("Conversation so far:\n");
        for message in window {
            let _ = writeln!(prompt_text, "{}: {}", label(&message.sender), message.text);
        }
        prompt_text.push('\n');
    }

    if let Some(replied) = reply_to {
        let _ = writeln!(prompt_text, "Replying to: \"{}\"", replied.text);
    }

    prompt_text.push_str(&input.question);

    let mut media = Vec::new();
    if let Some(photo) = input.photo {
        media.push(photo);
    }
    if let Some(voice) = input.voice {
        media.push(voice);
    }

    Ok(Request {
        system: system.to_string(),
        prompt_text,
        media,
        tools,
        tier,
    })
}
