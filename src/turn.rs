//! Reconciliation layer — drives one user turn through the state machine
//! `Idle → UserAppended → (Gating | Generating) → AssistantAppended → Idle`.
//!
//! The user message is appended optimistically before any model call and is
//! never rolled back. Every turn that reaches `UserAppended` ends with
//! exactly one assistant-authored message: a genuine answer, the upgrade
//! notice, or a failure notice. A dropped attachment leaves a system notice
//! ahead of the user message; it does not count as the turn's reply. Nothing
//! escapes this boundary.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AssistantConfig;
use crate::error::{Error, ProviderErrorKind, Result};
use crate::gateway::{AssistantGateway, ModelTier};
use crate::log::ConversationLog;
use crate::media::{DataUri, MediaKind, encode_file};
use crate::message::{ConversationKey, Message};
use crate::notify::{Notice, Notifier};
use crate::prompt::{PromptInput, assemble};
use crate::tools::Toolbox;

// ── Fixed user-facing texts ─────────────────────────────────────────

/// Appended instead of an answer when voice hits the base tier.
pub const UPGRADE_NOTICE: &str = "Voice messages need audio understanding, which \
is only available on the advanced tier. To chat with voice, please upgrade to \
AfuAi Advanced.";

/// Written into the transcript when an attachment is dropped at encoding.
pub const ATTACHMENT_NOTICE: &str = "An attachment could not be read and was \
removed from the following message.";

/// Fallback transcript text per failure category.
pub const BILLING_FALLBACK: &str = "I can't reply right now because billing is \
not enabled for the assistant. Once billing is set up, send your message again.";
pub const QUOTA_FALLBACK: &str = "I'm receiving too many requests at the moment. \
Please wait a little and resend your message.";
pub const GENERIC_FALLBACK: &str = "Something went wrong while writing a reply. \
Please try sending your message again.";

const TOAST_BILLING: &str = "Billing Required";
const TOAST_QUOTA: &str = "Quota Exceeded";
const TOAST_GENERIC: &str = "Something went wrong";

// ── Turn input / output ─────────────────────────────────────────────

/// A media attachment as submitted: a local resource to encode, or an
/// already-encoded data URI.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Path(PathBuf),
    Encoded(DataUri),
}

/// One user submission.
#[derive(Debug, Clone)]
pub struct UserTurn {
    pub user_id: String,
    pub text: String,
    pub photo: Option<MediaSource>,
    pub voice: Option<MediaSource>,
    pub reply_to: Option<Uuid>,
    pub tier: ModelTier,
}

impl UserTurn {
    pub fn text_only(user_id: impl Into<String>, text: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            photo: None,
            voice: None,
            reply_to: None,
            tier,
        }
    }
}

/// How a completed turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The gateway produced a real answer.
    Answered,
    /// Voice on the base tier; the upgrade notice was appended instead.
    Gated,
    /// Generation failed; the category's fallback notice was appended.
    Failed(ProviderErrorKind),
}

/// Receipt for one completed turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub user_message_id: Uuid,
    pub assistant_message_id: Uuid,
    pub outcome: TurnOutcome,
}

// ── Engine ──────────────────────────────────────────────────────────

/// Drives user turns against the log, gateway, and notification channel.
pub struct TurnEngine {
    log: Arc<dyn ConversationLog>,
    gateway: Arc<AssistantGateway>,
    toolbox: Arc<Toolbox>,
    notifier: Notifier,
    config: AssistantConfig,
    /// Conversations with a turn currently in `Generating`.
    busy: Mutex<HashSet<ConversationKey>>,
}

/// Releases the per-conversation busy mark on every exit path.
struct TurnGuard<'a> {
    busy: &'a Mutex<HashSet<ConversationKey>>,
    key: ConversationKey,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.key);
        }
    }
}

impl TurnEngine {
    pub fn new(
        log: Arc<dyn ConversationLog>,
        gateway: Arc<AssistantGateway>,
        toolbox: Arc<Toolbox>,
        notifier: Notifier,
        config: AssistantConfig,
    ) -> Self {
        Self {
            log,
            gateway,
            toolbox,
            notifier,
            config,
            busy: Mutex::new(HashSet::new()),
        }
    }

    /// Run one turn to completion.
    ///
    /// A submission while the same conversation is still generating is
    /// rejected with [`Error::TurnInProgress`]; independent conversations
    /// run concurrently.
    pub async fn submit(&self, key: &ConversationKey, turn: UserTurn) -> Result<TurnReport> {
        let _guard = self.acquire(key)?;

        // Encode media first. A failed encode drops that part, never the
        // whole submission.
        let (photo, photo_dropped) = self.encode_media(MediaKind::Photo, turn.photo).await;
        let (voice, voice_dropped) = self.encode_media(MediaKind::Voice, turn.voice).await;

        // Validate input shape before anything is appended.
        let input = match PromptInput::from_raw(
            &turn.text,
            photo.as_ref().map(|p| p.as_str()),
            voice.as_ref().map(|v| v.as_str()),
        ) {
            Ok(input) => input,
            Err(e) => {
                self.notifier
                    .push(Notice::error(TOAST_GENERIC, e.to_string()));
                return Err(e.into());
            }
        };

        // A dropped attachment leaves a durable note ahead of the user
        // message, so the transcript explains the missing media. The note is
        // not the turn's reply; the single assistant-authored message of the
        // turn is still the one appended after the user message.
        if photo_dropped || voice_dropped {
            self.log
                .append(key, Message::system_notice(ATTACHMENT_NOTICE))
                .await?;
        }

        // Snapshot the tail at the moment of submission: this is the context
        // window, and it must not yet include the new user message.
        let history = self.log.history(key).await?;
        let replied = turn
            .reply_to
            .and_then(|id| history.iter().find(|m| m.id == id).cloned());

        // UserAppended — optimistic, never rolled back.
        let mut user_message =
            Message::user(&turn.user_id, &input.question);
        if let Some(ref p) = input.photo {
            user_message = user_message.with_image(p.as_str());
        }
        if let Some(ref v) = input.voice {
            user_message = user_message.with_voice(v.as_str());
        }
        if let Some(id) = turn.reply_to {
            user_message = user_message.in_reply_to(id);
        }
        let user_message_id = user_message.id;
        self.log.append(key, user_message).await?;

        // Gating — voice against a tier without audio support never reaches
        // the gateway.
        if input.has_voice() && !turn.tier.supports_audio() {
            info!(conversation = %key, "Voice turn gated on base tier");
            let notice = Message::assistant(UPGRADE_NOTICE).in_reply_to(user_message_id);
            let assistant_message_id = notice.id;
            self.log.append(key, notice).await?;
            return Ok(TurnReport {
                user_message_id,
                assistant_message_id,
                outcome: TurnOutcome::Gated,
            });
        }

        // Generating.
        let (text, outcome) = match assemble(
            &self.config.system_prompt,
            &history,
            replied.as_ref(),
            input,
            turn.tier,
            self.toolbox.descriptors(),
        ) {
            Ok(request) => match self.gateway.invoke(&request).await {
                Ok(answer) => (answer.text, TurnOutcome::Answered),
                Err(e) => {
                    error!(conversation = %key, error = %e, "Generation failed");
                    let kind = e.kind();
                    let (title, fallback) = failure_texts(kind);
                    self.notifier.push(Notice::error(title, e.to_string()));
                    (fallback.to_string(), TurnOutcome::Failed(kind))
                }
            },
            Err(e) => {
                // Assembly rejected the request shape after the optimistic
                // append; the transcript still gets its notice.
                warn!(conversation = %key, error = %e, "Request failed validation");
                self.notifier
                    .push(Notice::error(TOAST_GENERIC, e.to_string()));
                (
                    GENERIC_FALLBACK.to_string(),
                    TurnOutcome::Failed(ProviderErrorKind::Generic),
                )
            }
        };

        // AssistantAppended — exactly one, on every path.
        let assistant_message = Message::assistant(text).in_reply_to(user_message_id);
        let assistant_message_id = assistant_message.id;
        self.log.append(key, assistant_message).await?;

        Ok(TurnReport {
            user_message_id,
            assistant_message_id,
            outcome,
        })
    }

    /// Run a turn detached from the caller: navigating away does not cancel
    /// an in-flight generation, and the eventual result still lands in the
    /// log.
    pub fn spawn_submit(
        self: &Arc<Self>,
        key: ConversationKey,
        turn: UserTurn,
    ) -> tokio::task::JoinHandle<Result<TurnReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.submit(&key, turn).await })
    }

    fn acquire(&self, key: &ConversationKey) -> Result<TurnGuard<'_>> {
        let mut busy = self
            .busy
            .lock()
            .map_err(|_| Error::TurnInProgress)?;
        if !busy.insert(key.clone()) {
            return Err(Error::TurnInProgress);
        }
        Ok(TurnGuard {
            busy: &self.busy,
            key: key.clone(),
        })
    }

    /// Encode one attachment. The second slot is `true` when a supplied
    /// attachment had to be dropped.
    async fn encode_media(
        &self,
        kind: MediaKind,
        source: Option<MediaSource>,
    ) -> (Option<DataUri>, bool) {
        let Some(source) = source else {
            return (None, false);
        };
        match source {
            MediaSource::Encoded(uri) => (Some(uri), false),
            MediaSource::Path(path) => match encode_file(kind, &path).await {
                Ok(uri) => (Some(uri), false),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Attachment encoding failed");
                    self.notifier.push(Notice::error(
                        "Attachment failed",
                        "Your attachment could not be read, so the message was \
                         sent without it.",
                    ));
                    (None, true)
                }
            },
        }
    }
}

/// Toast title and transcript fallback for a failure category.
fn failure_texts(kind: ProviderErrorKind) -> (&'static str, &'static str) {
    match kind {
        ProviderErrorKind::BillingRequired => (TOAST_BILLING, BILLING_FALLBACK),
        ProviderErrorKind::QuotaExceeded => (TOAST_QUOTA, QUOTA_FALLBACK),
        ProviderErrorKind::Generic => (TOAST_GENERIC, GENERIC_FALLBACK),
    }
}
