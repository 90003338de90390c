//! Error types for the assistant orchestration core.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("A turn is already generating for this conversation")]
    TurnInProgress,
}

/// Request shape validation errors, raised before any network call.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Question text is required (use a placeholder for media-only input)")]
    MissingQuestion,

    #[error("Malformed data URI in field {field}: {reason}")]
    MalformedDataUri { field: &'static str, reason: String },
}

/// Media encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Failed to read media resource {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Media resource {path} is empty")]
    Empty { path: String },

    #[error("Cannot infer media type for {path}")]
    UnknownMediaType { path: String },
}

/// User-facing categories for generation provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Billing must be enabled on the provider account.
    BillingRequired,
    /// Rate limit or quota exhausted.
    QuotaExceeded,
    /// Anything else (transport, 5xx, unknown).
    Generic,
}

/// Failures from the Assistant Gateway boundary.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Generation completed but returned no text")]
    EmptyResponse,

    #[error("Tool calls exceeded the round limit ({limit}) without a final answer")]
    ToolRoundsExceeded { limit: usize },

    #[error("Provider failure ({status:?}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        /// HTTP status when the failure came from the wire, None for transport errors.
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to serialize request payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl AssistantError {
    /// Build a provider error, deriving the category from the HTTP status
    /// where possible and falling back to substring heuristics on the raw
    /// message only at this outermost edge.
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match status {
            Some(402) => ProviderErrorKind::BillingRequired,
            Some(429) => ProviderErrorKind::QuotaExceeded,
            _ => classify_provider_message(&message),
        };
        Self::Provider {
            kind,
            status,
            message,
        }
    }

    /// The user-facing category, Generic for non-provider failures.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Provider { kind, .. } => *kind,
            _ => ProviderErrorKind::Generic,
        }
    }
}

/// Substring fallback for providers that bury the failure category in free
/// text. Known fragility — statuses are preferred when available.
pub fn classify_provider_message(message: &str) -> ProviderErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("billing") || lower.contains("payment required") {
        ProviderErrorKind::BillingRequired
    } else if lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("resource_exhausted")
    {
        ProviderErrorKind::QuotaExceeded
    } else {
        ProviderErrorKind::Generic
    }
}

/// Conversation log storage errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to open log store: {0}")]
    Open(String),

    #[error("Append failed: {0}")]
    Append(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_402_maps_to_billing() {
        let err = AssistantError::provider(Some(402), "anything");
        assert_eq!(err.kind(), ProviderErrorKind::BillingRequired);
    }

    #[test]
    fn status_429_maps_to_quota() {
        let err = AssistantError::provider(Some(429), "anything");
        assert_eq!(err.kind(), ProviderErrorKind::QuotaExceeded);
    }

    #[test]
    fn substring_fallback_billing() {
        let err = AssistantError::provider(
            Some(400),
            "User location is not supported, billing must be enabled",
        );
        assert_eq!(err.kind(), ProviderErrorKind::BillingRequired);
    }

    #[test]
    fn substring_fallback_quota() {
        assert_eq!(
            classify_provider_message("RESOURCE_EXHAUSTED: quota exceeded"),
            ProviderErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify_provider_message("Rate limit hit, retry later"),
            ProviderErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn unknown_message_is_generic() {
        assert_eq!(
            classify_provider_message("connection reset by peer"),
            ProviderErrorKind::Generic
        );
        let err = AssistantError::EmptyResponse;
        assert_eq!(err.kind(), ProviderErrorKind::Generic);
    }

    #[test]
    fn round_limit_error_names_the_limit() {
        let err = AssistantError::ToolRoundsExceeded { limit: 4 };
        assert_eq!(err.kind(), ProviderErrorKind::Generic);
        assert!(err.to_string().contains("round limit (4)"));
    }
}
