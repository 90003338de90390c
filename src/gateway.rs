//! Assistant gateway — sends assembled requests to the generation
//! capability, runs synchronous tool round trips, and returns a validated
//! answer or a typed failure.
//!
//! The wire is the chat-completions shape: a message list with multi-part
//! content (text plus inline data-URI media), a `tools` array, and tool-call
//! round trips spliced back as `tool`-role messages.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::media::MediaKind;
use crate::prompt::Request;
use crate::tools::{Toolbox, WireToolCall};

/// Generation capability tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Fast tier. No audio understanding.
    Base,
    /// Advanced tier with full multimodal support.
    Advanced,
}

impl ModelTier {
    /// Whether this tier can understand voice media.
    pub fn supports_audio(&self) -> bool {
        matches!(self, ModelTier::Advanced)
    }

    /// The configured model name for this tier.
    pub fn model_name<'a>(&self, config: &'a AssistantConfig) -> &'a str {
        match self {
            ModelTier::Base => &config.base_model,
            ModelTier::Advanced => &config.advanced_model,
        }
    }
}

/// One wire round trip: messages and tool schemas in, text or tool calls out.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
}

/// What the model produced in one round trip.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<WireToolCall>,
}

/// The generation capability, invoked through an opaque request/response
/// contract. Implementations own transport and auth.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, AssistantError>;
}

/// A validated answer from one gateway invocation.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Tool round trips performed while producing the answer.
    pub tool_rounds: usize,
}

/// Gateway coordinating the backend and the tool capability set.
pub struct AssistantGateway {
    backend: Arc<dyn GenerationBackend>,
    toolbox: Arc<Toolbox>,
    config: AssistantConfig,
}

impl AssistantGateway {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        toolbox: Arc<Toolbox>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            backend,
            toolbox,
            config,
        }
    }

    /// Execute one assembled request to completion.
    ///
    /// Tool calls suspend the generation, run through the toolbox, and the
    /// outputs are spliced back before the final answer. The loop is bounded
    /// by `max_tool_rounds`.
    pub async fn invoke(&self, request: &Request) -> Result<Answer, AssistantError> {
        let mut messages = vec![
            json!({ "role": "system", "content": request.system }),
            json!({ "role": "user", "content": content_parts(request) }),
        ];
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let model = request.tier.model_name(&self.config).to_string();
        let mut tool_rounds = 0;

        loop {
            let response = self
                .backend
                .complete(&BackendRequest {
                    model: model.clone(),
                    messages: messages.clone(),
                    tools: tools.clone(),
                })
                .await?;

            if response.tool_calls.is_empty() {
                let text = response.text.unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(AssistantError::EmptyResponse);
                }
                info!(model = %model, tool_rounds, "Answer produced");
                return Ok(Answer { text, tool_rounds });
            }

            if tool_rounds >= self.config.max_tool_rounds {
                warn!(model = %model, rounds = tool_rounds, "Tool round limit reached");
                return Err(AssistantError::ToolRoundsExceeded {
                    limit: self.config.max_tool_rounds,
                });
            }
            tool_rounds += 1;

            messages.push(assistant_tool_call_message(&response));
            for call in &response.tool_calls {
                let outcome = self.toolbox.dispatch(call).await;
                debug!(tool = %call.name, "Tool outcome spliced into generation");
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": outcome.to_json().to_string(),
                }));
            }
        }
    }
}

/// Render the request as multi-part user content: text first, then each
/// media part tagged by kind, carrying its data URI.
fn content_parts(request: &Request) -> Vec<Value> {
    let mut parts = vec![json!({ "type": "text", "text": request.prompt_text })];
    for media in &request.media {
        let part = match media.kind() {
            MediaKind::Photo => json!({
                "type": "image_url",
                "image_url": { "url": media.as_str() }
            }),
            MediaKind::Voice => json!({
                "type": "input_audio",
                "input_audio": { "data": media.as_str() }
            }),
        };
        parts.push(part);
    }
    parts
}

fn assistant_tool_call_message(response: &BackendResponse) -> Value {
    let calls: Vec<Value> = response
        .tool_calls
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "type": "function",
                "function": { "name": c.name, "arguments": c.arguments }
            })
        })
        .collect();
    let mut message = json!({ "role": "assistant", "tool_calls": calls });
    if let Some(ref text) = response.text {
        message["content"] = json!(text);
    }
    message
}

// ── HTTP backend ────────────────────────────────────────────────────

/// Chat-completions backend over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: secrecy::SecretString,
}

impl HttpBackend {
    pub fn new(config: &AssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, AssistantError> {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            payload["tools"] = json!(request.tools);
            payload["tool_choice"] = json!("auto");
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistantError::provider(None, format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::provider(None, format!("body read failed: {e}")))?;

        if !status.is_success() {
            return Err(AssistantError::provider(Some(status.as_u16()), body));
        }

        let parsed: Value = serde_json::from_str(&body)?;
        Ok(parse_completion(&parsed))
    }
}

/// Extract text and tool calls from a chat-completions response body.
fn parse_completion(body: &Value) -> BackendResponse {
    let message = &body["choices"][0]["message"];

    let text = message["content"].as_str().map(String::from);
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    Some(WireToolCall {
                        id: c["id"].as_str()?.to_string(),
                        name: c["function"]["name"].as_str()?.to_string(),
                        arguments: c["function"]["arguments"].as_str().unwrap_or("{}").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    BackendResponse { text, tool_calls }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{PromptInput, assemble};
    use crate::tools::{InMemoryCatalog, InMemoryDirectory, PageFetcher, ProductSummary};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoFetch;

    #[async_trait]
    impl PageFetcher for NoFetch {
        async fn fetch(&self, _url: &str) -> Result<String, String> {
            Err("offline".into())
        }
    }

    fn toolbox() -> Arc<Toolbox> {
        Arc::new(Toolbox::new(
            Arc::new(InMemoryDirectory::new(vec![])),
            Arc::new(InMemoryCatalog::new(vec![ProductSummary {
                id: "p1".into(),
                name: "Vintage Camera".into(),
                description: "film camera".into(),
                price_cents: 12_000,
            }])),
            Arc::new(NoFetch),
        ))
    }

    /// Backend that replays a scripted sequence of responses.
    struct ScriptedBackend {
        script: tokio::sync::Mutex<Vec<Result<BackendResponse, AssistantError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<BackendResponse, AssistantError>>) -> Self {
            Self {
                script: tokio::sync::Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn complete(
            &self,
            _request: &BackendRequest,
        ) -> Result<BackendResponse, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().await.remove(0)
        }
    }

    fn text_response(text: &str) -> BackendResponse {
        BackendResponse {
            text: Some(text.into()),
            tool_calls: vec![],
        }
    }

    fn request() -> Request {
        assemble(
            "sys",
            &[],
            None,
            PromptInput::text("find me a camera"),
            ModelTier::Base,
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn tier_capabilities() {
        assert!(!ModelTier::Base.supports_audio());
        assert!(ModelTier::Advanced.supports_audio());

        let config = AssistantConfig::default();
        assert_eq!(ModelTier::Base.model_name(&config), config.base_model);
        assert_eq!(
            ModelTier::Advanced.model_name(&config),
            config.advanced_model
        );
    }

    #[tokio::test]
    async fn plain_answer_passes_through() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(text_response("here you go"))]));
        let gateway = AssistantGateway::new(backend.clone(), toolbox(), AssistantConfig::default());

        let answer = gateway.invoke(&request()).await.unwrap();
        assert_eq!(answer.text, "here you go");
        assert_eq!(answer.tool_rounds, 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tool_round_trip_completes() {
        let tool_call = BackendResponse {
            text: None,
            tool_calls: vec![WireToolCall {
                id: "call-1".into(),
                name: "find_product".into(),
                arguments: json!({"query": "camera"}).to_string(),
            }],
        };
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(tool_call),
            Ok(text_response("Found the Vintage Camera for you.")),
        ]));
        let gateway = AssistantGateway::new(backend.clone(), toolbox(), AssistantConfig::default());

        let answer = gateway.invoke(&request()).await.unwrap();
        assert_eq!(answer.tool_rounds, 1);
        assert!(answer.text.contains("Vintage Camera"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_tool_does_not_kill_the_turn() {
        let tool_call = BackendResponse {
            text: None,
            tool_calls: vec![WireToolCall {
                id: "call-1".into(),
                name: "browse".into(),
                arguments: json!({"url": "https://example.com"}).to_string(),
            }],
        };
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(tool_call),
            Ok(text_response("I could not read that page.")),
        ]));
        let gateway = AssistantGateway::new(backend, toolbox(), AssistantConfig::default());

        let answer = gateway.invoke(&request()).await.unwrap();
        assert_eq!(answer.text, "I could not read that page.");
    }

    #[tokio::test]
    async fn runaway_tool_calls_stop_at_the_round_limit() {
        let tool_call = BackendResponse {
            text: None,
            tool_calls: vec![WireToolCall {
                id: "call-1".into(),
                name: "find_product".into(),
                arguments: json!({"query": "camera"}).to_string(),
            }],
        };
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(tool_call.clone()),
            Ok(tool_call),
        ]));
        let config = AssistantConfig {
            max_tool_rounds: 1,
            ..AssistantConfig::default()
        };
        let gateway = AssistantGateway::new(backend.clone(), toolbox(), config);

        let err = gateway.invoke(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::ToolRoundsExceeded { limit: 1 }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_text_is_empty_response_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(text_response("   "))]));
        let gateway = AssistantGateway::new(backend, toolbox(), AssistantConfig::default());

        let err = gateway.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::EmptyResponse));
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(AssistantError::provider(
            Some(429),
            "quota exceeded",
        ))]));
        let gateway = AssistantGateway::new(backend, toolbox(), AssistantConfig::default());

        let err = gateway.invoke(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::Provider {
                kind: crate::error::ProviderErrorKind::QuotaExceeded,
                ..
            }
        ));
    }

    #[test]
    fn parse_completion_text_and_tools() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "hello",
                    "tool_calls": [{
                        "id": "c1",
                        "type": "function",
                        "function": { "name": "find_user", "arguments": "{\"name\":\"Alice\"}" }
                    }]
                }
            }]
        });
        let parsed = parse_completion(&body);
        assert_eq!(parsed.text.as_deref(), Some("hello"));
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "find_user");
    }

    #[test]
    fn content_parts_tag_media_by_kind() {
        use crate::media::{MediaKind, encode_bytes};
        let request = assemble(
            "sys",
            &[],
            None,
            PromptInput::text("look")
                .with_photo(encode_bytes(MediaKind::Photo, "image/png", b"img"))
                .with_voice(encode_bytes(MediaKind::Voice, "audio/mpeg", b"clip")),
            ModelTier::Advanced,
            vec![],
        )
        .unwrap();

        let parts = content_parts(&request);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert!(
            parts[1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert_eq!(parts[2]["type"], "input_audio");
    }
}
