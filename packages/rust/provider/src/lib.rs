//! Generation client for the language-model provider.
//!
//! Talks to an OpenAI-compatible Responses endpoint. Summary generation is
//! web-search augmented; translation is a plain completion. Every call carries
//! its own hard timeout and maps failures onto [`MarketBriefError`]:
//!
//! - non-2xx status: [`MarketBriefError::Provider`] with the status and body
//! - 2xx without recognizable text: [`MarketBriefError::ProviderContract`]
//! - deadline exceeded: [`MarketBriefError::Timeout`]
//!
//! The orchestrator depends on the [`SummaryGenerator`] trait rather than the
//! concrete [`GenerationClient`], so tests can substitute a scripted fake.

pub mod prompt;
pub mod response;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

use marketbrief_shared::{
    Language, MarketBriefError, ProviderConfig, ReasoningEffort, Result, RunKind,
};

pub use prompt::{PromptMessage, SECTION_HEADERS};
pub use response::{ContentStrategy, TokenUsage, extract_content};

const USER_AGENT: &str = concat!("MarketBrief/", env!("CARGO_PKG_VERSION"));

/// Payload characters kept when logging an unrecognized response.
const LOGGED_PAYLOAD_LIMIT: usize = 2_000;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Inputs for one asset summary.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub symbol: String,
    pub name: String,
    /// Drives the reasoning-effort tier.
    pub kind: RunKind,
    /// Preferred source domains. Empty means no preference.
    pub allowed_domains: Vec<String>,
}

/// A generated English summary.
#[derive(Debug, Clone)]
pub struct Generation {
    pub content: String,
    pub usage: TokenUsage,
    /// Model reported by the provider, or the configured model.
    pub model: String,
}

/// Inputs for translating a generated summary.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub content: String,
    pub language: Language,
}

/// A translated summary.
#[derive(Debug, Clone)]
pub struct Translation {
    pub content: String,
    pub usage: TokenUsage,
}

// ---------------------------------------------------------------------------
// Trait seam
// ---------------------------------------------------------------------------

/// Anything that can produce and translate summaries.
pub trait SummaryGenerator: Send + Sync {
    /// Generate a four-section Markdown summary for one asset.
    fn generate_summary(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<Generation>> + Send;

    /// Translate a summary, keeping its section headers in English.
    fn translate_summary(
        &self,
        request: &TranslateRequest,
    ) -> impl Future<Output = Result<Translation>> + Send;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<PromptMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    reasoning: Reasoning,
}

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    effort: ReasoningEffort,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the provider's Responses endpoint.
pub struct GenerationClient {
    client: Client,
    config: ProviderConfig,
}

impl GenerationClient {
    /// Build a client. Deadlines come from `config`, not the HTTP client.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketBriefError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Model requested on every call.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url)
    }

    /// POST a request and return the extracted text plus the raw body,
    /// failing with a timeout error named after `operation`.
    async fn call(
        &self,
        operation: &str,
        deadline: Duration,
        body: &ResponsesRequest<'_>,
    ) -> Result<(String, Value)> {
        let value = tokio::time::timeout(deadline, self.post(body))
            .await
            .map_err(|_| MarketBriefError::timeout(operation, deadline))??;

        match extract_content(&value) {
            Some((strategy, text)) => {
                debug!(?strategy, chars = text.len(), "extracted provider content");
                Ok((text, value))
            }
            None => {
                let payload: String = value.to_string().chars().take(LOGGED_PAYLOAD_LIMIT).collect();
                error!(%payload, "unrecognized provider response");
                Err(MarketBriefError::ProviderContract(
                    "could not extract content from provider response".into(),
                ))
            }
        }
    }

    async fn post(&self, body: &ResponsesRequest<'_>) -> Result<Value> {
        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| MarketBriefError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketBriefError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            MarketBriefError::ProviderContract(format!("response body is not JSON: {e}"))
        })
    }
}

impl SummaryGenerator for GenerationClient {
    #[instrument(skip_all, fields(symbol = %request.symbol, kind = %request.kind))]
    async fn generate_summary(&self, request: &GenerateRequest) -> Result<Generation> {
        let body = ResponsesRequest {
            model: &self.config.model,
            input: prompt::summary_messages(
                &request.symbol,
                &request.name,
                &request.allowed_domains,
                self.config.strict_prompt,
            ),
            tools: vec![Tool { kind: "web_search" }],
            reasoning: Reasoning {
                effort: request.kind.reasoning_effort(),
            },
        };

        let (content, value) = self
            .call("summary generation", self.config.generation_timeout, &body)
            .await?;

        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.config.model)
            .to_string();

        Ok(Generation {
            content,
            usage: TokenUsage::from_response(&value),
            model,
        })
    }

    #[instrument(skip_all, fields(language = request.language.code))]
    async fn translate_summary(&self, request: &TranslateRequest) -> Result<Translation> {
        let body = ResponsesRequest {
            model: &self.config.model,
            input: prompt::translation_messages(&request.content, &request.language),
            tools: Vec::new(),
            reasoning: Reasoning {
                effort: ReasoningEffort::Low,
            },
        };

        let (content, value) = self
            .call("translation", self.config.translation_timeout, &body)
            .await?;

        Ok(Translation {
            content,
            usage: TokenUsage::from_response(&value),
        })
    }
}

#[cfg(test)]
mod tests {
    use marketbrief_shared::{OpenAiConfig, SUPPORTED_LANGUAGES};
    use serde_json::json;

    use super::*;

    fn client_for(server: &wiremock::MockServer) -> GenerationClient {
        let openai = OpenAiConfig {
            base_url: server.uri(),
            ..OpenAiConfig::default()
        };
        GenerationClient::new(&ProviderConfig::new(&openai, "test-key")).unwrap()
    }

    fn wld_request(kind: RunKind) -> GenerateRequest {
        GenerateRequest {
            symbol: "WLD".into(),
            name: "Worldcoin".into(),
            kind,
            allowed_domains: vec!["worldcoin.org".into()],
        }
    }

    #[tokio::test]
    async fn generate_reads_message_item_and_usage() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/responses"))
            .and(wiremock::matchers::header("authorization", "Bearer test-key"))
            .and(wiremock::matchers::body_partial_json(json!({
                "tools": [{ "type": "web_search" }],
                "reasoning": { "effort": "medium" }
            })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "model": "o4-mini-2025-04-16",
                "output": [
                    { "type": "web_search_call", "status": "completed" },
                    { "type": "message", "content": [{ "type": "output_text", "text": "## Overview\nWLD. https://worldcoin.org" }] }
                ],
                "usage": { "input_tokens": 1200, "output_tokens": 800 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generation = client_for(&server)
            .generate_summary(&wld_request(RunKind::Daily))
            .await
            .unwrap();

        assert_eq!(generation.content, "## Overview\nWLD. https://worldcoin.org");
        assert_eq!(generation.usage, TokenUsage::new(1200, 800));
        assert_eq!(generation.model, "o4-mini-2025-04-16");
    }

    #[tokio::test]
    async fn hourly_uses_low_effort_and_falls_back_to_configured_model() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::body_partial_json(json!({
                "reasoning": { "effort": "low" }
            })))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({ "output_text": "## Overview\nshort" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let generation = client
            .generate_summary(&wld_request(RunKind::Hourly))
            .await
            .unwrap();

        assert_eq!(generation.content, "## Overview\nshort");
        assert_eq!(generation.model, client.model());
        assert_eq!(generation.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn translate_accepts_chat_shape_without_tools() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/responses"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "## Overview\n概要" } }],
                "usage": { "prompt_tokens": 300, "completion_tokens": 400 }
            })))
            .mount(&server)
            .await;

        let translation = client_for(&server)
            .translate_summary(&TranslateRequest {
                content: "## Overview\nBody".into(),
                language: SUPPORTED_LANGUAGES[1],
            })
            .await
            .unwrap();

        assert_eq!(translation.content, "## Overview\n概要");
        assert_eq!(translation.usage, TokenUsage::new(300, 400));

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(sent.get("tools").is_none());
        assert_eq!(sent["reasoning"]["effort"], "low");
        assert_eq!(sent["input"][1]["role"], "user");
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_summary(&wld_request(RunKind::Daily))
            .await
            .unwrap_err();

        match err {
            MarketBriefError::Provider { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_shape_is_contract_violation() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "resp_1", "output": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_summary(&wld_request(RunKind::Hourly))
            .await
            .unwrap_err();

        assert!(matches!(err, MarketBriefError::ProviderContract(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(json!({ "output_text": "late" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let openai = OpenAiConfig {
            base_url: server.uri(),
            ..OpenAiConfig::default()
        };
        let mut config = ProviderConfig::new(&openai, "test-key");
        config.translation_timeout = Duration::from_millis(50);
        let client = GenerationClient::new(&config).unwrap();

        let err = client
            .translate_summary(&TranslateRequest {
                content: "## Overview\nBody".into(),
                language: SUPPORTED_LANGUAGES[2],
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "translation timed out after 50ms");
        match err {
            MarketBriefError::Timeout { operation, after } => {
                assert_eq!(operation, "translation");
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
