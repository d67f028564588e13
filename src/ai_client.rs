// src/ai_client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reply persisted when the generator fails or times out. The customer's own
/// message is never lost; this stands in for the AI turn.
pub const AI_FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble responding right now. A member of our support team will get back to you shortly.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion API returned status {0}: {1}")]
    Api(u16, String),
    #[error("completion response contained no choices")]
    MissingChoice,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
}

/// Boundary to the external text-completion service. The message pipeline
/// only sees this trait, so tests can substitute a canned backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<Completion, AiError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<i32>,
    completion_tokens: Option<i32>,
}

/// Client for any OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("AI_API_KEY").ok().filter(|k| !k.is_empty())?;
        let base_url = std::env::var("AI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Some(Self::new(api_key, base_url, model))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<Completion, AiError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: turns,
            temperature: 0.4,
            max_tokens: 1024,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), body));
        }

        let parsed: CompletionResponse = response.json().await?;
        let choice = parsed.choices.into_iter().next().ok_or(AiError::MissingChoice)?;

        Ok(Completion {
            content: choice.message.content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}
