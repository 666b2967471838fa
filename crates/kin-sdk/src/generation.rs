//! Generation Backend
//!
//! Seam over the remote text-generation service. The pipeline makes a
//! single attempt per turn; timeouts and transport failures surface as
//! [`ChatError::Generation`] and are never retried here.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChatError, SdkResult};

/// External text-generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for one assembled prompt string.
    async fn invoke(&self, prompt: &str) -> SdkResult<String>;

    /// The model variant this backend is configured for. Participates in
    /// the CompanionKey so memory never crosses model variants.
    fn model_name(&self) -> &str;
}

/// Configuration for the HTTP generation backend.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Response length bound, enforced by the backend rather than by
    /// post-hoc truncation.
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama2-13b".to_string(),
            api_key: None,
            max_tokens: 512,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CompletionMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

/// Chat-completions HTTP backend (OpenAI wire format).
pub struct OpenAiBackend {
    config: GenerationConfig,
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: GenerationConfig) -> SdkResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_request_body(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![CompletionMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn invoke(&self, prompt: &str) -> SdkResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = self.build_request_body(prompt);

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.config.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ChatError::generation(format!("backend request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::generation(format!(
                "backend error {status}: {body_text}"
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::generation(format!("failed to parse backend response: {e}")))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::generation("no choices in backend response"))?;

        Ok(choice.message.content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
