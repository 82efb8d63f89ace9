//! OpenAI-compatible chat completions backend for narrative summaries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nfex_core::error::SummaryError;
use nfex_core::models::config::SummaryConfig;
use nfex_core::summary::{NarrativeSummarizer, SummaryPrompt};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// `/chat/completions` client (Groq by default).
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl ChatCompletionsClient {
    /// Build the client, reading the API key from the configured env var.
    pub fn from_config(config: &SummaryConfig) -> Result<Self, SummaryError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SummaryError::NotConfigured(format!("{} env var is not set", config.api_key_env))
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummaryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl NarrativeSummarizer for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &SummaryPrompt) -> Result<String, SummaryError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "sending chat completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummaryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat completion request rejected");
            return Err(SummaryError::Request(format!("API error {status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::Request(format!("unreadable response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(SummaryError::EmptyResponse)
    }
}
