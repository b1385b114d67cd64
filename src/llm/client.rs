//! OpenAI-compatible chat-completion client.
//!
//! Works with any server exposing `/v1/chat/completions` (vLLM, llama.cpp,
//! hosted APIs). The request timeout is enforced by the HTTP client itself.

use crate::config::{EndpointConfig, GenerationConfig};
use crate::error::{NerCompareError, Result};
use crate::llm::prompts::STOP_SEQUENCES;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    min_p: f32,
    max_tokens: u32,
    presence_penalty: f32,
    stop: &'a [&'a str],
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from an LLM call including metadata.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
}

/// Chat-completion client bound to one endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: EndpointConfig,
    generation: GenerationConfig,
    timeout: Duration,
}

impl LlmClient {
    /// Create a client whose every request is bounded by `timeout_secs`.
    pub fn new(
        endpoint: EndpointConfig,
        generation: GenerationConfig,
        timeout_secs: u64,
    ) -> Result<Self> {
        Self::with_timeout(endpoint, generation, Duration::from_secs(timeout_secs))
    }

    /// Create a client with a sub-second timeout granularity.
    pub fn with_timeout(
        endpoint: EndpointConfig,
        generation: GenerationConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NerCompareError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            generation,
            timeout,
        })
    }

    /// Model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    /// Get the API endpoint URL.
    fn url(&self) -> String {
        let base = self.endpoint.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    fn transport_error(&self, err: reqwest::Error) -> NerCompareError {
        if err.is_timeout() {
            NerCompareError::Timeout(self.timeout)
        } else {
            err.into()
        }
    }

    /// Send a chat completion request.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = ChatCompletionRequest {
            model: &self.endpoint.model,
            messages,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
            top_k: self.generation.top_k,
            min_p: self.generation.min_p,
            max_tokens: self.generation.max_tokens,
            presence_penalty: self.generation.presence_penalty,
            stop: STOP_SEQUENCES,
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if !self.endpoint.api_key.is_empty() {
            builder = builder.bearer_auth(&self.endpoint.api_key);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            // Try to parse as API error
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(NerCompareError::LlmApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(NerCompareError::LlmApi(format!(
                "Request failed ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| NerCompareError::LlmParse("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
        })
    }

    /// Convenience method: single user message, content only.
    pub async fn complete(&self, user: &str) -> Result<String> {
        let response = self.chat(vec![Message::user(user)]).await?;
        Ok(response.content)
    }

    /// Test connectivity to the API.
    pub async fn test_connection(&self) -> Result<()> {
        let content = self.complete("Say 'hello' and nothing else.").await?;

        if content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(NerCompareError::LlmApi(format!(
                "Unexpected response: {}",
                content
            )))
        }
    }
}
