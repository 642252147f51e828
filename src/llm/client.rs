//! Model backend abstraction and provider selection
//!
//! Every hosted model API is reached through the [`ModelBackend`] trait:
//! - **Gemini**: Google AI Studio `generateContent`
//! - **Vertex**: the same wire format behind a Vertex AI project endpoint
//! - **OpenAI**: any OpenAI-compatible chat-completions endpoint
//! - **Ollama**: a local Ollama server

use crate::types::{Message, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a backend needs to produce the next model turn.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// Fixed for the lifetime of a session.
    pub system_instruction: &'a str,
    /// Full conversation so far, ending with the newest input.
    pub history: &'a [Message],
    /// Declared capability schemas.
    pub tools: &'a [ToolDefinition],
}

/// Token usage reported by a backend, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A single model turn as returned by a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    /// The text content of the response
    pub content: String,
    /// Capability calls requested by the model, in emission order
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped, as reported by the backend
    pub finish_reason: String,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: None,
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: None,
        }
    }
}

/// Generic model backend trait for provider abstraction
///
/// Implementations translate the neutral history into their wire format and
/// return the model's raw reply. Transport, authentication, quota and decode
/// failures are reported as [`AppError::Backend`](crate::types::AppError::Backend).
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Produce the next model turn.
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Short provider label used in logs.
    fn provider_name(&self) -> &'static str;
}

/// Generation parameters shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

/// Provider enum for runtime selection
///
/// Built from configuration with secrets already resolved; constructing a
/// backend never reads the process environment.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Google AI Studio Gemini API
    Gemini {
        api_key: String,
        base_url: String,
        model: String,
        params: GenerationParams,
    },

    /// Vertex AI endpoint for Gemini models
    Vertex {
        project: String,
        location: String,
        access_token: String,
        model: String,
        params: GenerationParams,
    },

    /// OpenAI API provider (including compatible APIs)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: GenerationParams,
    },

    /// Ollama local LLM provider
    Ollama {
        base_url: String,
        model: String,
        params: GenerationParams,
    },
}

impl Provider {
    /// Create a backend instance for this provider
    pub fn create_backend(&self) -> Result<Arc<dyn ModelBackend>> {
        Ok(match self {
            Provider::Gemini {
                api_key,
                base_url,
                model,
                params,
            } => Arc::new(super::gemini::GeminiBackend::new(
                super::gemini::GeminiEndpoint::Studio {
                    api_key: api_key.clone(),
                    base_url: base_url.clone(),
                },
                model.clone(),
                *params,
            )?),
            Provider::Vertex {
                project,
                location,
                access_token,
                model,
                params,
            } => Arc::new(super::gemini::GeminiBackend::new(
                super::gemini::GeminiEndpoint::Vertex {
                    project: project.clone(),
                    location: location.clone(),
                    access_token: access_token.clone(),
                },
                model.clone(),
                *params,
            )?),
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Arc::new(super::openai::OpenAIBackend::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *params,
            )?),
            Provider::Ollama {
                base_url,
                model,
                params,
            } => Arc::new(super::ollama::OllamaBackend::new(
                base_url.clone(),
                model.clone(),
                *params,
            )?),
        })
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Gemini",
            Provider::Vertex { .. } => "Vertex",
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini { model, .. }
            | Provider::Vertex { model, .. }
            | Provider::OpenAI { model, .. }
            | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Shared HTTP client construction for the reqwest-based backends.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| crate::types::AppError::Configuration(format!("HTTP client: {}", e)))
}

/// Turn a non-success HTTP status into a backend error carrying the body.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(crate::types::AppError::Backend(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body.trim()
    )))
}
