//! Gemini `generateContent` backend, served either by Google AI Studio or by Vertex AI.

use super::client::{
    ensure_success, http_client, GenerationParams, ModelBackend, ModelReply, ModelRequest,
    TokenUsage,
};
use crate::types::{AppError, Message, MessageRole, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Where requests go and how they authenticate.
#[derive(Debug, Clone)]
pub enum GeminiEndpoint {
    /// API-key authenticated Generative Language API.
    Studio { api_key: String, base_url: String },
    /// Bearer-token authenticated Vertex AI publisher model.
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: GeminiEndpoint,
    model: String,
    params: GenerationParams,
}

impl GeminiBackend {
    pub fn new(endpoint: GeminiEndpoint, model: String, params: GenerationParams) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint,
            model,
            params,
        })
    }

    pub fn url(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        match &self.endpoint {
            GeminiEndpoint::Studio { base_url, .. } => format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            GeminiEndpoint::Vertex {
                project, location, ..
            } => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            ),
        }
    }

    pub fn build_request_body(&self, request: &ModelRequest<'_>) -> Value {
        let mut body = json!({
            "contents": convert_history(request.history),
            "generationConfig": {
                "temperature": self.params.temperature,
                "maxOutputTokens": self.params.max_tokens,
            },
        });

        if !request.system_instruction.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": request.system_instruction }]
            });
        }

        if !request.tools.is_empty() {
            body["tools"] = json!([{
                "functionDeclarations": request
                    .tools
                    .iter()
                    .map(function_declaration)
                    .collect::<Vec<_>>()
            }]);
        }

        body
    }
}

fn function_declaration(tool: &ToolDefinition) -> Value {
    let mut declaration = json!({
        "name": tool.name,
        "description": tool.description,
    });
    let has_properties = tool
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    if has_properties {
        let mut parameters = tool.parameters.clone();
        let no_required = parameters
            .get("required")
            .and_then(Value::as_array)
            .is_some_and(|r| r.is_empty());
        if no_required {
            if let Some(obj) = parameters.as_object_mut() {
                obj.remove("required");
            }
        }
        declaration["parameters"] = parameters;
    }
    declaration
}

fn convert_history(history: &[Message]) -> Vec<Value> {
    let mut contents = Vec::with_capacity(history.len());
    for message in history {
        match message.role {
            MessageRole::User => contents.push(json!({
                "role": "user",
                "parts": [{ "text": message.content }]
            })),
            MessageRole::Model => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({ "text": message.content }));
                }
                for call in &message.tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
            MessageRole::CapabilityResult => {
                let parts: Vec<Value> = message
                    .tool_results
                    .iter()
                    .map(|r| {
                        json!({
                            "functionResponse": {
                                "name": r.name,
                                "response": { "result": r.content }
                            }
                        })
                    })
                    .collect();
                if !parts.is_empty() {
                    contents.push(json!({ "role": "user", "parts": parts }));
                }
            }
        }
    }
    contents
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn parse_response(response: GenerateContentResponse) -> Result<ModelReply> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {}", r))
            .unwrap_or_else(|| "no candidates in response".to_string());
        return Err(AppError::Backend(reason));
    };

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            texts.push(text);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: call.id.unwrap_or_default(),
                name: call.name,
                arguments: call.args.unwrap_or_else(|| json!({})),
            });
        }
    }

    Ok(ModelReply {
        content: texts.join("\n"),
        tool_calls,
        finish_reason: candidate
            .finish_reason
            .unwrap_or_else(|| "STOP".to_string()),
        usage: response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
        }),
    })
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let body = self.build_request_body(&request);
        let builder = self.client.post(self.url()).json(&body);
        let builder = match &self.endpoint {
            GeminiEndpoint::Studio { api_key, .. } => builder.header("x-goog-api-key", api_key),
            GeminiEndpoint::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

        let response = ensure_success(builder.send().await?).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse Gemini response: {}", e)))?;
        parse_response(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        match self.endpoint {
            GeminiEndpoint::Studio { .. } => "gemini",
            GeminiEndpoint::Vertex { .. } => "vertex",
        }
    }
}
