use super::client::{
    ensure_success, http_client, GenerationParams, ModelBackend, ModelReply, ModelRequest,
    TokenUsage,
};
use crate::types::{AppError, MessageRole, Result, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Local Ollama server reached through `/api/chat`.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    params: GenerationParams,
}

impl OllamaBackend {
    pub fn new(base_url: String, model: String, params: GenerationParams) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url,
            model,
            params,
        })
    }

    fn build_request_body(&self, request: &ModelRequest<'_>) -> Value {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if !request.system_instruction.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system_instruction }));
        }
        for message in request.history {
            match message.role {
                MessageRole::User => {
                    messages.push(json!({ "role": "user", "content": message.content }))
                }
                MessageRole::Model => {
                    let calls: Vec<Value> = message
                        .tool_calls
                        .iter()
                        .map(|c| json!({ "function": { "name": c.name, "arguments": c.arguments } }))
                        .collect();
                    let mut entry = json!({ "role": "assistant", "content": message.content });
                    if !calls.is_empty() {
                        entry["tool_calls"] = Value::Array(calls);
                    }
                    messages.push(entry);
                }
                MessageRole::CapabilityResult => {
                    for result in &message.tool_results {
                        messages.push(json!({
                            "role": "tool",
                            "tool_name": result.name,
                            "content": result.content,
                        }));
                    }
                }
            }
        }

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

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
            "options": {
                "temperature": self.params.temperature,
                "num_predict": self.params.max_tokens,
            }
        })
    }
}

fn parse_ollama_response(json: &Value) -> Result<ModelReply> {
    let message = json
        .get("message")
        .ok_or_else(|| AppError::Backend("No message in Ollama response".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            if let Some(function) = call.get("function") {
                tool_calls.push(ToolCall {
                    id: String::new(),
                    name: function
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                    arguments: function.get("arguments").cloned().unwrap_or(json!({})),
                });
            }
        }
    }

    let finish_reason = json
        .get("done_reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let reason = if tool_calls.is_empty() { "stop" } else { "tool_calls" };
            reason.to_string()
        });

    let usage = match (
        json.get("prompt_eval_count").and_then(Value::as_u64),
        json.get("eval_count").and_then(Value::as_u64),
    ) {
        (Some(prompt), Some(completion)) => Some(TokenUsage {
            prompt_tokens: prompt as u32,
            completion_tokens: completion as u32,
        }),
        _ => None,
    };

    Ok(ModelReply {
        content,
        tool_calls,
        finish_reason,
        usage,
    })
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&self.build_request_body(&request))
            .send()
            .await?;
        let body: Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse Ollama response: {}", e)))?;
        parse_ollama_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}
