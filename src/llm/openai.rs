use super::client::{
    ensure_success, http_client, GenerationParams, ModelBackend, ModelReply, ModelRequest,
    TokenUsage,
};
use crate::types::{AppError, Message, MessageRole, Result, ToolCall};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// OpenAI-compatible `/chat/completions` backend.
pub struct OpenAIBackend {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    params: GenerationParams,
}

impl OpenAIBackend {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        params: GenerationParams,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            api_base,
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
            convert_message(message, &mut messages);
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        });

        if !request.tools.is_empty() {
            body["tools"] = request
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
        }
        body
    }
}

fn convert_message(message: &Message, out: &mut Vec<Value>) {
    match message.role {
        MessageRole::User => out.push(json!({ "role": "user", "content": message.content })),
        MessageRole::Model => {
            let mut entry = json!({ "role": "assistant", "content": message.content });
            if !message.tool_calls.is_empty() {
                entry["tool_calls"] = message
                    .tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            out.push(entry);
        }
        MessageRole::CapabilityResult => {
            for result in &message.tool_results {
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": result.tool_call_id,
                    "content": result.content,
                }));
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChoiceToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChoiceToolCall {
    #[serde(default)]
    id: String,
    function: ChoiceFunction,
}

#[derive(Debug, Deserialize)]
struct ChoiceFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn parse_completion(completion: ChatCompletion) -> Result<ModelReply> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Backend("no choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            // Unparseable argument strings are passed through so coercion can report them.
            arguments: if c.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&c.function.arguments)
                    .unwrap_or(Value::String(c.function.arguments))
            },
        })
        .collect();

    Ok(ModelReply {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        usage: completion.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

#[async_trait]
impl ModelBackend for OpenAIBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(&request))
            .send()
            .await?;
        let completion: ChatCompletion = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse completion: {}", e)))?;
        parse_completion(completion)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
