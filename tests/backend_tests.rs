//! Model backends against mocked provider endpoints.

mod common;

use common::mocks::*;
use serde_json::json;
use std::sync::Arc;
use treg::agents::{Agent, AgentIdentity, LoopConfig};
use treg::llm::{GenerationParams, ModelBackend, ModelRequest, Provider};
use treg::tools::CapabilitySet;
use treg::types::{AppError, Message, ToolDefinition};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini(server: &MockServer) -> Arc<dyn ModelBackend> {
    Provider::Gemini {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        model: "gemini-test".to_string(),
        params: GenerationParams::default(),
    }
    .create_backend()
    .unwrap()
}

fn ping_tool() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "get_weather".to_string(),
        description: "Get the weather for a city.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
    }]
}

#[tokio::test]
async fn test_gemini_text_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Be brief."}]},
            "contents": [{"role": "user", "parts": [{"text": "What is FOXP3?"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A transcription factor."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = vec![Message::user("What is FOXP3?")];
    let reply = gemini(&server)
        .generate(ModelRequest {
            system_instruction: "Be brief.",
            history: &history,
            tools: &[],
        })
        .await
        .unwrap();

    assert_eq!(reply.content, "A transcription factor.");
    assert!(reply.tool_calls.is_empty());
    assert_eq!(reply.usage.unwrap().completion_tokens, 4);
}

#[tokio::test]
async fn test_gemini_function_call_and_declarations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(body_partial_json(json!({
            "tools": [{"functionDeclarations": [{"name": "get_weather"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let history = vec![Message::user("Weather in Paris?")];
    let tools = ping_tool();
    let reply = gemini(&server)
        .generate(ModelRequest {
            system_instruction: "",
            history: &history,
            tools: &tools,
        })
        .await
        .unwrap();

    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].name, "get_weather");
    assert_eq!(reply.tool_calls[0].arguments, json!({"city": "Paris"}));
}

#[tokio::test]
async fn test_gemini_http_error_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let history = vec![Message::user("hi")];
    let err = gemini(&server)
        .generate(ModelRequest {
            system_instruction: "",
            history: &history,
            tools: &[],
        })
        .await
        .unwrap_err();

    match err {
        AppError::Backend(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Weather?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 8}
        })))
        .mount(&server)
        .await;

    let backend = Provider::OpenAI {
        api_key: "sk-test".to_string(),
        api_base: server.uri(),
        model: "gpt-test".to_string(),
        params: GenerationParams::default(),
    }
    .create_backend()
    .unwrap();

    let history = vec![Message::user("Weather?")];
    let tools = ping_tool();
    let reply = backend
        .generate(ModelRequest {
            system_instruction: "Be brief.",
            history: &history,
            tools: &tools,
        })
        .await
        .unwrap();

    assert_eq!(reply.content, "");
    assert_eq!(reply.finish_reason, "tool_calls");
    assert_eq!(reply.tool_calls[0].id, "call_abc");
    assert_eq!(reply.tool_calls[0].arguments, json!({"city": "Oslo"}));
}

#[tokio::test]
async fn test_ollama_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama-test", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "Tregs suppress."},
            "done_reason": "stop",
            "done": true
        })))
        .mount(&server)
        .await;

    let backend = Provider::Ollama {
        base_url: server.uri(),
        model: "llama-test".to_string(),
        params: GenerationParams::default(),
    }
    .create_backend()
    .unwrap();

    let history = vec![Message::user("What do Tregs do?")];
    let reply = backend
        .generate(ModelRequest {
            system_instruction: "",
            history: &history,
            tools: &[],
        })
        .await
        .unwrap();

    assert_eq!(reply.content, "Tregs suppress.");
    assert_eq!(reply.finish_reason, "stop");
}

#[tokio::test]
async fn test_agent_loop_over_gemini() {
    let server = MockServer::start().await;

    // Second turn: the capability result is in the history.
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user"},
                {"role": "model", "parts": [{"functionCall": {"name": "get_weather"}}]},
                {"role": "user", "parts": [{"functionResponse": {
                    "name": "get_weather",
                    "response": {"result": "Sunny in Lima"}
                }}]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "It is sunny in Lima."}]}}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "Lima"}}}
            ]}}]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let counter = Counter::default();
    let mut capabilities = CapabilitySet::new();
    capabilities
        .register(weather_capability(counter.clone()))
        .unwrap();
    let agent = Agent::new(
        AgentIdentity::new("Weather", "weather agent", "Answer weather questions."),
        gemini(&server),
        capabilities,
        LoopConfig::default(),
    );

    let response = agent.query("Weather in Lima?", None).await;

    assert_eq!(response.answer, "It is sunny in Lima.");
    assert_eq!(response.steps.len(), 1);
    assert_eq!(response.steps[0].result, "Sunny in Lima");
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn test_agent_reports_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let agent = Agent::new(
        AgentIdentity::new("Broken", "", ""),
        gemini(&server),
        CapabilitySet::new(),
        LoopConfig::default(),
    );
    let response = agent.query("hello", None).await;

    assert!(response.answer.starts_with("Error processing request: HTTP 500"));
    assert!(response.steps.is_empty());
}
