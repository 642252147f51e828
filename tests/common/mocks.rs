//! Mock implementations for testing.
//!
//! Scripted model backends and stub capabilities shared by the integration
//! tests, so no test talks to a real model.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use treg::llm::{ModelBackend, ModelReply, ModelRequest};
use treg::tools::{Capability, FunctionSpec};
use treg::types::{AppError, Message, MessageRole, Result, ToolCall};

/// A capability call with an empty id; the session assigns one.
pub fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: String::new(),
        name: name.to_string(),
        arguments,
    }
}

/// Model backend that replays a fixed script of replies and records every
/// history it was sent.
///
/// When the script runs out it answers with `fallback`.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    system_instructions: Mutex<Vec<String>>,
    tool_names: Mutex<Vec<Vec<String>>>,
    fallback: String,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            system_instructions: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
            fallback: "done".to_string(),
        })
    }

    /// Script of plain successful replies.
    pub fn replies(replies: Vec<ModelReply>) -> Arc<Self> {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The history sent on the `n`th call.
    pub fn request(&self, n: usize) -> Vec<Message> {
        self.requests.lock()[n].clone()
    }

    pub fn last_request(&self) -> Vec<Message> {
        self.requests
            .lock()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn system_instruction(&self, n: usize) -> String {
        self.system_instructions.lock()[n].clone()
    }

    pub fn tool_names(&self, n: usize) -> Vec<String> {
        self.tool_names.lock()[n].clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        self.requests.lock().push(request.history.to_vec());
        self.system_instructions
            .lock()
            .push(request.system_instruction.to_string());
        self.tool_names
            .lock()
            .push(request.tools.iter().map(|t| t.name.clone()).collect());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelReply::text(self.fallback.clone())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Always answers with the same text.
pub struct AlwaysFinal(pub &'static str);

#[async_trait]
impl ModelBackend for AlwaysFinal {
    async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply> {
        Ok(ModelReply::text(self.0))
    }

    fn model_name(&self) -> &str {
        "always-final"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Requests the same capability on every turn and never answers.
pub struct AlwaysCalls {
    pub capability: String,
    pub arguments: Value,
    pub calls: AtomicUsize,
}

impl AlwaysCalls {
    pub fn new(capability: &str, arguments: Value) -> Arc<Self> {
        Arc::new(Self {
            capability: capability.to_string(),
            arguments,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for AlwaysCalls {
    async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelReply::calls(vec![call(
            &self.capability,
            self.arguments.clone(),
        )]))
    }

    fn model_name(&self) -> &str {
        "always-calls"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Fails every call with a backend error.
pub struct FailingBackend(pub &'static str);

#[async_trait]
impl ModelBackend for FailingBackend {
    async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply> {
        Err(AppError::Backend(self.0.to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Requests `capability` once, then answers with the text of the last
/// capability result it received.
pub struct EchoLastResult {
    pub capability: String,
    pub param: String,
}

impl EchoLastResult {
    pub fn new(capability: &str, param: &str) -> Arc<Self> {
        Arc::new(Self {
            capability: capability.to_string(),
            param: param.to_string(),
        })
    }
}

#[async_trait]
impl ModelBackend for EchoLastResult {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply> {
        let last = request.history.last();
        match last {
            Some(message) if message.role == MessageRole::CapabilityResult => {
                let text = message
                    .tool_results
                    .iter()
                    .map(|r| r.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(ModelReply::text(text))
            }
            Some(message) => {
                let mut args = Map::new();
                args.insert(self.param.clone(), Value::String(message.content.clone()));
                Ok(ModelReply::calls(vec![call(
                    &self.capability,
                    Value::Object(args),
                )]))
            }
            None => Ok(ModelReply::text("")),
        }
    }

    fn model_name(&self) -> &str {
        "echo"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Invocation counter shared between a stub capability and the test.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// `get_weather(city: str)` answering `"Sunny in <city>"`.
pub fn weather_capability(counter: Counter) -> Capability {
    Capability::new(
        FunctionSpec::new("get_weather")
            .doc("Get the weather for a city.\n\nArgs:\n    city: City name.")
            .param::<str>("city"),
        move |args: &Map<String, Value>| {
            counter.bump();
            let city = args.get("city").and_then(Value::as_str).unwrap_or_default();
            Ok(format!("Sunny in {}", city))
        },
    )
}

/// `add(a: int, b: int)` returning the sum as text.
pub fn add_capability(counter: Counter) -> Capability {
    Capability::new(
        FunctionSpec::new("add")
            .doc("Add two integers.")
            .param::<i64>("a")
            .param::<i64>("b"),
        move |args: &Map<String, Value>| {
            counter.bump();
            let a = args.get("a").and_then(Value::as_i64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
            Ok((a + b).to_string())
        },
    )
}

/// A capability whose body always returns an error.
pub fn failing_capability(name: &str, message: &'static str) -> Capability {
    Capability::new(
        FunctionSpec::new(name).doc("Always fails."),
        move |_args: &Map<String, Value>| Err(AppError::CapabilityExecution(message.to_string())),
    )
}

/// A capability whose body panics.
pub fn panicking_capability(name: &str) -> Capability {
    Capability::new(
        FunctionSpec::new(name).doc("Always panics."),
        |_args: &Map<String, Value>| -> Result<String> { panic!("capability exploded") },
    )
}

/// A capability that sleeps longer than any test timeout.
pub fn slow_capability(name: &str, sleep: std::time::Duration) -> Capability {
    Capability::new(
        FunctionSpec::new(name).doc("Sleeps."),
        move |_args: &Map<String, Value>| {
            std::thread::sleep(sleep);
            Ok("woke up".to_string())
        },
    )
}

pub fn no_args() -> Value {
    json!({})
}
