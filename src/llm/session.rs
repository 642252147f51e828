//! Stateful conversation with a model backend.
//!
//! A [`ModelSession`] owns one history. [`ModelSession::send_turn`] appends the
//! input and the model's reply only when the backend call succeeds, so a failed
//! turn leaves the history exactly as it was.

use crate::llm::client::{ModelBackend, ModelRequest, TokenUsage};
use crate::types::{Message, MessageRole, Result, ToolCall, ToolDefinition, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Whether history survives across queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// One long-lived conversation per agent instance.
    #[default]
    Persistent,
    /// Every query starts from an empty history.
    SingleTurn,
}

/// Input for one model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    Text(String),
    CapabilityResults(Vec<ToolResult>),
}

impl TurnInput {
    fn into_message(self) -> Message {
        match self {
            TurnInput::Text(text) => Message::user(text),
            TurnInput::CapabilityResults(results) => Message::capability_results(results),
        }
    }
}

/// What the model did with a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    FinalAnswer(String),
    CapabilityRequests(Vec<ToolCall>),
}

pub struct ModelSession {
    backend: Arc<dyn ModelBackend>,
    system_instruction: String,
    tools: Vec<ToolDefinition>,
    history: Vec<Message>,
    usage: TokenUsage,
}

impl ModelSession {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        system_instruction: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            backend,
            system_instruction: system_instruction.into(),
            tools,
            history: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// Send one turn and classify the reply.
    pub async fn send_turn(&mut self, input: TurnInput) -> Result<Outcome> {
        self.history.push(input.into_message());

        let request = ModelRequest {
            system_instruction: &self.system_instruction,
            history: &self.history,
            tools: &self.tools,
        };
        let result = self.backend.generate(request).await;
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                self.history.pop();
                return Err(e);
            }
        };

        if let Some(usage) = reply.usage {
            self.usage.prompt_tokens += usage.prompt_tokens;
            self.usage.completion_tokens += usage.completion_tokens;
        }

        let turn = self.history.len();
        let calls: Vec<ToolCall> = reply
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{}_{}", turn, i);
                }
                call
            })
            .collect();

        debug!(
            backend = self.backend.provider_name(),
            model = self.backend.model_name(),
            finish_reason = %reply.finish_reason,
            calls = calls.len(),
            "Model turn completed"
        );

        self.history.push(Message::model(&reply.content, calls.clone()));

        if calls.is_empty() {
            Ok(Outcome::FinalAnswer(reply.content))
        } else {
            Ok(Outcome::CapabilityRequests(calls))
        }
    }

    /// Calls from the newest model turn that have no results yet.
    pub fn pending_calls(&self) -> &[ToolCall] {
        match self.history.last() {
            Some(last) if last.role == MessageRole::Model => &last.tool_calls,
            _ => &[],
        }
    }

    /// Record results for pending calls without asking the model for another turn.
    pub fn settle(&mut self, results: Vec<ToolResult>) {
        if !results.is_empty() {
            self.history.push(Message::capability_results(results));
        }
    }

    /// Most recent non-empty model text at or after history index `since`.
    pub fn last_model_text(&self, since: usize) -> Option<&str> {
        self.history[since.min(self.history.len())..]
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::Model)
            .map(|m| m.content.trim())
            .find(|text| !text.is_empty())
    }

    /// Start a new conversation with the same backend, instruction and tools.
    pub fn reset(&mut self) {
        self.history = Vec::new();
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::ModelReply;
    use crate::types::AppError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    struct Scripted {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for Scripted {
        async fn generate(&self, _request: ModelRequest<'_>) -> Result<ModelReply> {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::text("")))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: String::new(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn test_final_answer_appends_input_and_reply() {
        let mut session = ModelSession::new(
            Scripted::new(vec![Ok(ModelReply::text("hello"))]),
            "be brief",
            vec![],
        );
        let outcome = session
            .send_turn(TurnInput::Text("hi".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::FinalAnswer("hello".to_string()));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, MessageRole::User);
        assert_eq!(session.history()[1].role, MessageRole::Model);
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_appended() {
        let mut session = ModelSession::new(
            Scripted::new(vec![
                Ok(ModelReply::text("first")),
                Err(AppError::Backend("quota".to_string())),
            ]),
            "",
            vec![],
        );
        session
            .send_turn(TurnInput::Text("one".to_string()))
            .await
            .unwrap();
        let before = session.history().to_vec();

        let err = session
            .send_turn(TurnInput::Text("two".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
        assert_eq!(session.history(), before.as_slice());
    }

    #[tokio::test]
    async fn test_capability_requests_get_ids_and_stay_pending() {
        let mut session = ModelSession::new(
            Scripted::new(vec![Ok(ModelReply::calls(vec![call("a"), call("b")]))]),
            "",
            vec![],
        );
        let outcome = session
            .send_turn(TurnInput::Text("go".to_string()))
            .await
            .unwrap();

        let Outcome::CapabilityRequests(calls) = outcome else {
            panic!("expected capability requests");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "a");
        assert!(!calls[0].id.is_empty());
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(session.pending_calls().len(), 2);

        session.settle(vec![ToolResult {
            tool_call_id: calls[0].id.clone(),
            name: "a".to_string(),
            content: "ok".to_string(),
        }]);
        assert!(session.pending_calls().is_empty());
    }

    #[tokio::test]
    async fn test_last_model_text_skips_empty_turns() {
        let mut first = ModelReply::calls(vec![call("a")]);
        first.content = "Looking that up.".to_string();
        let mut session = ModelSession::new(
            Scripted::new(vec![Ok(first), Ok(ModelReply::calls(vec![call("b")]))]),
            "",
            vec![],
        );
        session
            .send_turn(TurnInput::Text("q".to_string()))
            .await
            .unwrap();
        session
            .send_turn(TurnInput::CapabilityResults(vec![]))
            .await
            .unwrap();

        assert_eq!(session.last_model_text(0), Some("Looking that up."));
        assert_eq!(session.last_model_text(2), None);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let mut session = ModelSession::new(
            Scripted::new(vec![Ok(ModelReply::text("x"))]),
            "",
            vec![],
        );
        session
            .send_turn(TurnInput::Text("q".to_string()))
            .await
            .unwrap();
        session.reset();
        assert!(session.history().is_empty());
        assert_eq!(session.last_model_text(0), None);
    }
}
