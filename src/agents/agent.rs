//! Agents and their tool-calling loop.
//!
//! An [`Agent`] binds a [`ModelSession`] to an identity and a fixed
//! [`CapabilitySet`]. [`Agent::query`] drives the loop:
//!
//! 1. Send the user text to the model
//! 2. If the model requests capabilities, run them in the order requested
//! 3. Send all results back as one turn
//! 4. Repeat until the model answers or the round budget is spent
//!
//! Capability failures of any kind (unknown name, bad arguments, errors,
//! panics, timeouts) become result strings the model can react to. Only a
//! backend failure ends a query early, and it still yields an answer record.

use crate::llm::client::ModelBackend;
use crate::llm::session::{HistoryMode, ModelSession, Outcome, TurnInput};
use crate::tools::registry::CapabilitySet;
use crate::types::{AppError, Message, QueryResponse, Result, ToolCall, ToolResult, TraceStep};
use crate::utils::sync_bridge::run_sync;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Answer used when the model finishes with no text at all.
pub const NO_RESPONSE: &str = "No response generated.";

/// Who an agent is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub description: String,
    pub system_instruction: String,
}

impl AgentIdentity {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_instruction: system_instruction.into(),
        }
    }
}

/// Configuration for the tool-calling loop of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Maximum number of capability rounds per query. A round executes every
    /// request of one model turn.
    pub max_capability_rounds: usize,

    /// Wall-clock limit for a single capability invocation.
    pub capability_timeout: Duration,

    /// Whether the session history carries over between queries.
    pub history_mode: HistoryMode,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_capability_rounds: 5,
            capability_timeout: Duration::from_secs(120),
            history_mode: HistoryMode::Persistent,
        }
    }
}

/// Reason why a query ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    /// Model produced a final answer.
    Stop,
    /// The capability round budget ran out.
    BudgetExhausted,
    /// The model backend failed.
    BackendError(String),
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::BudgetExhausted => write!(f, "budget_exhausted"),
            FinishReason::BackendError(e) => write!(f, "backend_error: {}", e),
        }
    }
}

/// Full result of one run of the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopResult {
    pub response: QueryResponse,
    pub finish_reason: FinishReason,
    /// Capability rounds executed.
    pub rounds: usize,
}

pub struct Agent {
    identity: AgentIdentity,
    capabilities: CapabilitySet,
    config: LoopConfig,
    session: Mutex<ModelSession>,
}

impl Agent {
    pub fn new(
        identity: AgentIdentity,
        backend: Arc<dyn ModelBackend>,
        capabilities: CapabilitySet,
        config: LoopConfig,
    ) -> Self {
        let session = ModelSession::new(
            backend,
            identity.system_instruction.clone(),
            capabilities.definitions(),
        );
        Self {
            identity,
            capabilities,
            config,
            session: Mutex::new(session),
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Snapshot of the session history.
    pub async fn history(&self) -> Vec<Message> {
        self.session.lock().await.history().to_vec()
    }

    /// Answer a question. Never fails: backend errors become an error answer.
    ///
    /// `session_id` is recorded for tracing; one agent instance serves one
    /// conversation. Concurrent calls on the same agent are serialised.
    pub async fn query(&self, question: &str, session_id: Option<&str>) -> QueryResponse {
        info!(
            agent = %self.identity.name,
            session_id = session_id.unwrap_or("default"),
            "Handling query"
        );
        self.run(question).await.response
    }

    /// Synchronous [`query`](Self::query), usable with or without a running runtime.
    pub fn query_blocking(
        self: &Arc<Self>,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<QueryResponse> {
        let agent = Arc::clone(self);
        let question = question.to_string();
        let session_id = session_id.map(str::to_string);
        run_sync(async move { Ok(agent.query(&question, session_id.as_deref()).await) })
    }

    /// Run the tool-calling loop for one input.
    pub async fn run(&self, input: &str) -> LoopResult {
        let mut session = self.session.lock().await;
        if self.config.history_mode == HistoryMode::SingleTurn {
            session.reset();
        }
        let query_start = session.history().len();
        let started = Instant::now();

        let mut steps: Vec<TraceStep> = Vec::new();
        let mut rounds = 0;
        let mut turn = TurnInput::Text(input.to_string());

        loop {
            let in_flight = match &turn {
                TurnInput::CapabilityResults(results) => results.clone(),
                TurnInput::Text(_) => Vec::new(),
            };

            let outcome = match session.send_turn(turn).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(agent = %self.identity.name, error = %e, rounds, "Model backend failed");
                    // Results that never reached the model still answer the pending calls.
                    session.settle(in_flight);
                    return LoopResult {
                        response: QueryResponse::backend_failure(&e),
                        finish_reason: FinishReason::BackendError(e.to_string()),
                        rounds,
                    };
                }
            };

            let calls = match outcome {
                Outcome::FinalAnswer(text) => {
                    let answer = if text.trim().is_empty() {
                        NO_RESPONSE.to_string()
                    } else {
                        text
                    };
                    info!(
                        agent = %self.identity.name,
                        rounds,
                        steps = steps.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Query finished"
                    );
                    return LoopResult {
                        response: QueryResponse::new(answer, steps),
                        finish_reason: FinishReason::Stop,
                        rounds,
                    };
                }
                Outcome::CapabilityRequests(calls) => calls,
            };

            if rounds >= self.config.max_capability_rounds {
                warn!(
                    agent = %self.identity.name,
                    rounds,
                    "Capability round budget exhausted"
                );
                let unanswered = calls
                    .into_iter()
                    .map(|call| ToolResult {
                        tool_call_id: call.id,
                        name: call.name,
                        content: "not executed: capability round budget exhausted".to_string(),
                    })
                    .collect();
                session.settle(unanswered);

                let answer = session
                    .last_model_text(query_start)
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!(
                            "Stopped after {} capability rounds without a final answer.",
                            rounds
                        )
                    });
                return LoopResult {
                    response: QueryResponse::new(answer, steps),
                    finish_reason: FinishReason::BudgetExhausted,
                    rounds,
                };
            }

            rounds += 1;
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let output = self.dispatch(&call).await;
                steps.push(TraceStep {
                    capability_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: output.clone(),
                });
                results.push(ToolResult {
                    tool_call_id: call.id,
                    name: call.name,
                    content: output,
                });
            }
            turn = TurnInput::CapabilityResults(results);
        }
    }

    /// Execute one capability request and render its outcome as text.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(capability) = self.capabilities.get(&call.name).cloned() else {
            warn!(agent = %self.identity.name, capability = %call.name, "Unknown capability requested");
            return AppError::CapabilityNotFound(call.name.clone()).to_string();
        };

        let args = call.arguments.clone();
        let task = tokio::task::spawn_blocking(move || capability.invoke(&args));
        let failure = match tokio::time::timeout(self.config.capability_timeout, task).await {
            Ok(Ok(Ok(output))) => return output,
            Ok(Ok(Err(e))) => e,
            Ok(Err(join_error)) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                AppError::CapabilityExecution(format!("{} panicked: {}", call.name, message))
            }
            Ok(Err(join_error)) => AppError::CapabilityExecution(format!(
                "{} was cancelled: {}",
                call.name, join_error
            )),
            Err(_) => AppError::CapabilityExecution(format!(
                "{} timed out after {}s",
                call.name,
                self.config.capability_timeout.as_secs()
            )),
        };

        warn!(
            agent = %self.identity.name,
            capability = %call.name,
            error = %failure,
            "Capability failed"
        );
        failure.to_string()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("capabilities", &self.capabilities.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
