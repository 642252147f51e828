use serde::{Deserialize, Serialize};

// ============= Query Types =============

/// One executed capability request, in the order the model emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub capability_name: String,
    pub arguments: serde_json::Value,
    pub result: String,
}

/// Answer record returned by every agent query.
///
/// `steps` is always present. It is empty when the model answered directly or when
/// the query ended in a backend error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub steps: Vec<TraceStep>,
}

impl QueryResponse {
    pub fn new(answer: impl Into<String>, steps: Vec<TraceStep>) -> Self {
        Self {
            answer: answer.into(),
            steps,
        }
    }

    /// The user-visible record for a query aborted by the model backend.
    pub fn backend_failure(err: &AppError) -> Self {
        let message = match err {
            AppError::Backend(msg) => msg.clone(),
            other => other.to_string(),
        };
        Self {
            answer: format!("Error processing request: {}", message),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub steps: Vec<TraceStep>,
    pub session_id: String,
}

// ============= Conversation Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Model,
    CapabilityResult,
}

/// A single entry of a session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    /// Free text (user input or model text). Empty for pure result messages.
    pub content: String,
    /// Capability calls requested by the model (only for `Model`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Capability results, in request order (only for `CapabilityResult`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    pub fn model(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Model,
            content: content.into(),
            tool_calls,
            tool_results: Vec::new(),
        }
    }

    pub fn capability_results(tool_results: Vec<ToolResult>) -> Self {
        Self {
            role: MessageRole::CapabilityResult,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_results,
        }
    }
}

// ============= Tool Types =============

/// Backend-neutral capability declaration; `parameters` is a JSON-schema object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("capability failed: {0}")]
    CapabilityExecution(String),

    #[error("invalid arguments: {0}")]
    ArgumentCoercion(String),

    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Backend(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Backend(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Configuration(msg) => {
                (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            other => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                other.to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
