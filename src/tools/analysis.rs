//! Code execution for the Analyst.
//!
//! Snippets never run in-process. A [`CodeSandbox`] decides where they run;
//! [`ProcessSandbox`] starts the configured interpreter in a child process with
//! a scratch directory, a cleared environment and a wall-clock limit.

use crate::tools::registry::Capability;
use crate::tools::schema::FunctionSpec;
use crate::types::{AppError, Result};
use crate::utils::sync_bridge::run_sync;
use crate::utils::toml_config::AnalysisConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

const EXECUTE_PYTHON_CODE_DOC: &str = "\
Executes Python code and returns the output.
Useful for data analysis, calculations, or plotting.

Args:
    code: The Python code to execute.

Returns:
    The stdout captured from the execution.";

const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Captured result of one snippet run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or the timeout.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn execute(&self, code: &str) -> Result<ExecutionOutput>;
}

/// Runs snippets with a local interpreter in a child process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    interpreter: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessSandbox {
    pub fn new(interpreter: impl Into<String>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_output_bytes,
        )
    }

    fn truncate(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        if text.len() <= self.max_output_bytes {
            return text.into_owned();
        }
        let mut end = self.max_output_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}...[truncated, {} bytes total]",
            &text[..end],
            text.len()
        )
    }
}

#[async_trait]
impl CodeSandbox for ProcessSandbox {
    async fn execute(&self, code: &str) -> Result<ExecutionOutput> {
        let scratch = tempfile::tempdir()
            .map_err(|e| AppError::CapabilityExecution(format!("scratch directory: {}", e)))?;
        let script = scratch.path().join("snippet.py");
        tokio::fs::write(&script, code)
            .await
            .map_err(|e| AppError::CapabilityExecution(format!("write snippet: {}", e)))?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&script)
            .current_dir(scratch.path())
            .env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("HOME", scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            AppError::CapabilityExecution(format!("failed to start {}: {}", self.interpreter, e))
        })?;

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(
                    interpreter = %self.interpreter,
                    status = ?output.status.code(),
                    "Snippet finished"
                );
                Ok(ExecutionOutput {
                    stdout: self.truncate(&output.stdout),
                    stderr: self.truncate(&output.stderr),
                    exit_code: output.status.code(),
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(AppError::CapabilityExecution(format!(
                "failed to collect output: {}",
                e
            ))),
            // Dropping the wait future kills the child.
            Err(_) => Ok(ExecutionOutput {
                timed_out: true,
                ..ExecutionOutput::default()
            }),
        }
    }
}

/// Render an execution outcome the way the model sees it.
fn render(output: ExecutionOutput) -> String {
    if output.timed_out {
        return "Error executing code: execution timed out".to_string();
    }
    if output.success() {
        if output.stdout.trim().is_empty() {
            return "(no output)".to_string();
        }
        return output.stdout;
    }

    let status = output
        .exit_code
        .map(|c| format!("exit status {}", c))
        .unwrap_or_else(|| "terminated by signal".to_string());
    let mut rendered = format!("Error executing code: {}", status);
    if !output.stderr.trim().is_empty() {
        rendered.push('\n');
        rendered.push_str(output.stderr.trim_end());
    }
    if !output.stdout.trim().is_empty() {
        rendered.push_str("\nstdout:\n");
        rendered.push_str(output.stdout.trim_end());
    }
    rendered
}

/// `execute_python_code(code)` backed by `sandbox`.
pub fn analysis_capability(sandbox: Arc<dyn CodeSandbox>) -> Capability {
    let spec = FunctionSpec::new("execute_python_code")
        .doc(EXECUTE_PYTHON_CODE_DOC)
        .param::<str>("code");

    Capability::new(spec, move |args: &Map<String, Value>| {
        let code = args
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let sandbox = Arc::clone(&sandbox);
        match run_sync(async move { sandbox.execute(&code).await }) {
            Ok(output) => Ok(render(output)),
            Err(e) => Ok(format!("Error executing code: {}", e)),
        }
    })
}
