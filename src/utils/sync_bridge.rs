//! Blocking entry point for async work.
//!
//! Capabilities are synchronous, but delegation and network-backed capabilities
//! need to drive async code to completion. [`run_sync`] does that from any
//! context:
//!
//! - No runtime on this thread: build a current-thread runtime and block on it.
//! - Inside a runtime: run the future on a dedicated OS thread with its own
//!   runtime and wait for it, so the caller's scheduler never polls (and never
//!   deadlocks on) the nested work.
//!
//! Errors from the future are returned unchanged and panics are resumed on the
//! calling thread with their original payload.

use crate::types::{AppError, Result};
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

pub fn run_sync<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        return drive(future);
    };

    let worker = std::thread::Builder::new()
        .name("sync-bridge".to_string())
        .spawn(move || drive(future))
        .map_err(|e| AppError::Internal(format!("failed to spawn bridge thread: {}", e)))?;

    // Let a multi-threaded scheduler hand this worker's other tasks to its peers
    // while we wait.
    let joined = match handle.runtime_flavor() {
        RuntimeFlavor::MultiThread => tokio::task::block_in_place(|| worker.join()),
        _ => worker.join(),
    };

    match joined {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn drive<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(format!("failed to build runtime: {}", e)))?;
    let output = runtime.block_on(future);
    // Blocking tasks abandoned by a timeout must not hold up the caller.
    runtime.shutdown_background();
    output
}
