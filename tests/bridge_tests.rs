//! Blocking entry points from synchronous and asynchronous callers.

mod common;

use common::mocks::*;
use serde_json::json;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use treg::agents::{Agent, AgentIdentity, LoopConfig};
use treg::llm::{ModelBackend, ModelReply};
use treg::tools::CapabilitySet;
use treg::types::QueryResponse;

const DEADLINE: Duration = Duration::from_secs(10);

fn weather_agent() -> Arc<Agent> {
    let backend: Arc<dyn ModelBackend> = ScriptedBackend::replies(vec![
        ModelReply::calls(vec![call("get_weather", json!({"city": "Zurich"}))]),
        ModelReply::text("Zurich is sunny."),
    ]);
    let mut set = CapabilitySet::new();
    set.register(weather_capability(Counter::default())).unwrap();
    Arc::new(Agent::new(
        AgentIdentity::new("Weather", "weather agent", ""),
        backend,
        set,
        LoopConfig::default(),
    ))
}

/// Run `f` on its own thread and fail the test if it does not finish in time.
fn within_deadline<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        tx.send(f()).ok();
    });
    rx.recv_timeout(DEADLINE).expect("blocking query deadlocked")
}

#[test]
fn test_query_blocking_outside_runtime() {
    let response = within_deadline(|| weather_agent().query_blocking("weather?", None).unwrap());
    assert_eq!(response.answer, "Zurich is sunny.");
    assert_eq!(response.steps.len(), 1);
}

/// Call `query_blocking` from a task spawned onto a runtime.
///
/// The runtime lives on the deadline thread, so a deadlock fails the test
/// instead of hanging it.
fn on_runtime_task(multi_thread: bool) -> QueryResponse {
    within_deadline(move || {
        let runtime = if multi_thread {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
        } else {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        }
        .unwrap();
        runtime.block_on(async {
            tokio::spawn(async { weather_agent().query_blocking("weather?", None).unwrap() })
                .await
                .unwrap()
        })
    })
}

#[test]
fn test_query_blocking_inside_current_thread_runtime() {
    let response = on_runtime_task(false);
    assert_eq!(response.answer, "Zurich is sunny.");
}

#[test]
fn test_query_blocking_inside_multi_thread_runtime() {
    let response = on_runtime_task(true);
    assert_eq!(response.answer, "Zurich is sunny.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_blocking_from_blocking_pool() {
    let agent = weather_agent();
    let task = tokio::task::spawn_blocking(move || agent.query_blocking("weather?", None));
    let response = tokio::time::timeout(DEADLINE, task)
        .await
        .expect("blocking query deadlocked")
        .unwrap()
        .unwrap();
    assert_eq!(response.answer, "Zurich is sunny.");
}

#[test]
fn test_sync_and_async_contexts_agree() {
    let inside = on_runtime_task(true);
    let outside = within_deadline(|| weather_agent().query_blocking("weather?", None).unwrap());
    let native = within_deadline(|| {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async { weather_agent().query("weather?", None).await })
    });

    assert_eq!(inside, outside);
    assert_eq!(inside, native);
}
