use super::*;
use crate::agent_call::fake::FakeAgentCall;
use gcluster_core::{RunState, SystemClock};
use parking_lot::Mutex as PMutex;
use std::collections::HashMap as Map;
use std::time::Duration;

struct FakeStoreSink {
    states: PMutex<Map<String, RunState>>,
}

impl FakeStoreSink {
    fn new(names: &[&str]) -> Arc<Self> {
        let states = names.iter().map(|n| (n.to_string(), RunState::Pending)).collect();
        Arc::new(Self { states: PMutex::new(states) })
    }

    fn state_of(&self, name: &str) -> Option<RunState> {
        self.states.lock().get(name).copied()
    }
}

impl RunStateSink for FakeStoreSink {
    fn set_running(&self, name: &str) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(name) {
            Some(s) => {
                *s = RunState::Running;
                true
            }
            None => false,
        }
    }

    fn set_pending(&self, name: &str) {
        if let Some(s) = self.states.lock().get_mut(name) {
            *s = RunState::Pending;
        }
    }

    fn set_stopped(&self, name: &str) {
        if let Some(s) = self.states.lock().get_mut(name) {
            *s = RunState::Stopped;
        }
    }

    fn pending_agents(&self) -> Vec<String> {
        self.states.lock().iter().filter(|(_, s)| **s == RunState::Pending).map(|(n, _)| n.clone()).collect()
    }

    fn agent_exists(&self, name: &str) -> bool {
        self.states.lock().contains_key(name)
    }

    fn current_revision(&self, name: &str) -> Option<String> {
        self.states.lock().contains_key(name).then(|| format!("{name}-rev"))
    }
}

fn methods(pairs: &[(&str, &str)]) -> Map<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn test_executor(sink: Arc<FakeStoreSink>) -> Executor {
    let call: Arc<dyn AgentCall> = Arc::new(FakeAgentCall::new());
    let clock: ClockHandle = Arc::new(SystemClock);
    Executor::new(call, sink, clock)
}

#[tokio::test]
async fn start_on_unknown_agent_errors() {
    let sink = FakeStoreSink::new(&[]);
    let executor = test_executor(sink);
    let err = executor.start("ghost", methods(&[])).unwrap_err();
    assert!(matches!(err, EngineError::AgentNotFound(name) if name == "ghost"));
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(Arc::clone(&sink));
    executor.start("builder", methods(&[("default", "body")])).unwrap();
    assert!(executor.is_running("builder"));
    executor.start("builder", methods(&[("default", "body")])).unwrap();
    assert_eq!(executor.running_agents(), vec!["builder".to_string()]);
    executor.stop_all(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn start_transitions_store_to_running() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(Arc::clone(&sink));
    executor.start("builder", methods(&[("default", "body")])).unwrap();
    assert_eq!(sink.state_of("builder"), Some(RunState::Running));
    executor.stop_all(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn start_with_missing_pipeline_method_reverts_to_pending() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(Arc::clone(&sink));
    executor.set_pipeline(
        "builder",
        PipelineDef { initial_input: None, steps: vec![Step::r#loop("work", "work")] },
    );
    let err = executor.start("builder", methods(&[("other", "body")])).unwrap_err();
    assert!(matches!(err, EngineError::MissingMethod { .. }));
    assert_eq!(sink.state_of("builder"), Some(RunState::Pending));
    assert!(!executor.is_running("builder"));
}

#[tokio::test]
async fn stop_before_start_errors_not_running() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(sink);
    let err = executor.stop("builder", Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning(name) if name == "builder"));
}

#[tokio::test]
async fn stop_is_idempotent_second_call_errors() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(Arc::clone(&sink));
    executor.start("builder", methods(&[("default", "body")])).unwrap();
    executor.stop("builder", Duration::from_millis(200)).await.unwrap();
    assert_eq!(sink.state_of("builder"), Some(RunState::Stopped));
    let err = executor.stop("builder", Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning(_)));
}

#[tokio::test]
async fn start_pending_skips_agents_without_supplied_methods() {
    let sink = FakeStoreSink::new(&["builder", "tester"]);
    let executor = test_executor(Arc::clone(&sink));
    let mut all_methods = Map::new();
    all_methods.insert("builder".to_string(), methods(&[("default", "b")]));
    executor.start_pending(&all_methods);

    assert!(executor.is_running("builder"));
    assert!(!executor.is_running("tester"));
    executor.stop_all(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn inject_message_on_unknown_agent_is_logged_and_returns_false() {
    let sink = FakeStoreSink::new(&["builder"]);
    let executor = test_executor(sink);
    assert!(!executor.inject_message("builder", "hi"));
}

#[tokio::test]
async fn snapshot_exposes_every_running_agent() {
    let sink = FakeStoreSink::new(&["builder", "tester"]);
    let executor = test_executor(Arc::clone(&sink));
    executor.start("builder", methods(&[("default", "b")])).unwrap();
    executor.start("tester", methods(&[("default", "t")])).unwrap();

    let snapshot = executor.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.contains_key("builder"));
    assert!(snapshot.contains_key("tester"));
    executor.stop_all(Duration::from_millis(200)).await;
}
