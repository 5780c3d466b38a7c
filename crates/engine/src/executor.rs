//! The executor: owns every actively-running agent (spec §4.3 — "the
//! hardest component").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gcluster_core::{epoch_ms_to_datetime, PipelineDef, RunSnapshot, Step, SNAPSHOT_ITERATION_CAP};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent_call::AgentCall;
use crate::clock::ClockHandle;
use crate::error::EngineError;
use crate::pipeline::{run_pipeline, OnIteration};
use crate::run::AgentRun;
use crate::store_sink::RunStateSink;

/// The method name used for the implicit single-step loop pipeline when no
/// `PipelineDef` has been cached for an agent (spec §4.3: "the single-method
/// loop path"). Decided in DESIGN.md since the spec leaves the convention
/// unstated.
const IMPLICIT_LOOP_METHOD: &str = "default";

fn no_op_on_iteration() -> OnIteration {
    Arc::new(|_, _| {})
}

pub struct Executor {
    call: Arc<dyn AgentCall>,
    store: Arc<dyn RunStateSink>,
    clock: ClockHandle,
    runs: Mutex<HashMap<String, Arc<AgentRun>>>,
    pipelines: Mutex<HashMap<String, PipelineDef>>,
    root_cancel: CancellationToken,
    on_iteration: Mutex<OnIteration>,
}

impl Executor {
    pub fn new(call: Arc<dyn AgentCall>, store: Arc<dyn RunStateSink>, clock: ClockHandle) -> Self {
        Self {
            call,
            store,
            clock,
            runs: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            root_cancel: CancellationToken::new(),
            on_iteration: Mutex::new(no_op_on_iteration()),
        }
    }

    /// Install a callback fired once per completed loop iteration, across
    /// every agent.
    pub fn on_iteration(&self, f: impl Fn(&str, &gcluster_core::IterationResult) + Send + Sync + 'static) {
        *self.on_iteration.lock() = Arc::new(f);
    }

    pub fn set_pipeline(&self, name: &str, def: PipelineDef) {
        self.pipelines.lock().insert(name.to_string(), def);
    }

    /// Start the named agent. A no-op if already running.
    pub fn start(&self, name: &str, methods: HashMap<String, String>) -> Result<(), EngineError> {
        if self.runs.lock().contains_key(name) {
            return Ok(());
        }
        if !self.store.agent_exists(name) {
            return Err(EngineError::AgentNotFound(name.to_string()));
        }

        // Transition the store without holding the executor lock: its
        // OnChange may cascade back into a snapshot of this executor.
        self.store.set_running(name);

        let mut runs = self.runs.lock();
        if runs.contains_key(name) {
            // A concurrent Start won the race; ours is a no-op.
            return Ok(());
        }

        let pipeline = self.resolve_pipeline(name);
        if let Err(e) = validate_methods(name, &pipeline, &methods) {
            drop(runs);
            self.store.set_pending(name);
            return Err(e);
        }

        let loop_method = pipeline.steps.last().and_then(|s| {
            matches!(s.kind, gcluster_core::StepKind::Loop).then(|| s.method().to_string())
        });

        let revision = self.store.current_revision(name).unwrap_or_default();
        let cancel = self.root_cancel.child_token();
        let run = Arc::new(AgentRun::new(revision, self.clock.epoch_ms(), cancel, loop_method, &methods));
        runs.insert(name.to_string(), Arc::clone(&run));
        drop(runs);

        let call = Arc::clone(&self.call);
        let clock = Arc::clone(&self.clock);
        let on_iteration = self.on_iteration.lock().clone();
        let agent_name = name.to_string();
        let run_for_task = Arc::clone(&run);
        let handle = tokio::spawn(async move {
            run_pipeline(&agent_name, &run_for_task, &pipeline, &methods, &call, &*clock, &on_iteration).await;
        });
        run.set_handle(handle);

        Ok(())
    }

    fn resolve_pipeline(&self, name: &str) -> PipelineDef {
        let cached = self.pipelines.lock().get(name).cloned();
        match cached {
            Some(def) if !def.steps.is_empty() => def,
            _ => PipelineDef {
                initial_input: None,
                steps: vec![Step::r#loop("loop", IMPLICIT_LOOP_METHOD)],
            },
        }
    }

    pub async fn stop(&self, name: &str, timeout: Duration) -> Result<(), EngineError> {
        let run = self.runs.lock().remove(name);
        let run = run.ok_or_else(|| EngineError::NotRunning(name.to_string()))?;
        run.cancel.cancel();
        let _ = tokio::time::timeout(timeout, run.join()).await;
        self.store.set_stopped(name);
        Ok(())
    }

    pub async fn stop_all(&self, timeout: Duration) {
        self.root_cancel.cancel();
        let runs: Vec<(String, Arc<AgentRun>)> = self.runs.lock().drain().collect();
        for (name, run) in runs {
            let _ = tokio::time::timeout(timeout, run.join()).await;
            self.store.set_stopped(&name);
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.runs.lock().contains_key(name)
    }

    pub fn get_run(&self, name: &str) -> Option<RunSnapshot> {
        let runs = self.runs.lock();
        let run = runs.get(name)?;
        Some(to_snapshot(name, run))
    }

    pub fn running_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> HashMap<String, RunSnapshot> {
        self.runs.lock().iter().map(|(name, run)| (name.clone(), to_snapshot(name, run))).collect()
    }

    /// Queue a one-shot steering message. Returns `false` (log-only, no
    /// error) if the agent is not running.
    pub fn inject_message(&self, name: &str, text: &str) -> bool {
        match self.runs.lock().get(name) {
            Some(run) => {
                run.steering.push(text.to_string());
                true
            }
            None => {
                tracing::warn!(agent = name, "inject_message: agent not running, dropped");
                false
            }
        }
    }

    /// Queue a permanent base-body replacement. Returns `false` if the
    /// agent is not running.
    pub fn update_method_body(&self, name: &str, method: &str, new_body: &str) -> bool {
        match self.runs.lock().get(name) {
            Some(run) => {
                run.method_updates.push((method.to_string(), new_body.to_string()));
                true
            }
            None => {
                tracing::warn!(agent = name, method, "update_method_body: agent not running, dropped");
                false
            }
        }
    }

    /// Start every currently-pending agent for which a methods map was
    /// supplied; logs and skips the rest.
    pub fn start_pending(&self, all_methods: &HashMap<String, HashMap<String, String>>) {
        for name in self.store.pending_agents() {
            match all_methods.get(&name) {
                Some(methods) => {
                    if let Err(e) = self.start(&name, methods.clone()) {
                        tracing::warn!(agent = %name, error = %e, "failed to start pending agent");
                    }
                }
                None => tracing::warn!(agent = %name, "no methods supplied for pending agent, skipping"),
            }
        }
    }
}

fn validate_methods(name: &str, pipeline: &PipelineDef, methods: &HashMap<String, String>) -> Result<(), EngineError> {
    for method in pipeline.referenced_methods() {
        if !methods.contains_key(method) {
            return Err(EngineError::MissingMethod { agent: name.to_string(), method: method.to_string() });
        }
    }
    Ok(())
}

fn to_snapshot(name: &str, run: &AgentRun) -> RunSnapshot {
    RunSnapshot {
        name: name.to_string(),
        revision: run.revision.clone(),
        started_at: epoch_ms_to_datetime(run.started_at_ms),
        iterations: run.iterations_snapshot(SNAPSHOT_ITERATION_CAP),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
