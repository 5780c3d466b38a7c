//! `AgentRun`: runtime state for one actively executing agent (spec §3, §4.3).

use std::collections::HashMap;

use gcluster_core::IterationResult;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::queue::DropOldestQueue;

const STEERING_QUEUE_CAPACITY: usize = 32;
const METHOD_UPDATE_QUEUE_CAPACITY: usize = 4;

/// One steering message awaiting delivery to the next loop iteration.
pub type SteerMessage = String;

/// A pending base-body replacement: `(method_name, new_body)`.
pub type MethodUpdate = (String, String);

pub struct AgentRun {
    pub revision: String,
    pub started_at_ms: u64,
    pub cancel: CancellationToken,
    pub steering: DropOldestQueue<SteerMessage>,
    pub method_updates: DropOldestQueue<MethodUpdate>,
    pub loop_method: Option<String>,
    current_body: Mutex<Option<String>>,
    iterations: Mutex<Vec<IterationResult>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRun {
    pub fn new(
        revision: impl Into<String>,
        started_at_ms: u64,
        cancel: CancellationToken,
        loop_method: Option<String>,
        methods: &HashMap<String, String>,
    ) -> Self {
        let current_body = loop_method.as_ref().and_then(|m| methods.get(m)).cloned();
        Self {
            revision: revision.into(),
            started_at_ms,
            cancel,
            steering: DropOldestQueue::new(STEERING_QUEUE_CAPACITY),
            method_updates: DropOldestQueue::new(METHOD_UPDATE_QUEUE_CAPACITY),
            loop_method,
            current_body: Mutex::new(current_body),
            iterations: Mutex::new(Vec::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn set_handle(&self, handle: JoinHandle<()>) {
        *self.handle.lock() = Some(handle);
    }

    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn current_body(&self) -> Option<String> {
        self.current_body.lock().clone()
    }

    pub fn set_current_body(&self, body: String) {
        *self.current_body.lock() = Some(body);
    }

    pub fn push_iteration(&self, result: IterationResult) {
        self.iterations.lock().push(result);
    }

    pub fn iterations_snapshot(&self, cap: usize) -> Vec<IterationResult> {
        let iterations = self.iterations.lock();
        let start = iterations.len().saturating_sub(cap);
        iterations[start..].to_vec()
    }

    pub fn next_iteration_number(&self) -> u64 {
        self.iterations.lock().len() as u64 + 1
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
