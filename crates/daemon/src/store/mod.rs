// SPDX-License-Identifier: MIT

//! Store: authoritative in-memory map of declarative agent state (spec §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use gcluster_core::{reconcile, AgentDef, ApplySummary, Clock, ClusterObject, ReconcileOutcome, RunState};
use gcluster_engine::RunStateSink;
use parking_lot::RwLock;

/// Fired once per `apply_definitions` batch, with a full snapshot of every
/// object, while the store's write lock is still held (spec §4.1: "the
/// server's implementation marshals and writes to sockets — which is safe
/// because sockets live outside the store"). Implementations must not call
/// back into the store.
pub type OnChange = Arc<dyn Fn(&[ClusterObject]) + Send + Sync>;

fn no_op_on_change() -> OnChange {
    Arc::new(|_| {})
}

/// Single reader-writer lock guarding the whole agent map (spec §4.1,
/// §5: "writers exclusive, readers concurrent; callbacks invoked under
/// the lock").
pub struct Store<C: Clock> {
    objects: RwLock<HashMap<String, ClusterObject>>,
    clock: C,
    on_change: RwLock<OnChange>,
}

impl<C: Clock> Store<C> {
    pub fn new(clock: C) -> Self {
        Self { objects: RwLock::new(HashMap::new()), clock, on_change: RwLock::new(no_op_on_change()) }
    }

    pub fn on_change(&self, f: impl Fn(&[ClusterObject]) + Send + Sync + 'static) {
        *self.on_change.write() = Arc::new(f);
    }

    /// Reconcile a batch of definitions (create/update/unchanged). Atomic
    /// over the whole batch and fires `on_change` exactly once at the end.
    pub fn apply_definitions(&self, defs: &[AgentDef]) -> ApplySummary {
        let mut summary = ApplySummary::default();
        let mut objects = self.objects.write();
        for def in defs {
            let existing = objects.get(&def.name);
            let (obj, outcome) = reconcile(existing, def, self.clock.epoch_ms());
            match outcome {
                ReconcileOutcome::Created => summary.created.push(def.name.clone()),
                ReconcileOutcome::Updated => summary.updated.push(def.name.clone()),
                ReconcileOutcome::Unchanged => summary.unchanged.push(def.name.clone()),
            }
            objects.insert(def.name.clone(), obj);
        }
        let snapshot: Vec<ClusterObject> = objects.values().cloned().collect();
        let callback = self.on_change.read().clone();
        callback(&snapshot);
        summary
    }

    pub fn get_agent(&self, name: &str) -> Option<ClusterObject> {
        self.objects.read().get(name).cloned()
    }

    pub fn list_agents(&self) -> Vec<ClusterObject> {
        self.objects.read().values().cloned().collect()
    }

    pub fn set_run_state(&self, name: &str, state: RunState) -> bool {
        match self.objects.write().get_mut(name) {
            Some(obj) => {
                obj.state = state;
                true
            }
            None => false,
        }
    }

    /// Install objects loaded from persistence, forcing run state to
    /// pending (run state is never persisted, spec §4.2).
    pub fn load_state(&self, objects: Vec<ClusterObject>) {
        let mut guard = self.objects.write();
        for mut obj in objects {
            obj.state = RunState::Pending;
            guard.insert(obj.name.clone(), obj);
        }
    }
}

impl<C: Clock> RunStateSink for Store<C> {
    fn set_running(&self, name: &str) -> bool {
        self.set_run_state(name, RunState::Running)
    }

    fn set_pending(&self, name: &str) {
        self.set_run_state(name, RunState::Pending);
    }

    fn set_stopped(&self, name: &str) {
        self.set_run_state(name, RunState::Stopped);
    }

    fn pending_agents(&self) -> Vec<String> {
        self.objects
            .read()
            .values()
            .filter(|o| o.state == RunState::Pending)
            .map(|o| o.name.clone())
            .collect()
    }

    fn agent_exists(&self, name: &str) -> bool {
        self.objects.read().contains_key(name)
    }

    fn current_revision(&self, name: &str) -> Option<String> {
        self.objects.read().get(name).map(|o| o.current_id.clone())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
