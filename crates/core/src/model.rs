//! The declarative data model: agents, revisions, pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::canonical::content_hash;
use crate::clock::epoch_ms_to_datetime;

/// Run state of an agent, as tracked by the Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Stopped,
}

/// An immutable snapshot of one agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub definition: String,
}

/// The declarative record of one named workload.
///
/// Invariants (see spec §3): `current_id == revisions.last().id`,
/// `current_id == revisions.last().definition`'s hash, `name` is immutable,
/// `revisions` is never empty once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterObject {
    pub name: String,
    pub current_id: String,
    pub definition: String,
    pub revisions: Vec<Revision>,
    pub state: RunState,
}

impl ClusterObject {
    fn new(name: String, id: String, definition: String, created_at_ms: u64) -> Self {
        Self {
            name,
            current_id: id.clone(),
            definition: definition.clone(),
            revisions: vec![Revision { id, created_at: epoch_ms_to_datetime(created_at_ms), definition }],
            state: RunState::Pending,
        }
    }

    /// The revision currently pointed to by `current_id`. Present by
    /// invariant; returns `None` only if the invariant has been violated.
    pub fn current_revision(&self) -> Option<&Revision> {
        self.revisions.last().filter(|r| r.id == self.current_id)
    }
}

/// An incoming agent definition, as submitted by an apply client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    /// Pre-computed content hash (hex SHA-256) of `definition`. The server
    /// trusts this value; it never recomputes it from `definition` (the
    /// apply side owns canonicalization, per spec §6).
    pub id: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineDef>,
}

impl AgentDef {
    /// Build an `AgentDef` whose `id` is the content hash of `definition`,
    /// for callers (tests, tooling) that don't go through the external `.p`
    /// canonicalizer.
    pub fn with_computed_id(name: impl Into<String>, definition: impl Into<String>) -> Self {
        let definition = definition.into();
        let id = content_hash(&definition);
        Self { name: name.into(), id, definition, methods: None, pipeline: None }
    }
}

/// The structural decomposition of an agent's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_input: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl PipelineDef {
    /// Every method name referenced by this pipeline's steps.
    pub fn referenced_methods(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.method()).collect()
    }

    /// True if the last step is a loop step (the only place one may occur).
    pub fn has_loop(&self) -> bool {
        matches!(self.steps.last().map(|s| &s.kind), Some(StepKind::Loop))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Simple,
    Map,
    Loop,
}

/// One step of a pipeline.
///
/// The wire format carries `kind`-specific method-name fields
/// (`method`/`loop_method`/`map_method`) for compatibility with the `.p`
/// emitter's S-expression shape; `method()` normalizes them to one name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub label: String,
    pub kind: StepKind,
    #[serde(flatten)]
    pub method_name: StepMethodName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepMethodName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_ref: Option<String>,
}

impl Step {
    pub fn simple(label: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: StepKind::Simple,
            method_name: StepMethodName { method: Some(method.into()), ..Default::default() },
        }
    }

    pub fn map(label: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: StepKind::Map,
            method_name: StepMethodName { map_method: Some(method.into()), ..Default::default() },
        }
    }

    pub fn r#loop(label: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: StepKind::Loop,
            method_name: StepMethodName { loop_method: Some(method.into()), ..Default::default() },
        }
    }

    /// The single method name this step invokes, regardless of kind.
    pub fn method(&self) -> &str {
        self.method_name
            .method
            .as_deref()
            .or(self.method_name.loop_method.as_deref())
            .or(self.method_name.map_method.as_deref())
            .unwrap_or("")
    }
}

/// Result of one `ApplyDefinitions` call: which agents were newly created,
/// revised, or left unchanged, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Reconcile one incoming definition against an optional existing object,
/// producing the post-reconciliation object and which bucket it fell into.
///
/// Pure function so the Store (which owns locking) and tests can both use
/// it without duplicating the three-way branch.
pub fn reconcile(existing: Option<&ClusterObject>, def: &AgentDef, now_ms: u64) -> (ClusterObject, ReconcileOutcome) {
    match existing {
        None => (
            ClusterObject::new(def.name.clone(), def.id.clone(), def.definition.clone(), now_ms),
            ReconcileOutcome::Created,
        ),
        Some(obj) if obj.current_id == def.id => (obj.clone(), ReconcileOutcome::Unchanged),
        Some(obj) => {
            let mut obj = obj.clone();
            obj.revisions.push(Revision {
                id: def.id.clone(),
                created_at: epoch_ms_to_datetime(now_ms),
                definition: def.definition.clone(),
            });
            obj.current_id = def.id.clone();
            obj.definition = def.definition.clone();
            obj.state = RunState::Pending;
            (obj, ReconcileOutcome::Updated)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

/// One loop-iteration outcome. Exactly one of `output`/`error` is populated
/// on a completed iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IterationResult {
    pub fn success(iteration: u64, started_at_ms: u64, finished_at_ms: u64, output: String) -> Self {
        Self {
            iteration,
            started_at: epoch_ms_to_datetime(started_at_ms),
            finished_at: epoch_ms_to_datetime(finished_at_ms),
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(iteration: u64, started_at_ms: u64, finished_at_ms: u64, error: String) -> Self {
        Self {
            iteration,
            started_at: epoch_ms_to_datetime(started_at_ms),
            finished_at: epoch_ms_to_datetime(finished_at_ms),
            output: None,
            error: Some(error),
        }
    }
}

/// Maximum iteration history length exposed by a single snapshot (spec §4.3).
pub const SNAPSHOT_ITERATION_CAP: usize = 10;

/// A read-only summary of one actively-running agent, as returned by
/// `Executor::snapshot` and carried in `steer_state` pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub name: String,
    pub revision: String,
    pub started_at: DateTime<Utc>,
    pub iterations: Vec<IterationResult>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
