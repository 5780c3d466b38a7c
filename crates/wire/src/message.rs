//! The control-socket message envelope (spec §4.4, §6).
//!
//! Wire format: one JSON object per line, `{"type": "...", "payload": {...}}`.
//! Servers and clients must tolerate unknown or extra payload fields —
//! `#[serde(deny_unknown_fields)]` is deliberately never used here.

use std::collections::HashMap;

use gcluster_core::{AgentDef, ApplySummary, ClusterObject, PipelineDef, RunSnapshot};
use serde::{Deserialize, Serialize};

/// One envelope on the control socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    ApplyRequest(ApplyRequest),
    ApplyResponse(ApplyResponse),
    SteerSubscribe(SteerSubscribe),
    SteerState(SteerState),
    SteerInject(SteerInject),
    SteerEditPrompt(SteerEditPrompt),
    ShutdownNotice(ShutdownNotice),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub agents: Vec<AgentDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub summary: ApplySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteerSubscribe {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteerState {
    pub objects: Vec<ClusterObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<HashMap<String, RunSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<HashMap<String, HashMap<String, String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<HashMap<String, PipelineDef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteerInject {
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteerEditPrompt {
    pub agent_name: String,
    pub method_name: String,
    pub new_body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownNotice {
    pub reason: String,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
