// SPDX-License-Identifier: MIT

//! Reads the apply side's input file and computes each agent's content id.
//!
//! The `.p` source parser and S-expression emitter that normally produces
//! this payload are external collaborators (spec §1) and are not
//! reimplemented here. Instead `gcluster-apply` reads a JSON document with
//! the same shape as `apply_request`'s payload; the `id` field, if present,
//! is ignored and always recomputed as the content hash of `definition` —
//! the apply side owns canonicalization (spec §6).

use std::path::Path;

use gcluster_core::AgentDef;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyFileError {
    #[error("failed to read {path:?}: {source}")]
    Read { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("invalid apply file {path:?}: {source}")]
    Parse { path: std::path::PathBuf, #[source] source: serde_json::Error },
}

#[derive(Debug, Deserialize)]
struct ApplyFile {
    agents: Vec<ApplyFileAgent>,
}

#[derive(Debug, Deserialize)]
struct ApplyFileAgent {
    name: String,
    definition: String,
    #[serde(default)]
    methods: Option<std::collections::HashMap<String, String>>,
    #[serde(default)]
    pipeline: Option<gcluster_core::PipelineDef>,
}

/// Load and parse an apply file, computing each agent's content hash.
pub fn load_apply_file(path: &Path) -> Result<Vec<AgentDef>, ApplyFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ApplyFileError::Read { path: path.to_path_buf(), source })?;
    let file: ApplyFile = serde_json::from_str(&contents)
        .map_err(|source| ApplyFileError::Parse { path: path.to_path_buf(), source })?;

    Ok(file
        .agents
        .into_iter()
        .map(|agent| {
            let mut def = AgentDef::with_computed_id(agent.name, agent.definition);
            def.methods = agent.methods;
            def.pipeline = agent.pipeline;
            def
        })
        .collect())
}

#[cfg(test)]
#[path = "apply_file_tests.rs"]
mod tests;
