//! Atomic save/load of declarative cluster state (spec §4.2).

use std::path::{Path, PathBuf};

use gcluster_core::{ClusterObject, RunState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error writing {path:?}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
    #[error("io error renaming {from:?} to {to:?}: {source}")]
    Rename { from: PathBuf, to: PathBuf, #[source] source: std::io::Error },
    #[error("io error creating parent directory for {path:?}: {source}")]
    CreateDir { path: PathBuf, #[source] source: std::io::Error },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    objects: Vec<ClusterObject>,
}

/// Write `objects` to `path` atomically: serialize to `path.tmp`, then
/// rename over `path`. A reader of `path` therefore never observes a
/// partial write — either the previous contents, or the new ones.
pub fn save_state(objects: &[ClusterObject], path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| PersistError::CreateDir { path: parent.to_path_buf(), source })?;
    }

    let tmp_path = tmp_path_for(path);
    let file = StateFile { objects: objects.to_vec() };
    let json = serde_json::to_string_pretty(&file).unwrap_or_else(|_| "{\"objects\":[]}".to_string());
    std::fs::write(&tmp_path, json)
        .map_err(|source| PersistError::Write { path: tmp_path.clone(), source })?;
    std::fs::rename(&tmp_path, path)
        .map_err(|source| PersistError::Rename { from: tmp_path, to: path.to_path_buf(), source })?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn corrupt_path_for(path: &Path) -> PathBuf {
    let mut corrupt = path.as_os_str().to_owned();
    corrupt.push(".corrupt");
    PathBuf::from(corrupt)
}

/// Load declarative state from `path`.
///
/// - Absent file: returns an empty list (fresh start), no error.
/// - Present but unreadable/invalid JSON: the file is renamed to
///   `path.corrupt`, a warning is logged, and an empty list is returned
///   (fresh start) rather than failing.
/// - Present and valid: all objects are returned with `state` forced to
///   `Pending` (run state is never persisted, per spec §4.2).
pub fn load_state(path: &Path) -> Vec<ClusterObject> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file unreadable, quarantining");
            quarantine(path);
            return Vec::new();
        }
    };

    match serde_json::from_str::<StateFile>(&contents) {
        Ok(mut file) => {
            for obj in &mut file.objects {
                obj.state = RunState::Pending;
            }
            file.objects
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "state file is not valid JSON, quarantining");
            quarantine(path);
            Vec::new()
        }
    }
}

fn quarantine(path: &Path) {
    let corrupt = corrupt_path_for(path);
    if let Err(e) = std::fs::rename(path, &corrupt) {
        tracing::error!(path = %path.display(), corrupt = %corrupt.display(), error = %e, "failed to quarantine corrupt state file");
    }
}

#[cfg(test)]
#[path = "persistor_tests.rs"]
mod tests;
