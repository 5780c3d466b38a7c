// SPDX-License-Identifier: MIT

//! Master driver: wires store, persistor, executor, and server; handles
//! signals; flushes state on shutdown (spec §2, §6 CLI surface).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gcluster_core::SystemClock;
use gcluster_engine::{Executor, RunStateSink, ShellAgentCall};
use gcluster_storage::PersistError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::server::Server;
use crate::store::Store;

/// Default control-socket bind address (spec §6).
pub const DEFAULT_ADDR: &str = "127.0.0.1:43252";

/// Default persistence path suffix under `$HOME` (spec §6).
pub const DEFAULT_STATE_SUBPATH: &str = ".gcluster/state.json";

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("invalid listen address {0:?}: {1}")]
    InvalidAddr(String, std::net::AddrParseError),
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),
    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),
}

pub struct MasterConfig {
    pub addr: SocketAddr,
    pub state_path: PathBuf,
    /// The external LLM binary and its fixed arguments (spec §9: "Shell-out
    /// to an external LLM binary").
    pub agent_program: String,
    pub agent_args: Vec<String>,
    pub stop_timeout: Duration,
}

impl MasterConfig {
    /// Resolve `--addr`/`--state` overrides against the spec's defaults:
    /// CLI flag, then `GCLUSTER_ADDR`/`GCLUSTER_STATE`, then the documented
    /// default (spec §6), mirroring oj-daemon's `env::state_dir()`
    /// precedence over `OJ_STATE_DIR`/`XDG_STATE_HOME`.
    pub fn resolve(
        addr: Option<&str>,
        state: Option<PathBuf>,
        agent_program: String,
        agent_args: Vec<String>,
    ) -> Result<Self, MasterError> {
        let addr_str = addr
            .map(str::to_string)
            .or_else(|| std::env::var("GCLUSTER_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_str
            .parse()
            .map_err(|e| MasterError::InvalidAddr(addr_str.clone(), e))?;
        let state_path = state
            .or_else(|| std::env::var_os("GCLUSTER_STATE").map(PathBuf::from))
            .unwrap_or_else(default_state_path);
        Ok(Self { addr, state_path, agent_program, agent_args, stop_timeout: Duration::from_secs(5) })
    }
}

fn default_state_path() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(DEFAULT_STATE_SUBPATH)
}

/// Run the control plane until SIGINT/SIGTERM, then persist state and
/// notify subscribers before returning.
pub async fn run(config: MasterConfig) -> Result<(), MasterError> {
    let objects = gcluster_storage::load_state(&config.state_path);
    tracing::info!(count = objects.len(), path = %config.state_path.display(), "loaded persisted state");

    let store = Arc::new(Store::new(SystemClock));
    store.load_state(objects);

    let call: Arc<dyn gcluster_engine::AgentCall> =
        Arc::new(ShellAgentCall::new(config.agent_program.clone(), config.agent_args.clone()));
    let clock_handle: gcluster_engine::ClockHandle = Arc::new(SystemClock);
    let store_sink: Arc<dyn RunStateSink> = Arc::clone(&store) as Arc<dyn RunStateSink>;
    let executor = Arc::new(Executor::new(call, store_sink, clock_handle));

    let server = Server::new(Arc::clone(&store), Arc::clone(&executor));
    server.install_callbacks();

    let listener =
        TcpListener::bind(config.addr).await.map_err(|e| MasterError::Bind(config.addr, e))?;
    tracing::info!(addr = %config.addr, "gcluster master listening");

    let listen_handle = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.listen(listener).await }
    });

    wait_for_shutdown_signal().await.map_err(MasterError::Signal)?;
    tracing::warn!("shutdown signal received, stopping");

    server.notify_shutdown("master shutting down");
    executor.stop_all(config.stop_timeout).await;
    listen_handle.abort();

    let objects = store.list_agents();
    if let Err(e) = flush_state(&objects, &config.state_path) {
        tracing::warn!(error = %e, "failed to save state on shutdown, in-memory state is authoritative");
    }

    Ok(())
}

fn flush_state(objects: &[gcluster_core::ClusterObject], path: &std::path::Path) -> Result<(), PersistError> {
    gcluster_storage::save_state(objects, path)
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
