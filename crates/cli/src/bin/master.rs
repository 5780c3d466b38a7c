// SPDX-License-Identifier: MIT

//! `gcluster-master` — runs the control plane in the foreground until
//! SIGINT/SIGTERM (spec §6, §2).

use std::path::PathBuf;

use clap::Parser;
use gcluster_daemon::MasterConfig;

/// Host the control plane: store, executor, and control socket.
#[derive(Parser)]
#[command(name = "gcluster-master")]
struct Args {
    /// Control-socket bind address (default 127.0.0.1:43252).
    #[arg(long)]
    addr: Option<String>,

    /// Path to the persisted state file (default $HOME/.gcluster/state.json).
    #[arg(long)]
    state: Option<PathBuf>,

    /// External LLM binary invoked for each agent iteration (spec §9).
    #[arg(long, default_value = "llm")]
    agent_program: String,

    /// Extra fixed arguments passed to `--agent-program` on every call.
    #[arg(long)]
    agent_arg: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let args = Args::parse();
    let config = MasterConfig::resolve(
        args.addr.as_deref(),
        args.state,
        args.agent_program,
        args.agent_arg,
    )?;

    gcluster_daemon::lifecycle::run(config).await?;
    Ok(())
}
