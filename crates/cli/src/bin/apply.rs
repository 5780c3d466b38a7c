// SPDX-License-Identifier: MIT

//! `gcluster-apply` — send an apply file's agent definitions to a running
//! master and print a summary of what changed (spec §6).
//!
//! Exit codes: 0 success; 1 usage error, connection failure, or protocol
//! error (spec §6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gcluster_cli::exit_error::ExitError;
use gcluster_wire::{ApplyRequest, Message};
use tokio::io::BufReader;
use tokio::net::TcpStream;

/// Apply a set of agent definitions to a running gcluster-master.
#[derive(Parser)]
#[command(name = "gcluster-apply")]
struct Args {
    /// Path to a JSON apply file (see gcluster-cli::apply_file).
    file: PathBuf,

    /// Master control-socket address (default 127.0.0.1:43252).
    #[arg(long, default_value_t = gcluster_daemon::DEFAULT_ADDR.to_string())]
    addr: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gcluster-apply: {e}");
            ExitCode::from(e.code as u8)
        }
    }
}

async fn run() -> Result<(), ExitError> {
    let args = Args::parse();

    let agents = gcluster_cli::load_apply_file(&args.file)
        .map_err(|e| ExitError::new(1, e.to_string()))?;

    let stream = TcpStream::connect(&args.addr)
        .await
        .map_err(|e| ExitError::new(1, format!("failed to connect to {}: {e}", args.addr)))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    gcluster_wire::write_message(&mut write_half, &Message::ApplyRequest(ApplyRequest { agents }))
        .await
        .map_err(|e| ExitError::new(1, format!("failed to send apply request: {e}")))?;

    let response = gcluster_wire::read_message(&mut reader)
        .await
        .map_err(|e| ExitError::new(1, format!("failed to read apply response: {e}")))?;

    let Message::ApplyResponse(response) = response else {
        return Err(ExitError::new(1, "master sent an unexpected reply to apply_request".to_string()));
    };

    if let Some(error) = response.error {
        return Err(ExitError::new(1, format!("apply rejected: {error}")));
    }

    for name in &response.summary.created {
        println!("+ {name}");
    }
    for name in &response.summary.updated {
        println!("~ {name}");
    }
    for name in &response.summary.unchanged {
        println!("= {name}");
    }

    Ok(())
}
