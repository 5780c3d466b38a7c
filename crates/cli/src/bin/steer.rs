// SPDX-License-Identifier: MIT

//! `gcluster-steer` — a minimal text viewer over the `steer_subscribe`
//! stream, plus a line-oriented command prompt for `inject`/`edit-prompt`
//! (spec §4.6). A full TUI is a collaborator outside this spec's scope;
//! this binary only needs to exercise the client's public interface.

use clap::Parser;
use gcluster_cli::SteerClient;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Watch a running gcluster-master's state and steer its agents.
#[derive(Parser)]
#[command(name = "gcluster-steer")]
struct Args {
    /// Master control-socket address (default 127.0.0.1:43252).
    #[arg(long, default_value_t = gcluster_daemon::DEFAULT_ADDR.to_string())]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let args = Args::parse();
    let mut client = SteerClient::spawn(args.addr.clone());
    println!("connecting to {}...", args.addr);
    println!("commands: inject <agent> <message...> | edit <agent> <method> <body...> | quit");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            state = client.next_state() => {
                match state {
                    Some(state) => print_state(&state),
                    None => {
                        println!("client closed");
                        break;
                    }
                }
            }
            status = client.next_status() => {
                if let Some(status) = status {
                    println!("[status] {status}");
                }
            }
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_command(&client, &line) {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        }
    }

    Ok(())
}

fn print_state(state: &gcluster_wire::SteerState) {
    println!("--- {} agent(s) ---", state.objects.len());
    for object in &state.objects {
        println!("{:<20} {:?} rev={}", object.name, object.state, object.current_id);
    }
}

/// Returns `false` when the caller should exit the read loop.
fn handle_command(client: &SteerClient, line: &str) -> bool {
    let mut parts = line.splitn(2, ' ');
    match parts.next().unwrap_or("").trim() {
        "quit" | "exit" => return false,
        "inject" => {
            if let Some(rest) = parts.next() {
                let mut rest = rest.splitn(2, ' ');
                if let (Some(agent), Some(message)) = (rest.next(), rest.next()) {
                    if let Err(e) = client.inject(agent, None, None, message) {
                        println!("inject failed: {e}");
                    }
                } else {
                    println!("usage: inject <agent> <message...>");
                }
            }
        }
        "edit" => {
            if let Some(rest) = parts.next() {
                let mut rest = rest.splitn(3, ' ');
                if let (Some(agent), Some(method), Some(body)) = (rest.next(), rest.next(), rest.next()) {
                    if let Err(e) = client.edit_prompt(agent, method, body) {
                        println!("edit failed: {e}");
                    }
                } else {
                    println!("usage: edit <agent> <method> <body...>");
                }
            }
        }
        "" => {}
        other => println!("unknown command: {other}"),
    }
    true
}
