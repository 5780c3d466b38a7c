// SPDX-License-Identifier: MIT

//! A resilient client for the `steer_subscribe` stream (spec §4.6).
//!
//! One background task owns the TCP connection and reconnects with
//! exponential backoff (1s, 2s, 4s, capped at 10s) whenever it drops. The
//! latest `steer_state` is exposed through a `watch` channel so a lagging
//! consumer only ever sees the newest snapshot, never a backlog (spec
//! §4.6: "if the consumer lags, the oldest queued state is discarded").
//! Outbound `inject`/`edit_prompt` requests are queued on a channel the
//! background task owns for its whole lifetime, so they survive a
//! reconnect without the caller noticing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gcluster_wire::{Message, SteerEditPrompt, SteerInject, SteerState, SteerSubscribe};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("steer client is closed")]
    Closed,
    #[error("server is shutting down: {0}")]
    ShutdownNotice(String),
}

/// A handle to the background reconnect loop. Dropping every clone and the
/// original closes the outbound channel, which ends the background task.
pub struct SteerClient {
    addr: String,
    state_rx: watch::Receiver<Option<SteerState>>,
    status_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    shutdown: Arc<Mutex<Option<String>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl SteerClient {
    /// Connect to `addr` and start the background reconnect loop.
    pub fn spawn(addr: String) -> Self {
        let (state_tx, state_rx) = watch::channel(None);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Mutex::new(None));

        let task = tokio::spawn(reconnect_loop(
            addr.clone(),
            state_tx,
            status_tx,
            outbound_rx,
            Arc::clone(&shutdown),
        ));

        Self { addr, state_rx, status_rx, outbound_tx, shutdown, _task: task }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The most recently received `steer_state`, if any has arrived yet.
    pub fn latest_state(&self) -> Option<SteerState> {
        self.state_rx.borrow().clone()
    }

    /// Wait for the next state update (or the first one).
    pub async fn next_state(&mut self) -> Option<SteerState> {
        if self.state_rx.changed().await.is_err() {
            return None;
        }
        self.state_rx.borrow().clone()
    }

    /// Drain the next connection-status message (e.g. "reconnecting in 2s",
    /// a shutdown notice), if one is pending.
    pub async fn next_status(&mut self) -> Option<String> {
        self.status_rx.recv().await
    }

    pub fn inject(
        &self,
        agent_name: impl Into<String>,
        step_label: Option<String>,
        iteration: Option<u64>,
        message: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.check_shutdown()?;
        self.outbound_tx
            .send(Message::SteerInject(SteerInject {
                agent_name: agent_name.into(),
                step_label,
                iteration,
                message: message.into(),
            }))
            .map_err(|_| ClientError::Closed)
    }

    pub fn edit_prompt(
        &self,
        agent_name: impl Into<String>,
        method_name: impl Into<String>,
        new_body: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.check_shutdown()?;
        self.outbound_tx
            .send(Message::SteerEditPrompt(SteerEditPrompt {
                agent_name: agent_name.into(),
                method_name: method_name.into(),
                new_body: new_body.into(),
            }))
            .map_err(|_| ClientError::Closed)
    }

    /// Returns `Err` once the server has sent a `shutdown_notice` the
    /// background loop hasn't yet recovered from, per spec §4.6/§7.
    fn check_shutdown(&self) -> Result<(), ClientError> {
        match self.shutdown.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(reason) => Err(ClientError::ShutdownNotice(reason)),
            None => Ok(()),
        }
    }
}

async fn reconnect_loop(
    addr: String,
    state_tx: watch::Sender<Option<SteerState>>,
    status_tx: mpsc::UnboundedSender<String>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    shutdown: Arc<Mutex<Option<String>>>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match run_connection(&addr, &state_tx, &status_tx, &mut outbound_rx, &shutdown).await {
            ConnectionEnd::Closed => {
                tracing::debug!(%addr, "steer client closed, stopping reconnect loop");
                return;
            }
            ConnectionEnd::Dropped => {
                tracing::warn!(%addr, backoff_secs = backoff.as_secs(), "steer connection dropped, retrying");
                let _ = status_tx.send(format!("disconnected, retrying in {}s", backoff.as_secs()));
                tokio::time::sleep(backoff).await;
                backoff = (backoff * BACKOFF_MULTIPLIER).min(MAX_BACKOFF);
            }
        }
    }
}

enum ConnectionEnd {
    /// The outbound channel was closed: every `SteerClient` handle was
    /// dropped, so the loop should exit for good.
    Closed,
    /// The connection dropped (or never connected); retry with backoff.
    Dropped,
}

async fn run_connection(
    addr: &str,
    state_tx: &watch::Sender<Option<SteerState>>,
    status_tx: &mpsc::UnboundedSender<String>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Message>,
    shutdown: &Arc<Mutex<Option<String>>>,
) -> ConnectionEnd {
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%addr, error = %e, "steer client connect failed");
            let _ = status_tx.send(format!("connect failed: {e}"));
            return ConnectionEnd::Dropped;
        }
    };
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    if gcluster_wire::write_message(&mut write_half, &Message::SteerSubscribe(SteerSubscribe {}))
        .await
        .is_err()
    {
        return ConnectionEnd::Dropped;
    }
    tracing::info!(%addr, "steer client connected");
    *shutdown.lock().unwrap_or_else(|e| e.into_inner()) = None;
    let _ = status_tx.send("connected".to_string());

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if gcluster_wire::write_message(&mut write_half, &message).await.is_err() {
                            return ConnectionEnd::Dropped;
                        }
                    }
                    None => return ConnectionEnd::Closed,
                }
            }
            incoming = gcluster_wire::read_message(&mut reader) => {
                match incoming {
                    Ok(Message::SteerState(state)) => {
                        let _ = state_tx.send(Some(state));
                    }
                    Ok(Message::ShutdownNotice(notice)) => {
                        tracing::info!(%addr, reason = %notice.reason, "steer client received shutdown notice");
                        *shutdown.lock().unwrap_or_else(|e| e.into_inner()) = Some(notice.reason.clone());
                        let _ = status_tx.send(format!("shutdown: {}", notice.reason));
                        return ConnectionEnd::Dropped;
                    }
                    Ok(_) => {}
                    Err(_) => return ConnectionEnd::Dropped,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "steer_client_tests.rs"]
mod tests;
