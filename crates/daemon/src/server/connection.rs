// SPDX-License-Identifier: MIT

//! Per-connection read loop: decode envelopes, dispatch, write replies and
//! pushes through one serializing writer task (spec §4.5).

use std::sync::Arc;

use gcluster_core::Clock;
use gcluster_wire::{Message, ProtocolError};
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::Server;

pub async fn handle_connection<C: Clock>(stream: TcpStream, server: Arc<Server<C>>) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let writer_task = tokio::spawn(writer_loop(write_half, rx));

    let mut reader = BufReader::new(read_half);
    let mut subscriber_id: Option<u64> = None;

    loop {
        let line = match gcluster_wire::read_line(&mut reader).await {
            Ok(line) => line,
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                tracing::debug!(error = %e, "connection read error, closing");
                break;
            }
        };

        match gcluster_wire::decode(&line) {
            Ok(message) => dispatch(&server, message, &tx, &mut subscriber_id),
            Err(e) => {
                if message_type_of(&line).as_deref() == Some("apply_request") {
                    let response = Message::ApplyResponse(gcluster_wire::ApplyResponse {
                        summary: Default::default(),
                        error: Some(e.to_string()),
                    });
                    let _ = tx.send(response);
                } else {
                    tracing::warn!(error = %e, "failed to decode envelope, closing connection");
                    break;
                }
            }
        }
    }

    if let Some(id) = subscriber_id {
        server.remove_subscriber(id);
    }
    drop(tx);
    let _ = writer_task.await;
}

/// Best-effort peek at an envelope's `type` field without requiring its
/// `payload` to conform, so a decode failure for a known type (e.g. a
/// malformed `apply_request`) can still receive a typed error reply.
fn message_type_of(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("type")?.as_str().map(str::to_string)
}

fn dispatch<C: Clock>(
    server: &Arc<Server<C>>,
    message: Message,
    tx: &mpsc::UnboundedSender<Message>,
    subscriber_id: &mut Option<u64>,
) {
    match message {
        Message::ApplyRequest(req) => {
            let response = server.apply(&req.agents);
            let _ = tx.send(Message::ApplyResponse(response));
        }
        Message::SteerSubscribe(_) => {
            let (id, state) = server.register_subscriber(tx.clone());
            *subscriber_id = Some(id);
            let _ = tx.send(Message::SteerState(state));
        }
        Message::SteerInject(payload) => server.steer_inject(&payload),
        Message::SteerEditPrompt(payload) => server.steer_edit_prompt(&payload),
        other => tracing::debug!(?other, "ignoring unsolicited message type"),
    }
}

async fn writer_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Message>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        if gcluster_wire::write_message(&mut writer, &message).await.is_err() {
            break;
        }
    }
}
