//! WebSocket handler for live metric observers.
//!
//! Endpoint: GET /ws
//!
//! Each observer first receives a `metrics.snapshot` event with the current
//! aggregate, then one `result.submitted` event per ingested result.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::sync::broadcast::error::RecvError;

use meshsim_common::protocol::CollectorEvent;

use crate::collector::Collector;

pub async fn handler(State(collector): State<Collector>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(collector, socket))
}

async fn handle_socket(collector: Collector, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (baseline, mut events) = collector.subscribe().await;
    tracing::debug!(observers = collector.observer_count(), "observer connected");

    match serde_json::to_string(&CollectorEvent::Snapshot(baseline)) {
        Ok(json) => {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize metrics snapshot");
            return;
        }
    }

    // ── Live event loop ─────────────────────────────────────────────

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize collector event");
                                continue;
                            }
                        };
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("metrics observer lagged, dropped {n} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Observers only listen; anything but a close is ignored.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("observer disconnected");
}
