use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use cheetoh_types::events::{ClientEvent, ServerEvent};

use crate::coordinator::Coordinator;
use crate::dispatcher::ConnectionSignal;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one WebSocket from admission to teardown.
///
/// The ban gate was already checked at the HTTP upgrade layer; it is checked
/// again here atomically with registration.
pub async fn handle_connection(socket: WebSocket, coordinator: Coordinator, address: String) {
    let (mut sender, mut receiver) = socket.split();

    let (id, mut signals) = match coordinator.connect(&address).await {
        Ok(registered) => registered,
        Err(e) => {
            info!("refusing {}: {}", address, e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!("{} connected from {}", id, address);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward room events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                signal = signals.recv() => {
                    let event = match signal {
                        Some(ConnectionSignal::Event(event)) => event,
                        Some(ConnectionSignal::Close) | None => {
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    };
                    let Some(text) = encode(&event) else { continue };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read events from client
    let recv_coordinator = coordinator.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => recv_coordinator.handle(id, event).await,
                    Err(e) => {
                        warn!(
                            "{} bad event: {} -- raw: {}",
                            id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    coordinator.disconnect(id).await;
    info!("{} disconnected", id);
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("failed to serialize event: {}", e);
            None
        }
    }
}
