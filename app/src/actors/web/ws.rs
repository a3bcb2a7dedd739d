//! WebSocket handler -- init handshake, bus streaming, presence rooms.
//!
//! Protocol:
//!   1. Client sends:  `{ "type": "start", "name": "Map" }`
//!   2. Server sends:
//!      `{ "type": "init", "source_id": "ws.1a2b3c4d", "locations": n, "online": n }`
//!   3. Server streams `PlayermapMessage` events. Presence events are only
//!      delivered to clients in the sender's room, never back to the sender.
//!   4. Client commands:
//!      `{ "cmd": "join_location", "lat": 40.71, "lng": -74.0, "radius": 10 }`
//!      `{ "cmd": "update_location", "userId": ..., "username": ..., "game": ...,
//!         "location": {...}, "isOnline": true }`
//!      `{ "cmd": "user_offline", "userId": ... }`

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use super::{WebState, emit_telemetry};
use crate::state::config;
use playermap::{LocationUpdate, PlayermapEvent, PlayermapMessage, PresenceEvent, presence_room};

/// GET /api/ws -- upgrade to WebSocket.
pub async fn ws_upgrade(
    State(state): State<Arc<WebState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<WebState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Phase 1: wait for "start"
    let client_name = loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(name) = parse_start_message(&text) {
                    break name;
                }
            }
            Some(Ok(Message::Close(_))) | None => return,
            _ => continue,
        }
    };

    // Phase 2: "init"
    let source_id = format!("ws.{}", config::generate_id());
    state.ws_count.fetch_add(1, Ordering::Relaxed);
    emit_telemetry(&state);
    tracing::info!("ws: client '{client_name}' connected (source_id={source_id})");

    let (locations, online) = state.root.locations.counts();
    let init_msg = serde_json::json!({
        "type": "init",
        "source_id": source_id,
        "locations": locations,
        "online": online,
    });
    if ws_tx
        .send(Message::text(init_msg.to_string()))
        .await
        .is_err()
    {
        return;
    }

    // Phase 3: stream + commands. The room is shared by both halves.
    let room: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let mut bus_rx = state.bus_tx.subscribe();

    let send_room = Arc::clone(&room);
    let send_source = source_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match bus_rx.recv().await {
                Ok(msg) => {
                    let deliver = {
                        let room = send_room.lock().unwrap_or_else(|e| e.into_inner());
                        should_deliver(&msg, &send_source, room.as_deref())
                    };
                    if !deliver {
                        continue;
                    }
                    if let Ok(json) = serde_json::to_string(&msg)
                        && ws_tx.send(Message::text(json)).await.is_err()
                    {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("ws: lagged {n}");
                }
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let recv_source = source_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let event = {
                        let mut room = room.lock().unwrap_or_else(|e| e.into_inner());
                        apply_command(&text, &recv_source, &mut room)
                    };
                    if let Some(event) = event {
                        let _ = recv_state
                            .bus_tx
                            .send(PlayermapMessage::new(event).source(&recv_source));
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.ws_count.fetch_sub(1, Ordering::Relaxed);
    emit_telemetry(&state);
    tracing::info!("ws: client '{client_name}' disconnected (source_id={source_id})");
}

/// Client name from a "start" handshake message.
fn parse_start_message(text: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct StartMsg {
        #[serde(rename = "type")]
        msg_type: String,
        #[serde(default)]
        name: String,
    }
    let msg: StartMsg = serde_json::from_str(text).ok()?;
    (msg.msg_type == "start").then(|| {
        if msg.name.is_empty() {
            "anonymous".to_string()
        } else {
            msg.name
        }
    })
}

/// Presence is room-scoped and never echoed; everything else is broadcast.
fn should_deliver(msg: &PlayermapMessage, own_source: &str, own_room: Option<&str>) -> bool {
    match &msg.event {
        PlayermapEvent::Presence(event) => {
            msg.source != own_source && own_room.is_some() && event.room() == own_room
        }
        _ => true,
    }
}

#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum WsCommand {
    JoinLocation {
        lat: f64,
        lng: f64,
        #[serde(default)]
        radius: Option<f64>,
    },
    UpdateLocation(LocationUpdate),
    UserOffline {
        #[serde(rename = "userId")]
        user_id: String,
    },
}

/// Apply one client command to the connection's room and return the bus
/// event it produces, if any. Malformed commands are ignored.
fn apply_command(text: &str, source: &str, room: &mut Option<String>) -> Option<PresenceEvent> {
    let cmd = match serde_json::from_str::<WsCommand>(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            tracing::debug!("ws {source}: ignoring command: {e}");
            return None;
        }
    };

    match cmd {
        WsCommand::JoinLocation { lat, lng, radius } => {
            if !(lat.is_finite() && lng.is_finite()) {
                return None;
            }
            let name = presence_room(lat, lng);
            tracing::info!("ws {source}: joined room {name} (radius {radius:?})");
            *room = Some(name);
            None
        }
        WsCommand::UpdateLocation(update) => match update.validate() {
            Ok(report) => Some(PresenceEvent::Updated {
                room: room.clone(),
                report,
            }),
            Err(e) => {
                tracing::debug!("ws {source}: dropped update: {e}");
                None
            }
        },
        WsCommand::UserOffline { user_id } => Some(PresenceEvent::Offline {
            room: room.clone(),
            user_id,
        }),
    }
}
