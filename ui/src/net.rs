//! Networking: ehttp REST and ewebsock WebSocket.
//!
//! Async results are placed in a shared `Pending` queue (Arc<Mutex>)
//! that the app drains each frame. This avoids touching egui's internal
//! data store from async callbacks.

use std::sync::{Arc, Mutex};

use playermap::Coordinate;

use crate::types::{self, PlayermapMessage, StatusResponse};

// ---------------------------------------------------------------------------
// Pending results queue, shared between async callbacks and the app.
// Arc<Mutex> instead of Rc<RefCell> because ehttp 0.6 requires Send callbacks.
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Pending {
    pub status: Option<StatusResponse>,
}

pub type PendingHandle = Arc<Mutex<Pending>>;

pub fn new_pending() -> PendingHandle {
    Arc::new(Mutex::new(Pending::default()))
}

// ---------------------------------------------------------------------------
// Helpers: platform-specific URL resolution
// ---------------------------------------------------------------------------

#[cfg(target_arch = "wasm32")]
fn api_base() -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default();
    if origin.is_empty() || origin == "null" {
        "http://127.0.0.1:3030".to_string()
    } else {
        origin
    }
}

#[cfg(target_arch = "wasm32")]
fn ws_url() -> String {
    let Some(location) = web_sys::window().map(|w| w.location()) else {
        return "ws://127.0.0.1:3030/api/ws".to_string();
    };
    let protocol = location.protocol().unwrap_or_default();
    let host = location.host().unwrap_or_default();
    let ws_proto = if protocol == "https:" { "wss:" } else { "ws:" };
    if host.is_empty() {
        "ws://127.0.0.1:3030/api/ws".to_string()
    } else {
        format!("{ws_proto}//{host}/api/ws")
    }
}

#[cfg(not(target_arch = "wasm32"))]
static NATIVE_BASE_URL: std::sync::OnceLock<String> = std::sync::OnceLock::new();

/// Set the base URL for native builds (e.g. "http://127.0.0.1:3030").
/// Must be called before the app is created.
#[cfg(not(target_arch = "wasm32"))]
pub fn set_base_url(url: String) {
    NATIVE_BASE_URL.set(url).ok();
}

#[cfg(not(target_arch = "wasm32"))]
fn api_base() -> String {
    NATIVE_BASE_URL
        .get()
        .cloned()
        .unwrap_or_else(|| "http://127.0.0.1:3030".to_string())
}

#[cfg(not(target_arch = "wasm32"))]
fn ws_url() -> String {
    let base = api_base();
    let ws_base = base
        .replace("http://", "ws://")
        .replace("https://", "wss://");
    format!("{ws_base}/api/ws")
}

// ---------------------------------------------------------------------------
// REST fetches
// ---------------------------------------------------------------------------

pub fn fetch_status(ctx: &egui::Context, pending: &PendingHandle) {
    let ctx = ctx.clone();
    let pending = Arc::clone(pending);
    let url = format!("{}/api/status", api_base());
    ehttp::fetch(ehttp::Request::get(&url), move |result| {
        if let Ok(resp) = result
            && let Ok(status) = serde_json::from_slice::<StatusResponse>(&resp.bytes)
            && let Ok(mut p) = pending.lock()
        {
            p.status = Some(status);
            ctx.request_repaint();
        }
    });
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

pub fn connect_ws() -> Option<(ewebsock::WsSender, ewebsock::WsReceiver)> {
    let url = ws_url();
    match ewebsock::connect(&url, ewebsock::Options::default()) {
        // In WASM the socket is still CONNECTING here; the start handshake
        // goes out after WsEvent::Opened.
        Ok((tx, rx)) => Some((tx, rx)),
        Err(e) => {
            log::error!("WebSocket connect failed: {e}");
            None
        }
    }
}

/// Send the init handshake after the WebSocket is confirmed open.
pub fn send_ws_start(tx: &mut ewebsock::WsSender) {
    tx.send(ewebsock::WsMessage::Text(
        r#"{"type":"start","name":"Player Map"}"#.into(),
    ));
}

/// `join_location` command for the presence room around `origin`.
pub fn join_location_command(origin: Coordinate, radius_km: f64) -> String {
    serde_json::json!({
        "cmd": "join_location",
        "lat": origin.lat,
        "lng": origin.lng,
        "radius": radius_km,
    })
    .to_string()
}

pub fn send_join_location(tx: &mut ewebsock::WsSender, origin: Coordinate, radius_km: f64) {
    tx.send(ewebsock::WsMessage::Text(join_location_command(
        origin, radius_km,
    )));
}

/// Result from polling the WebSocket.
pub enum WsPollEvent {
    /// Browser WebSocket opened (WASM: onopen fired).
    Opened,
    /// Init handshake completed. Server assigned a source_id.
    Init {
        source_id: String,
        locations: usize,
        online: usize,
    },
    /// A bus event from the server.
    Message(PlayermapMessage),
    Error(String),
    Disconnected,
}

pub fn poll_ws(rx: &mut ewebsock::WsReceiver) -> Vec<WsPollEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.try_recv() {
        match event {
            ewebsock::WsEvent::Opened => {
                log::info!("WebSocket opened");
                events.push(WsPollEvent::Opened);
            }
            ewebsock::WsEvent::Message(ewebsock::WsMessage::Text(text)) => {
                if let Some(init) = parse_init_response(&text) {
                    events.push(init);
                } else if let Some(msg) = types::parse_ws_message(&text) {
                    events.push(WsPollEvent::Message(msg));
                }
            }
            ewebsock::WsEvent::Error(e) => {
                log::error!("WebSocket error: {e}");
                events.push(WsPollEvent::Error(e));
            }
            ewebsock::WsEvent::Closed => {
                log::warn!("WebSocket closed");
                events.push(WsPollEvent::Disconnected);
                break;
            }
            _ => {}
        }
    }
    events
}

/// Parse `{ "type": "init", "source_id": "...", "locations": n, "online": n }`.
fn parse_init_response(text: &str) -> Option<WsPollEvent> {
    #[derive(serde::Deserialize)]
    struct InitMsg {
        #[serde(rename = "type")]
        msg_type: String,
        source_id: Option<String>,
        #[serde(default)]
        locations: usize,
        #[serde(default)]
        online: usize,
    }
    let msg: InitMsg = serde_json::from_str(text).ok()?;
    (msg.msg_type == "init").then(|| WsPollEvent::Init {
        source_id: msg.source_id.unwrap_or_default(),
        locations: msg.locations,
        online: msg.online,
    })
}
