//! Shared schema re-exports plus UI-local types.

pub use playermap::{
    ActorState, ActorStatus, ActorStatusResponse, AlertLevel, PlayermapEvent, PlayermapMessage,
    PresenceEvent, StatusResponse,
};

/// Log entry, constructed from `PlayermapMessage` bus events.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub source_name: String,
    pub source_id: String,
    pub message_type: String,
    pub event_debug: String,
    /// Alert severity (only set for alert events).
    pub alert_level: Option<AlertLevel>,
}

/// Parse a WS JSON message into a `PlayermapMessage`.
pub fn parse_ws_message(text: &str) -> Option<PlayermapMessage> {
    serde_json::from_str(text).ok()
}
