//! Unified `PlayermapMessage` bus types.
//!
//! All events flow through a single `broadcast<PlayermapMessage>` channel.
//! Each message has a source (global ID of the originator), a timestamp,
//! and a typed event. Producers create messages; consumers subscribe and
//! filter.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorState, LocationReport, UserLocationRecord};
use crate::{MockPlayersSection, PlayermapConfig, WebserverSection};

// ---------------------------------------------------------------------------
// Top-level message
// ---------------------------------------------------------------------------

/// A single event on the unified bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayermapMessage {
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub event: PlayermapEvent,
}

#[cfg(not(target_arch = "wasm32"))]
impl PlayermapMessage {
    /// Create a new message stamped with the current UTC time.
    pub fn new(event: impl Into<PlayermapEvent>) -> Self {
        Self {
            source: String::new(),
            timestamp: Utc::now(),
            event: event.into(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<PresenceEvent> for PlayermapEvent {
    fn from(event: PresenceEvent) -> Self {
        PlayermapEvent::Presence(event)
    }
}

impl From<ActorState> for PlayermapEvent {
    fn from(state: ActorState) -> Self {
        PlayermapEvent::ActorStatus(state)
    }
}

impl From<ConfigCommand> for PlayermapEvent {
    fn from(cmd: ConfigCommand) -> Self {
        PlayermapEvent::ConfigCommand(cmd)
    }
}

impl From<ConfigOutcome> for PlayermapEvent {
    fn from(result: ConfigOutcome) -> Self {
        PlayermapEvent::ConfigOutcome(result)
    }
}

impl From<AlertMessage> for PlayermapEvent {
    fn from(alert: AlertMessage) -> Self {
        PlayermapEvent::Alert(alert)
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// The typed event payload carried by a `PlayermapMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayermapEvent {
    /// Player presence (REST writes, WebSocket room traffic, simulation).
    Presence(PresenceEvent),
    /// Actor lifecycle + telemetry.
    ActorStatus(ActorState),
    /// Config mutation request (emitted by POST handler).
    ConfigCommand(ConfigCommand),
    /// Config mutation outcome (emitted by SystemActor after processing).
    ConfigOutcome(ConfigOutcome),
    /// Alert for user-visible warn/error conditions.
    Alert(AlertMessage),
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Presence traffic. `room` is the sender's presence room, if it joined one;
/// WebSocket clients only receive room-scoped events for their own room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// A record written through `POST /api/location`.
    Recorded { record: Box<UserLocationRecord> },
    /// A live location report (WebSocket `update_location` or simulation).
    Updated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        report: LocationReport,
    },
    /// The user left.
    Offline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        user_id: String,
    },
}

impl PresenceEvent {
    pub fn room(&self) -> Option<&str> {
        match self {
            PresenceEvent::Recorded { .. } => None,
            PresenceEvent::Updated { room, .. } | PresenceEvent::Offline { room, .. } => {
                room.as_deref()
            }
        }
    }
}

/// Room name for a position, two decimal places of each axis
/// (`location-4071--7401`). Halves round toward positive infinity.
pub fn presence_room(lat: f64, lng: f64) -> String {
    fn bucket(v: f64) -> i64 {
        (v * 100.0 + 0.5).floor() as i64
    }
    format!("location-{}-{}", bucket(lat), bucket(lng))
}

// ---------------------------------------------------------------------------
// ConfigCommand -- config mutation request
// ---------------------------------------------------------------------------

/// A request to mutate the system configuration.
///
/// Emitted on the bus by the POST handler. Processed exclusively by
/// `SystemActor`, which applies the mutation, reconciles actors, and
/// emits a `ConfigOutcome` when a `request_id` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub action: ConfigAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigAction {
    /// Replace the entire config. Used by POST /api/settings.
    ReplaceAll { config: Box<PlayermapConfig> },
    UpsertWebserver {
        index: String,
        section: WebserverSection,
    },
    UpsertMockPlayers {
        index: String,
        section: MockPlayersSection,
    },
    /// Remove a section by global ID ("webserver.0", "mock_players.1").
    Remove { id: String },
}

/// Acknowledgment of a config mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOutcome {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restarted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stopped: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub started: Vec<String>,
}

// ---------------------------------------------------------------------------
// AlertMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warn,
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warn => write!(f, "warn"),
            AlertLevel::Error => write!(f, "error"),
        }
    }
}

/// A user-visible alert. Info/debug stays in the tracing backend;
/// warn/error conditions surface here for the UI activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub level: AlertLevel,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;

    #[test]
    fn room_buckets_two_decimals() {
        assert_eq!(presence_room(40.7128, -74.0060), "location-4071--7401");
        assert_eq!(presence_room(40.7149, -74.0049), "location-4071--7400");
        assert_eq!(presence_room(0.0, 0.0), "location-0-0");
    }

    #[test]
    fn room_halves_round_up() {
        assert_eq!(presence_room(0.125, -0.125), "location-13--12");
        assert_eq!(presence_room(-0.375, 0.625), "location--37-63");
    }

    #[test]
    fn presence_serializes_tagged() {
        let msg = PlayermapMessage::new(PresenceEvent::Offline {
            room: Some(presence_room(40.7128, -74.006)),
            user_id: "u7".into(),
        })
        .source("ws.1a2b3c4d");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"]["kind"], "presence");
        assert_eq!(json["event"]["type"], "offline");
        assert_eq!(json["source"], "ws.1a2b3c4d");

        let back: PlayermapMessage = serde_json::from_value(json).unwrap();
        let PlayermapEvent::Presence(event) = back.event else {
            panic!("expected presence");
        };
        assert_eq!(event.room(), Some("location-4071--7401"));
    }

    #[test]
    fn update_carries_report() {
        let event = PresenceEvent::Updated {
            room: None,
            report: LocationReport {
                user_id: "u1".into(),
                username: "GameMaster".into(),
                game: "Apex Legends".into(),
                location: Coordinate::DEFAULT_ORIGIN,
                is_online: true,
                level: None,
                achievements: None,
            },
        };
        assert_eq!(event.room(), None);
        let json = serde_json::to_value(PlayermapEvent::from(event)).unwrap();
        assert_eq!(json["report"]["userId"], "u1");
    }
}
