//! Shared domain types carried on the bus and over the REST API.
//!
//! Pure data with no channel affinity; `message.rs` wraps them into bus
//! events and `api.rs` into HTTP bodies.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Coordinate;

// ---------------------------------------------------------------------------
// Persisted player locations
// ---------------------------------------------------------------------------

/// Client details captured from request headers when a location is posted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub platform: String,
}

/// A validated location report, from `POST /api/location` or a WebSocket
/// `update_location` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub location: Coordinate,
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<String>>,
}

/// One stored location, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocationRecord {
    pub user_id: String,
    pub username: String,
    pub game: String,
    pub location: Coordinate,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub level: u32,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub device_info: DeviceInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserLocationRecord {
    /// Apply a report on top of `existing` (if any). Level and achievements
    /// survive when the report omits them; `created_at` is kept.
    pub fn merge(
        existing: Option<&UserLocationRecord>,
        report: LocationReport,
        device_info: Option<DeviceInfo>,
        now: DateTime<Utc>,
    ) -> Self {
        let level = report
            .level
            .or(existing.map(|r| r.level))
            .unwrap_or(1);
        let achievements = report
            .achievements
            .or_else(|| existing.map(|r| r.achievements.clone()))
            .unwrap_or_default();
        let device_info = device_info
            .or_else(|| existing.map(|r| r.device_info.clone()))
            .unwrap_or_default();
        Self {
            user_id: report.user_id,
            username: report.username,
            game: report.game,
            location: report.location,
            is_online: report.is_online,
            last_seen: now,
            level,
            achievements,
            device_info,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// ActorStatus -- generic actor lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Starting,
    Disconnected,
    Connected,
}

impl std::fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Actor state emitted on the bus: lifecycle plus free-form telemetry
/// (bind address, socket count, simulated player count).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorState {
    pub status: ActorStatus,
    #[serde(default)]
    pub telemetry: HashMap<String, String>,
}

impl ActorState {
    pub fn new(status: ActorStatus, telemetry: HashMap<String, String>) -> Self {
        Self { status, telemetry }
    }
}
