//! REST API request/response types shared between the app and UI crates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ActorStatus, Coordinate, GameFilter, LocationReport, UserLocationRecord};

/// Most records a nearby query returns.
pub const NEARBY_LIMIT: usize = 50;

/// Search radius when `maxDistance` is absent or unparseable.
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Client errors from the location endpoints. All map to HTTP 400 with an
/// `{ "error": <display> }` body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationApiError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Latitude and longitude are required")]
    MissingCoordinates,
    #[error("Invalid request body")]
    InvalidBody,
}

impl LocationApiError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// `{ "error": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&LocationApiError> for ErrorResponse {
    fn from(e: &LocationApiError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/location
// ---------------------------------------------------------------------------

/// Raw body of `POST /api/location` (and the WebSocket `update_location`
/// payload). Every field is optional so validation can report a single
/// "missing fields" error instead of a deserializer message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub achievements: Option<Vec<String>>,
}

impl LocationUpdate {
    /// Empty strings count as missing. `is_online` defaults to true.
    pub fn validate(self) -> Result<LocationReport, LocationApiError> {
        fn present(s: Option<String>) -> Option<String> {
            s.filter(|s| !s.is_empty())
        }
        let (Some(user_id), Some(username), Some(game), Some(location)) = (
            present(self.user_id),
            present(self.username),
            present(self.game),
            self.location.filter(Coordinate::is_finite),
        ) else {
            return Err(LocationApiError::MissingFields);
        };
        Ok(LocationReport {
            user_id,
            username,
            game,
            location,
            is_online: self.is_online.unwrap_or(true),
            level: self.level,
            achievements: self.achievements,
        })
    }
}

/// `{ "success": true, "data": record }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    pub success: bool,
    pub data: UserLocationRecord,
}

// ---------------------------------------------------------------------------
// GET /api/location
// ---------------------------------------------------------------------------

/// Raw query string of `GET /api/location`. Kept as strings so bad numbers
/// surface as the coordinate error rather than an extractor rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyParams {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub max_distance: Option<String>,
    pub game: Option<String>,
    pub online_only: Option<String>,
}

fn parse_finite(s: Option<&str>) -> Option<f64> {
    s?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl NearbyParams {
    pub fn parse(&self) -> Result<NearbyQuery, LocationApiError> {
        let (Some(lat), Some(lng)) = (
            parse_finite(self.lat.as_deref()),
            parse_finite(self.lng.as_deref()),
        ) else {
            return Err(LocationApiError::MissingCoordinates);
        };
        let max_distance_km = parse_finite(self.max_distance.as_deref())
            .filter(|d| *d >= 0.0)
            .unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
        Ok(NearbyQuery {
            center: Coordinate::new(lat, lng),
            max_distance_km,
            game: GameFilter::from_param(self.game.as_deref()),
            online_only: self.online_only.as_deref() == Some("true"),
        })
    }
}

/// A parsed nearby query.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: Coordinate,
    pub max_distance_km: f64,
    pub game: GameFilter,
    pub online_only: bool,
}

impl NearbyQuery {
    pub fn matches(&self, record: &UserLocationRecord) -> bool {
        self.center.distance_km(&record.location) <= self.max_distance_km
            && self.game.accepts(&record.game)
            && (!self.online_only || record.is_online)
    }

    /// Matching records, most recently seen first, capped at `NEARBY_LIMIT`.
    pub fn select<'a, I>(&self, records: I) -> Vec<UserLocationRecord>
    where
        I: IntoIterator<Item = &'a UserLocationRecord>,
    {
        let mut hits: Vec<UserLocationRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        hits.truncate(NEARBY_LIMIT);
        hits
    }
}

/// `{ "success": true, "data": [...], "count": n }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResponse {
    pub success: bool,
    pub data: Vec<UserLocationRecord>,
    pub count: usize,
}

impl NearbyResponse {
    pub fn new(data: Vec<UserLocationRecord>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Status / settings
// ---------------------------------------------------------------------------

/// GET /api/status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub actors: HashMap<String, ActorStatusResponse>,
    /// Records currently held by the location store.
    #[serde(default)]
    pub locations: usize,
    #[serde(default)]
    pub online: usize,
}

/// Per-actor status within the status response. Also the cached per-actor
/// state in the web layer and UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorStatusResponse {
    #[serde(default)]
    pub name: String,
    pub status: ActorStatus,
    #[serde(default)]
    pub telemetry: HashMap<String, String>,
}

/// POST /api/settings response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostSettingsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restarted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stopped: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub started: Vec<String>,
}
