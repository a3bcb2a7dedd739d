//! Location store -- the last known position of every reporting player.
//!
//! Reads go through `LocationState` (shared with the web layer); writes go
//! through the single `LocationWriter`, held by `SystemActor`, so every
//! mutation arrives as a bus event.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

pub use playermap::{LocationReport, NearbyQuery, UserLocationRecord};

struct LocationInner {
    records: RwLock<HashMap<String, UserLocationRecord>>,
}

/// Read-only view of the store.
pub struct LocationState {
    inner: Arc<LocationInner>,
}

/// Write handle. Only `SystemActor` holds one.
pub struct LocationWriter {
    inner: Arc<LocationInner>,
}

impl LocationState {
    pub fn new() -> (Self, LocationWriter) {
        let inner = Arc::new(LocationInner {
            records: RwLock::new(HashMap::new()),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            LocationWriter { inner },
        )
    }

    pub fn get(&self, user_id: &str) -> Option<UserLocationRecord> {
        self.inner
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    /// Records matching `query`, most recently seen first, capped.
    pub fn near(&self, query: &NearbyQuery) -> Vec<UserLocationRecord> {
        let guard = self.inner.records.read().unwrap_or_else(|e| e.into_inner());
        query.select(guard.values())
    }

    /// `(total, online)` record counts.
    pub fn counts(&self) -> (usize, usize) {
        let guard = self.inner.records.read().unwrap_or_else(|e| e.into_inner());
        let online = guard.values().filter(|r| r.is_online).count();
        (guard.len(), online)
    }
}

impl LocationWriter {
    /// Store a fully built record (REST path), replacing any previous one.
    pub fn upsert(&self, record: UserLocationRecord) {
        self.inner
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.user_id.clone(), record);
    }

    /// Merge a live report into the stored record (WebSocket / simulation path).
    pub fn apply_report(&self, report: LocationReport, now: DateTime<Utc>) -> UserLocationRecord {
        let mut guard = self.inner.records.write().unwrap_or_else(|e| e.into_inner());
        let record = UserLocationRecord::merge(guard.get(&report.user_id), report, None, now);
        guard.insert(record.user_id.clone(), record.clone());
        record
    }

    /// Flag a user offline. Returns false for unknown users.
    pub fn mark_offline(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let mut guard = self.inner.records.write().unwrap_or_else(|e| e.into_inner());
        match guard.get_mut(user_id) {
            Some(record) => {
                record.is_online = false;
                record.last_seen = now;
                record.updated_at = now;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use playermap::{Coordinate, GameFilter};

    use super::*;

    fn report(id: &str, game: &str, at: Coordinate) -> LocationReport {
        LocationReport {
            user_id: id.into(),
            username: id.to_uppercase(),
            game: game.into(),
            location: at,
            is_online: true,
            level: None,
            achievements: None,
        }
    }

    fn t(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap() + Duration::minutes(mins)
    }

    #[test]
    fn writer_and_reader_share_records() {
        let (state, writer) = LocationState::new();
        let origin = Coordinate::DEFAULT_ORIGIN;
        writer.apply_report(report("a", "Valorant", origin), t(0));
        writer.apply_report(report("b", "Minecraft", origin.offset_km(1.0, 1.0)), t(1));
        writer.apply_report(report("c", "Valorant", origin.offset_km(40.0, 0.0)), t(2));

        assert_eq!(state.counts(), (3, 3));
        let query = NearbyQuery {
            center: origin,
            max_distance_km: 10.0,
            game: GameFilter::All,
            online_only: false,
        };
        let ids: Vec<_> = state.near(&query).into_iter().map(|r| r.user_id).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn reports_update_in_place() {
        let (state, writer) = LocationState::new();
        let first = writer.apply_report(report("a", "Valorant", Coordinate::DEFAULT_ORIGIN), t(0));
        let moved = Coordinate::DEFAULT_ORIGIN.offset_km(0.5, 0.0);
        writer.apply_report(report("a", "Valorant", moved), t(5));

        let stored = state.get("a").unwrap();
        assert_eq!(state.counts().0, 1);
        assert_eq!(stored.location, moved);
        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.last_seen, t(5));
    }

    #[test]
    fn offline_is_excluded_from_online_queries() {
        let (state, writer) = LocationState::new();
        writer.apply_report(report("a", "Valorant", Coordinate::DEFAULT_ORIGIN), t(0));
        assert!(writer.mark_offline("a", t(1)));
        assert!(!writer.mark_offline("ghost", t(1)));
        assert_eq!(state.counts(), (1, 0));

        let query = NearbyQuery {
            center: Coordinate::DEFAULT_ORIGIN,
            max_distance_km: 10.0,
            game: GameFilter::All,
            online_only: true,
        };
        assert!(state.near(&query).is_empty());
    }
}
