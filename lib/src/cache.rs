//! Session-scoped population cache.
//!
//! Keeps one generated population per session so re-renders (and page
//! reloads on the web build) show the same players. Entirely best-effort:
//! any storage or decode failure is treated as a miss.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, Player};

/// Storage key for the cached population.
pub const POPULATION_KEY: &str = "playermap.population";

/// Origins closer than this on both axes (degrees) share a population.
pub const ORIGIN_TOLERANCE_DEG: f64 = 0.01;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session storage unavailable")]
    Unavailable,
    #[error("session storage rejected write: {0}")]
    WriteRejected(String),
}

/// String key/value store with browser `sessionStorage` semantics.
pub trait SessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store for native builds and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl SessionStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.items.remove(key);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CachedPopulation {
    origin: Coordinate,
    players: Vec<Player>,
}

/// Outcome of `load_or_generate`, so callers can log hits and misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Hit,
    Generated,
}

/// Population cache over any `SessionStore`.
pub struct PopulationCache<S> {
    store: S,
}

impl<S: SessionStore> PopulationCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached players if they were generated around (roughly) `origin`.
    pub fn load(&self, origin: &Coordinate) -> Option<Vec<Player>> {
        let raw = self.store.get_item(POPULATION_KEY).ok()??;
        let cached: CachedPopulation = serde_json::from_str(&raw).ok()?;
        cached
            .origin
            .quantized_eq(origin, ORIGIN_TOLERANCE_DEG)
            .then_some(cached.players)
    }

    /// Store `players` for `origin`. Failures are swallowed.
    pub fn save(&mut self, origin: Coordinate, players: &[Player]) {
        let payload = CachedPopulation {
            origin,
            players: players.to_vec(),
        };
        if let Ok(json) = serde_json::to_string(&payload) {
            let _ = self.store.set_item(POPULATION_KEY, &json);
        }
    }

    pub fn clear(&mut self) {
        let _ = self.store.remove_item(POPULATION_KEY);
    }

    /// Cached population for `origin`, or a freshly generated (and cached) one.
    pub fn load_or_generate<F>(
        &mut self,
        origin: Coordinate,
        generate: F,
    ) -> (Vec<Player>, CacheSource)
    where
        F: FnOnce(Coordinate) -> Vec<Player>,
    {
        if let Some(players) = self.load(&origin) {
            return (players, CacheSource::Hit);
        }
        let players = generate(origin);
        self.save(origin, &players);
        (players, CacheSource::Generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PopulationGenerator;

    /// Store whose reads and writes always fail.
    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable)
        }
        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::WriteRejected("quota exceeded".into()))
        }
        fn remove_item(&mut self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    fn generate(origin: Coordinate) -> Vec<Player> {
        PopulationGenerator::seeded(9).generate(origin, &Default::default())
    }

    #[test]
    fn second_load_near_same_origin_hits() {
        let mut cache = PopulationCache::new(MemoryStore::default());
        let origin = Coordinate::DEFAULT_ORIGIN;
        let (first, src) = cache.load_or_generate(origin, generate);
        assert_eq!(src, CacheSource::Generated);

        let nudged = Coordinate::new(origin.lat + 0.005, origin.lng - 0.004);
        let (second, src) = cache.load_or_generate(nudged, |_| panic!("should hit cache"));
        assert_eq!(src, CacheSource::Hit);
        assert_eq!(first, second);
    }

    #[test]
    fn cached_coordinates_survive_exactly() {
        let mut cache = PopulationCache::new(MemoryStore::default());
        let origin = Coordinate::DEFAULT_ORIGIN;
        let mut players = generate(origin);
        players[0].location = Coordinate::new(40.705148961171204, -74.01254883527756);
        players[0].distance = 0.4480935519471352;
        cache.save(origin, &players);
        assert_eq!(cache.load(&origin), Some(players));
    }

    #[test]
    fn moved_origin_regenerates() {
        let mut cache = PopulationCache::new(MemoryStore::default());
        cache.load_or_generate(Coordinate::DEFAULT_ORIGIN, generate);
        let elsewhere = Coordinate::new(51.5074, -0.1278);
        let (players, src) = cache.load_or_generate(elsewhere, generate);
        assert_eq!(src, CacheSource::Generated);
        assert!(players.iter().all(|p| p.distance <= 10.0001));
        assert!(cache.load(&Coordinate::DEFAULT_ORIGIN).is_none());
    }

    #[test]
    fn malformed_payload_is_a_miss() {
        let mut store = MemoryStore::default();
        store.set_item(POPULATION_KEY, "{not json").unwrap();
        let mut cache = PopulationCache::new(store);
        assert!(cache.load(&Coordinate::DEFAULT_ORIGIN).is_none());
        let (_, src) = cache.load_or_generate(Coordinate::DEFAULT_ORIGIN, generate);
        assert_eq!(src, CacheSource::Generated);
        assert!(cache.load(&Coordinate::DEFAULT_ORIGIN).is_some());
    }

    #[test]
    fn broken_storage_never_fails_the_caller() {
        let mut cache = PopulationCache::new(BrokenStore);
        let (players, src) = cache.load_or_generate(Coordinate::DEFAULT_ORIGIN, generate);
        assert_eq!(src, CacheSource::Generated);
        assert_eq!(players.len(), 15);
        cache.clear();
    }
}
