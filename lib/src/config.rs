use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, GeneratorSettings, TileLayer};

// ---------------------------------------------------------------------------
// Persisted config types (shared between app and UI)
// ---------------------------------------------------------------------------

/// Top-level persisted config. Every section has defaults so a partial,
/// hand-edited TOML file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayermapConfig {
    #[serde(default)]
    pub generator: GeneratorSettings,
    /// Fixed origin for hosts without a geolocation capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Coordinate>,
    #[serde(default)]
    pub map: TileLayer,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub webserver: HashMap<String, WebserverSection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mock_players: HashMap<String, MockPlayersSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserverSection {
    #[serde(default)]
    pub name: String,
    pub bind: String,
}

/// Simulated players that keep the location store populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockPlayersSection {
    #[serde(default)]
    pub name: String,
    /// Center of the simulated population. Defaults to New York City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Coordinate>,
    #[serde(default = "default_mock_count")]
    pub count: usize,
    #[serde(default = "default_mock_radius")]
    pub radius_km: f64,
    /// Seconds between presence toggles.
    #[serde(default = "default_mock_interval")]
    pub interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_mock_count() -> usize {
    15
}

fn default_mock_radius() -> f64 {
    10.0
}

fn default_mock_interval() -> u64 {
    30
}

impl MockPlayersSection {
    pub fn origin(&self) -> Coordinate {
        self.origin.unwrap_or(Coordinate::DEFAULT_ORIGIN)
    }

    /// Generator settings for this section, inheriting listing/price tunables
    /// from the global `[generator]` section.
    pub fn generator_settings(&self, base: &GeneratorSettings) -> GeneratorSettings {
        GeneratorSettings {
            count: self.count,
            radius_km: self.radius_km,
            ..base.clone()
        }
    }
}

impl Default for PlayermapConfig {
    /// One local web server, one simulated population around the default origin.
    fn default() -> Self {
        let mut webserver = HashMap::new();
        webserver.insert(
            "0".into(),
            WebserverSection {
                name: "Web Server".into(),
                bind: "0.0.0.0:3030".into(),
            },
        );
        let mut mock_players = HashMap::new();
        mock_players.insert(
            "0".into(),
            MockPlayersSection {
                name: "Simulated Players".into(),
                origin: None,
                count: default_mock_count(),
                radius_km: default_mock_radius(),
                interval_secs: default_mock_interval(),
                seed: None,
            },
        );
        Self {
            generator: GeneratorSettings::default(),
            origin: None,
            map: TileLayer::default(),
            webserver,
            mock_players,
        }
    }
}
