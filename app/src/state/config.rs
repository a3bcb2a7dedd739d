//! Configuration loading, caching, and persistence.
//!
//! The TOML file (~/.config/playermap/config.toml) holds global sections
//! (`[generator]`, `[origin]`, `[map]`) and type-prefixed actor sections
//! (`[webserver.<id>]`, `[mock_players.<id>]`).

use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub use playermap::PlayermapConfig;

/// Global actor ID from a type prefix and index: `"webserver.0"`.
pub fn global_id(prefix: &str, index: &str) -> String {
    format!("{prefix}.{index}")
}

/// Short random ID (8 hex chars) for WebSocket sources and request IDs.
pub fn generate_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

// ---------------------------------------------------------------------------
// Persistence I/O
// ---------------------------------------------------------------------------

/// `~/.config/playermap/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playermap")
        .join("config.toml")
}

/// Load config from disk. A missing file is created with defaults; an
/// unreadable or unparseable one is logged and replaced by defaults in memory.
pub fn load(path: &Path) -> PlayermapConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<PlayermapConfig>(&contents) {
            Ok(config) => {
                tracing::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                PlayermapConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = PlayermapConfig::default();
            tracing::info!("no config file found, creating {}", path.display());
            save_to(path, &defaults);
            defaults
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", path.display());
            PlayermapConfig::default()
        }
    }
}

/// Write config to `path`, creating parent dirs. Failures are logged.
pub fn save_to(path: &Path, config: &PlayermapConfig) {
    if let Some(dir) = path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        tracing::warn!("failed to create config dir {}: {e}", dir.display());
        return;
    }
    match toml::to_string_pretty(config) {
        Ok(contents) => {
            if let Err(e) = std::fs::write(path, contents) {
                tracing::warn!("failed to write {}: {e}", path.display());
            }
        }
        Err(e) => tracing::warn!("failed to serialize config: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Cached config
// ---------------------------------------------------------------------------

/// Cached configuration backed by the TOML file.
///
/// Reads clone under a read guard. Writes mutate the cached copy and
/// persist it. Mutations are serialized through `SystemActor`.
pub struct SystemConfig {
    path: PathBuf,
    inner: RwLock<PlayermapConfig>,
}

impl SystemConfig {
    pub fn new(path: PathBuf) -> Self {
        let config = load(&path);
        Self {
            path,
            inner: RwLock::new(config),
        }
    }

    pub fn snapshot(&self) -> PlayermapConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut PlayermapConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
        save_to(&self.path, &guard);
    }

    pub fn replace(&self, new: PlayermapConfig) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = new;
        save_to(&self.path, &guard);
    }
}

#[cfg(test)]
mod tests {
    use playermap::Coordinate;

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("playermap-config-{}", generate_id()))
            .join("config.toml")
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = temp_path();
        let config = load(&path);
        assert_eq!(config, PlayermapConfig::default());
        assert!(path.exists());
        assert_eq!(load(&path), config);
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "webserver = [[[").unwrap();
        assert_eq!(load(&path), PlayermapConfig::default());
    }

    #[test]
    fn hand_written_sections_load() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
[origin]
lat = 51.5074
lng = -0.1278

[generator]
count = 25

[webserver.0]
bind = "127.0.0.1:4040"

[mock_players.london]
name = "London"
count = 8
"#,
        )
        .unwrap();
        let config = load(&path);
        assert_eq!(config.origin, Some(Coordinate::new(51.5074, -0.1278)));
        assert_eq!(config.generator.count, 25);
        assert_eq!(config.webserver["0"].bind, "127.0.0.1:4040");
        assert_eq!(config.mock_players["london"].count, 8);
        assert_eq!(config.mock_players["london"].interval_secs, 30);
    }

    #[test]
    fn updates_persist() {
        let path = temp_path();
        let system = SystemConfig::new(path.clone());
        system.update(|c| {
            c.mock_players.clear();
            c.origin = Some(Coordinate::new(19.076, 72.8777));
        });
        let reloaded = load(&path);
        assert!(reloaded.mock_players.is_empty());
        assert_eq!(reloaded.origin, Some(Coordinate::new(19.076, 72.8777)));
        assert_eq!(system.snapshot(), reloaded);
    }
}
