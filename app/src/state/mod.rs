pub mod config;
mod locations;

pub use locations::{LocationState, LocationWriter};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::actors::{Actor, ReconfigureOutcome};
use crate::bus::BusSender;
use config::SystemConfig;

/// Root of all managed application state, shared as `Arc<SystemState>` by
/// every actor and the web layer.
pub struct SystemState {
    pub system: SystemConfig,
    pub locations: LocationState,
    /// Built web UI (index.html + wasm bundle) to serve at `/`, from `--ui-dir`.
    pub ui_dir: Option<PathBuf>,
    actors: RwLock<HashMap<String, (Box<dyn Actor>, Arc<AtomicBool>)>>,
}

impl SystemState {
    pub fn new(config_path: PathBuf, ui_dir: Option<PathBuf>) -> (Self, LocationWriter) {
        let (locations, writer) = LocationState::new();
        (
            Self {
                system: SystemConfig::new(config_path),
                locations,
                ui_dir,
                actors: RwLock::new(HashMap::new()),
            },
            writer,
        )
    }

    // ----- Actor registry -----

    pub fn register_actor(&self, id: String, actor: Box<dyn Actor>, shutdown: Arc<AtomicBool>) {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (actor, shutdown));
    }

    pub fn actor_ids(&self) -> Vec<String> {
        self.actors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// `reconfigure()` on the actor `id`; `None` if it is not registered.
    pub fn reconfigure_actor(
        &self,
        id: &str,
        state: &Arc<SystemState>,
        sender: &BusSender,
    ) -> Option<ReconfigureOutcome> {
        let guard = self.actors.read().unwrap_or_else(|e| e.into_inner());
        guard.get(id).map(|(a, _)| a.reconfigure(state, sender))
    }

    /// Raise the actor's shutdown flag and call `stop()`.
    pub fn stop_actor(&self, id: &str) {
        let guard = self.actors.read().unwrap_or_else(|e| e.into_inner());
        if let Some((actor, shutdown)) = guard.get(id) {
            shutdown.store(true, Ordering::Relaxed);
            actor.stop();
        }
    }

    pub fn remove_actor(&self, id: &str) -> Option<Box<dyn Actor>> {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .map(|(a, _)| a)
    }
}

/// Fresh state backed by a throwaway config file under the temp dir.
#[cfg(test)]
pub fn test_state() -> (Arc<SystemState>, LocationWriter) {
    let path = std::env::temp_dir()
        .join(format!("playermap-test-{}", uuid::Uuid::new_v4().simple()))
        .join("config.toml");
    let (state, writer) = SystemState::new(path, None);
    (Arc::new(state), writer)
}
