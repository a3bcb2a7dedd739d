//! Actor infrastructure -- shared trait, startup, and resolution from config.

pub mod mock;
pub mod system;
pub mod web;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::broadcast;

use crate::bus::{BusReceiver, BusSender};
use crate::state::SystemState;
use crate::state::config::{PlayermapConfig, global_id};
use playermap::PlayermapMessage;

// ---------------------------------------------------------------------------
// Actor trait
// ---------------------------------------------------------------------------

/// What `Actor::reconfigure()` decided after a config change.
pub enum ReconfigureOutcome {
    NoChange,
    /// Applied without a restart.
    Applied,
    /// Stop and recreate (bind address or population parameters changed).
    RestartRequired,
}

/// A self-managed actor. Each holds its own construction params; `start()`
/// clones what it needs and spawns a thread.
pub trait Actor: Send + Sync {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver);

    /// Request a stop. Most actors just watch `BusReceiver::is_shutdown()`.
    fn stop(&self) {}

    fn reconfigure(&self, _state: &Arc<SystemState>, _sender: &BusSender) -> ReconfigureOutcome {
        ReconfigureOutcome::NoChange
    }
}

// ---------------------------------------------------------------------------
// Actor resolution
// ---------------------------------------------------------------------------

pub struct ResolvedActor {
    pub id: String,
    pub name: String,
    pub actor: Box<dyn Actor>,
}

/// Every actor the config asks for. Invalid bind addresses are logged and
/// skipped.
pub fn resolve_actors(config: &PlayermapConfig) -> Vec<ResolvedActor> {
    let mut actors = Vec::new();

    for (index, section) in &config.mock_players {
        let id = global_id("mock_players", index);
        actors.push(ResolvedActor {
            id,
            name: section.name.clone(),
            actor: Box::new(mock::presence::MockPresenceActor::new(
                section.clone(),
                section.generator_settings(&config.generator),
            )),
        });
    }

    for (index, ws) in &config.webserver {
        let id = global_id("webserver", index);
        match ws.bind.parse::<SocketAddr>() {
            Ok(addr) => actors.push(ResolvedActor {
                id,
                name: ws.name.clone(),
                actor: Box::new(web::WebActor::new(addr)),
            }),
            Err(e) => {
                tracing::warn!("webserver '{id}': invalid bind address '{}': {e}", ws.bind);
            }
        }
    }

    actors
}

/// Wire bus handles, call `start()`, and register the actor.
pub fn start_actor(
    id: String,
    actor: Box<dyn Actor>,
    state: &Arc<SystemState>,
    bus_tx: &broadcast::Sender<PlayermapMessage>,
) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let sender = BusSender::new(id.clone(), bus_tx.clone(), Arc::clone(&shutdown));
    let receiver = sender.subscribe();
    actor.start(Arc::clone(state), sender, receiver);
    state.register_actor(id, actor, shutdown);
}

/// Actor ID -> display name, for the status view.
pub fn actor_names(config: &PlayermapConfig) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for (index, section) in &config.mock_players {
        names.insert(global_id("mock_players", index), section.name.clone());
    }
    for (index, ws) in &config.webserver {
        names.insert(global_id("webserver", index), ws.name.clone());
    }
    names
}

#[cfg(test)]
mod tests {
    use playermap::WebserverSection;

    use super::*;

    #[test]
    fn resolves_configured_sections() {
        let mut config = PlayermapConfig::default();
        config.webserver.insert(
            "bad".into(),
            WebserverSection {
                name: "Broken".into(),
                bind: "not-an-address".into(),
            },
        );
        let mut ids: Vec<_> = resolve_actors(&config).into_iter().map(|a| a.id).collect();
        ids.sort();
        assert_eq!(ids, ["mock_players.0", "webserver.0"]);

        let names = actor_names(&config);
        assert_eq!(names["webserver.0"], "Web Server");
        assert_eq!(names["webserver.bad"], "Broken");
    }
}
