//! System actor -- always-on housekeeping for `SystemState`.
//!
//! Holds the only `LocationWriter`: every presence event on the bus (REST
//! writes, WebSocket reports, simulated players) lands in the location store
//! here. Also processes `ConfigCommand` events and reconciles the running
//! actor set. Runs independently of the web server, so the store stays
//! consistent in headless mode too.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::actors::{Actor, ReconfigureOutcome, ResolvedActor, resolve_actors, start_actor};
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::{LocationWriter, SystemState};
use playermap::{
    ConfigAction, ConfigCommand, ConfigOutcome, PlayermapEvent, PlayermapMessage, PresenceEvent,
};

// ---------------------------------------------------------------------------
// Config reload
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct ConfigReloadOutcome {
    pub applied: Vec<String>,
    pub restarted: Vec<String>,
    pub stopped: Vec<String>,
    pub started: Vec<String>,
}

/// Bring the running actors in line with the current config.
///
/// Removed sections are stopped, surviving actors are asked to
/// `reconfigure()` (and restarted when they say so), new sections are
/// started. With `scope`, only that actor ID is considered.
pub(crate) fn apply_config_reload(
    state: &Arc<SystemState>,
    bus_tx: &broadcast::Sender<PlayermapMessage>,
    scope: Option<&str>,
) -> ConfigReloadOutcome {
    let snap = state.system.snapshot();
    let mut expected: HashMap<String, ResolvedActor> = resolve_actors(&snap)
        .into_iter()
        .map(|ra| (ra.id.clone(), ra))
        .collect();
    let current: Vec<String> = state
        .actor_ids()
        .into_iter()
        .filter(|id| id != "system")
        .collect();

    let in_scope = |id: &str| scope.is_none_or(|s| s == id);
    let mut result = ConfigReloadOutcome::default();

    for id in current.iter().filter(|id| in_scope(id.as_str())) {
        if !expected.contains_key(id) {
            tracing::info!("config reload: stopping removed actor '{id}'");
            state.stop_actor(id);
            state.remove_actor(id);
            result.stopped.push(id.clone());
            continue;
        }

        let sender = BusSender::new(id.clone(), bus_tx.clone(), Arc::new(AtomicBool::new(false)));
        match state.reconfigure_actor(id, state, &sender) {
            Some(ReconfigureOutcome::Applied) => {
                tracing::info!("config reload: applied in-place for '{id}'");
                result.applied.push(id.clone());
            }
            Some(ReconfigureOutcome::RestartRequired) => {
                tracing::info!("config reload: restarting '{id}'");
                state.stop_actor(id);
                state.remove_actor(id);
                // Give the old thread a beat to release its socket.
                std::thread::sleep(Duration::from_millis(100));
                if let Some(ra) = expected.remove(id) {
                    start_actor(ra.id, ra.actor, state, bus_tx);
                    result.restarted.push(id.clone());
                }
            }
            Some(ReconfigureOutcome::NoChange) | None => {}
        }
    }

    let mut new_ids: Vec<String> = expected
        .keys()
        .filter(|id| !current.contains(*id) && in_scope(id.as_str()))
        .cloned()
        .collect();
    new_ids.sort();
    for id in new_ids {
        if let Some(ra) = expected.remove(&id) {
            tracing::info!("config reload: starting new actor '{id}'");
            start_actor(ra.id, ra.actor, state, bus_tx);
            result.started.push(id);
        }
    }

    result
}

// ---------------------------------------------------------------------------
// System actor
// ---------------------------------------------------------------------------

/// Parts moved into the system thread on `start()`.
struct SystemParts {
    writer: LocationWriter,
    state: Arc<SystemState>,
    bus_tx: broadcast::Sender<PlayermapMessage>,
    ready_tx: std_mpsc::SyncSender<()>,
}

/// Always-on, not config-driven.
pub struct SystemActor {
    parts: Mutex<Option<SystemParts>>,
}

impl SystemActor {
    pub fn new(
        writer: LocationWriter,
        state: Arc<SystemState>,
        bus_tx: broadcast::Sender<PlayermapMessage>,
    ) -> (Self, std_mpsc::Receiver<()>) {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(0);
        let actor = Self {
            parts: Mutex::new(Some(SystemParts {
                writer,
                state,
                bus_tx,
                ready_tx,
            })),
        };
        (actor, ready_rx)
    }
}

impl Actor for SystemActor {
    fn start(&self, _state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let Some(parts) = self.parts.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            tracing::warn!("system actor: already started");
            return;
        };
        if let Err(e) = std::thread::Builder::new()
            .name("system".into())
            .spawn(move || run(parts, sender, receiver))
        {
            tracing::error!("system actor: failed to spawn thread: {e}");
        }
    }
}

fn run(parts: SystemParts, sender: BusSender, mut receiver: BusReceiver) {
    let SystemParts {
        writer,
        state,
        bus_tx,
        ready_tx,
    } = parts;

    // Main thread waits on this before starting other actors.
    let _ = ready_tx.send(());
    drop(ready_tx);

    loop {
        match receiver.poll() {
            Err(PollError::Shutdown) => return,
            Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            Ok(Some(msg)) => match &msg.event {
                PlayermapEvent::Presence(event) => apply_presence(&writer, event),
                PlayermapEvent::ConfigCommand(cmd) => {
                    handle_config_command(cmd, &state, &bus_tx, &sender);
                }
                _ => {}
            },
        }
    }
}

/// Apply one presence event to the store.
pub(crate) fn apply_presence(writer: &LocationWriter, event: &PresenceEvent) {
    match event {
        PresenceEvent::Recorded { record } => writer.upsert(record.as_ref().clone()),
        PresenceEvent::Updated { report, .. } => {
            writer.apply_report(report.clone(), Utc::now());
        }
        PresenceEvent::Offline { user_id, .. } => {
            if !writer.mark_offline(user_id, Utc::now()) {
                tracing::debug!("presence: offline for unknown user '{user_id}'");
            }
        }
    }
}

fn handle_config_command(
    cmd: &ConfigCommand,
    state: &Arc<SystemState>,
    bus_tx: &broadcast::Sender<PlayermapMessage>,
    sender: &BusSender,
) {
    let scope = match &cmd.action {
        ConfigAction::ReplaceAll { config } => {
            state.system.replace(config.as_ref().clone());
            None
        }
        ConfigAction::UpsertWebserver { index, section } => {
            state.system.update(|c| {
                c.webserver.insert(index.clone(), section.clone());
            });
            Some(format!("webserver.{index}"))
        }
        ConfigAction::UpsertMockPlayers { index, section } => {
            state.system.update(|c| {
                c.mock_players.insert(index.clone(), section.clone());
            });
            Some(format!("mock_players.{index}"))
        }
        ConfigAction::Remove { id } => {
            let Some((prefix, index)) = id.split_once('.') else {
                tracing::warn!("config remove: invalid id '{id}'");
                return;
            };
            state.system.update(|c| match prefix {
                "webserver" => {
                    c.webserver.remove(index);
                }
                "mock_players" => {
                    c.mock_players.remove(index);
                }
                _ => tracing::warn!("config remove: unknown prefix '{prefix}'"),
            });
            Some(id.clone())
        }
    };

    let result = apply_config_reload(state, bus_tx, scope.as_deref());

    if let Some(request_id) = &cmd.request_id {
        sender.send(PlayermapMessage::new(ConfigOutcome {
            request_id: request_id.clone(),
            restarted: result.restarted,
            stopped: result.stopped,
            started: result.started,
        }));
    }
}
