//! Axum web server -- location REST API, presence WebSocket, UI hosting.

pub mod routes;
pub mod ws;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::get;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::actors::{Actor, ReconfigureOutcome, actor_names};
use crate::bus::{BusReceiver, BusSender};
use crate::state::SystemState;
use playermap::{
    ActorState, ActorStatus, ActorStatusResponse, PlayermapEvent, PlayermapMessage,
};

fn new_actor(name: String) -> ActorStatusResponse {
    ActorStatusResponse {
        name,
        status: ActorStatus::Disconnected,
        telemetry: HashMap::new(),
    }
}

/// Shared state for the web layer.
pub struct WebState {
    pub root: Arc<SystemState>,
    pub bus_tx: broadcast::Sender<PlayermapMessage>,
    pub actors: RwLock<HashMap<String, ActorStatusResponse>>,
    pub addr: SocketAddr,
    pub actor_id: String,
    pub ws_count: AtomicU64,
    pub request_count: AtomicU64,
}

impl WebState {
    pub fn new(
        root: Arc<SystemState>,
        bus_tx: broadcast::Sender<PlayermapMessage>,
        addr: SocketAddr,
        actor_id: String,
    ) -> Self {
        let actors = actor_names(&root.system.snapshot())
            .into_iter()
            .map(|(id, name)| (id, new_actor(name)))
            .collect();
        Self {
            root,
            bus_tx,
            actors: RwLock::new(actors),
            addr,
            actor_id,
            ws_count: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
        }
    }

    /// Publish on the bus as this web server.
    pub fn publish(&self, event: impl Into<PlayermapEvent>) {
        let _ = self
            .bus_tx
            .send(PlayermapMessage::new(event).source(&self.actor_id));
    }
}

fn emit_status(status: ActorStatus, state: &WebState) {
    let mut telemetry = HashMap::from([
        ("bind".into(), state.addr.to_string()),
        (
            "websockets".into(),
            state.ws_count.load(Ordering::Relaxed).to_string(),
        ),
        (
            "requests".into(),
            state.request_count.load(Ordering::Relaxed).to_string(),
        ),
    ]);
    if status == ActorStatus::Disconnected {
        telemetry.insert("error".into(), "bind failed".into());
    }
    state.publish(ActorState::new(status, telemetry));
}

/// Connected telemetry (periodic emitter + ws connect/disconnect).
pub(super) fn emit_telemetry(state: &WebState) {
    emit_status(ActorStatus::Connected, state);
}

// ---------------------------------------------------------------------------
// WebActor
// ---------------------------------------------------------------------------

/// Web server actor. Runs axum on a dedicated thread with its own runtime.
pub struct WebActor {
    addr: SocketAddr,
    shutdown_tx: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl WebActor {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            shutdown_tx: Mutex::new(None),
        }
    }
}

impl Actor for WebActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, _receiver: BusReceiver) {
        let addr = self.addr;
        let actor_id = sender.actor_id().to_string();
        let bus_tx = sender.raw_sender().clone();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        *self.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);

        let spawned = std::thread::Builder::new()
            .name(actor_id.clone())
            .spawn(move || {
                let rt = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("web server '{actor_id}': failed to create runtime: {e}");
                        return;
                    }
                };
                let state = Arc::new(WebState::new(state, bus_tx, addr, actor_id));
                rt.block_on(run(state, shutdown_rx));
            });
        if let Err(e) = spawned {
            tracing::error!("web server: failed to spawn thread: {e}");
        }
    }

    fn stop(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.send(());
        }
    }

    fn reconfigure(&self, state: &Arc<SystemState>, sender: &BusSender) -> ReconfigureOutcome {
        let snap = state.system.snapshot();
        let index = sender.actor_id().strip_prefix("webserver.").unwrap_or("0");
        let new_bind = snap.webserver.get(index).map(|w| w.bind.as_str());
        match new_bind.and_then(|b| b.parse::<SocketAddr>().ok()) {
            Some(new_addr) if new_addr == self.addr => ReconfigureOutcome::NoChange,
            _ => ReconfigureOutcome::RestartRequired,
        }
    }
}

// ---------------------------------------------------------------------------
// Router + run loop
// ---------------------------------------------------------------------------

/// API routes, plus the built UI when `ui_dir` is configured.
pub fn router(state: Arc<WebState>) -> Router {
    let counter_state = Arc::clone(&state);
    let count_middleware = axum::middleware::from_fn(move |req, next: axum::middleware::Next| {
        let st = Arc::clone(&counter_state);
        async move {
            st.request_count.fetch_add(1, Ordering::Relaxed);
            next.run(req).await
        }
    });

    let api = Router::new()
        .route("/api/status", get(routes::get_status))
        .route(
            "/api/location",
            get(routes::get_location).post(routes::post_location),
        )
        .route(
            "/api/settings",
            get(routes::get_settings).post(routes::post_settings),
        )
        .route("/api/ws", get(ws::ws_upgrade));

    let app = match &state.root.ui_dir {
        Some(dir) => api.fallback_service(
            ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html"))),
        ),
        None => api.route("/", get(routes::get_index)),
    };

    app.layer(count_middleware)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run(state: Arc<WebState>, shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
    let addr = state.addr;

    tokio::spawn(state_updater(Arc::clone(&state), state.bus_tx.subscribe()));

    let telemetry_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            emit_telemetry(&telemetry_state);
        }
    });

    let app = router(Arc::clone(&state));

    // Retry bind until success or shutdown
    let mut shutdown_rx = shutdown_rx;
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => break l,
            Err(e) => {
                tracing::warn!("web server: failed to bind {addr}: {e}, retrying in 3s");
                emit_status(ActorStatus::Disconnected, &state);
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(3)) => continue,
                    _ = &mut shutdown_rx => return,
                }
            }
        }
    };

    match &state.root.ui_dir {
        Some(dir) => tracing::info!("web server listening on {addr} (ui: {})", dir.display()),
        None => tracing::info!("web server listening on {addr} (api only)"),
    }
    emit_status(ActorStatus::Connected, &state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async { drop(shutdown_rx.await) })
        .await
        .ok();
}

/// Keeps the cached actor table current from the bus.
async fn state_updater(state: Arc<WebState>, mut bus_rx: broadcast::Receiver<PlayermapMessage>) {
    loop {
        match bus_rx.recv().await {
            Ok(msg) => apply_bus_event(&state, &msg).await,
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("web state updater: lagged, dropped {n} events");
            }
        }
    }
}

async fn apply_bus_event(state: &WebState, msg: &PlayermapMessage) {
    match &msg.event {
        PlayermapEvent::ActorStatus(update) => {
            let mut actors = state.actors.write().await;
            let actor = actors
                .entry(msg.source.clone())
                .or_insert_with(|| new_actor(String::new()));
            actor.status = update.status;
            actor.telemetry = update.telemetry.clone();
        }
        PlayermapEvent::ConfigOutcome(result)
            if !result.started.is_empty()
                || !result.stopped.is_empty()
                || !result.restarted.is_empty() =>
        {
            let names = actor_names(&state.root.system.snapshot());
            let mut actors = state.actors.write().await;
            for (id, name) in names {
                let entry = actors.entry(id).or_insert_with(|| new_actor(name.clone()));
                entry.name = name;
            }
            for id in &result.stopped {
                actors.remove(id);
            }
        }
        // Presence lands in the store via SystemActor.
        _ => {}
    }
}

#[cfg(test)]
pub(crate) fn test_web_state() -> (Arc<WebState>, crate::state::LocationWriter) {
    let (root, writer) = crate::state::test_state();
    let (bus_tx, _) = broadcast::channel(64);
    let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
    let state = WebState::new(root, bus_tx, addr, "webserver.0".into());
    (Arc::new(state), writer)
}
