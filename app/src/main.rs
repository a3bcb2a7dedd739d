#![cfg_attr(
    all(target_os = "windows", feature = "gui"),
    windows_subsystem = "windows"
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod actors;
mod bus;
mod state;

use actors::Actor;
use bus::BusSender;
use playermap::{Coordinate, PlayermapMessage};
use state::SystemState;

#[derive(Parser, Debug, Clone)]
#[command(name = "playermap", about = "Nearby player discovery server and map")]
struct Config {
    /// Config file path (default: ~/.config/playermap/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without the native GUI window (web server only)
    #[arg(long)]
    headless: bool,

    /// Fixed origin latitude for the native map (overrides `[origin]`)
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Fixed origin longitude for the native map (overrides `[origin]`)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,

    /// Directory holding the built web UI, served at `/`
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

impl Config {
    fn origin_override(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("playermap=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Config::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(state::config::default_config_path);

    if let Some(dir) = &cli.ui_dir
        && !dir.join("index.html").is_file()
    {
        tracing::warn!("ui dir {} has no index.html", dir.display());
    }

    // eframe::run_native() needs the main thread, so the runtime is entered manually.
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let (bus_tx, _) = broadcast::channel::<PlayermapMessage>(1024);

    let (system_state, location_writer) = SystemState::new(config_path, cli.ui_dir.clone());
    let state = Arc::new(system_state);

    // The native GUI talks to the server over HTTP/WS, so make sure one exists.
    if !cli.headless && state.system.snapshot().webserver.is_empty() {
        state.system.update(|c| {
            c.webserver.insert(
                "0".into(),
                playermap::WebserverSection {
                    name: "Web Server".into(),
                    bind: "127.0.0.1:3030".into(),
                },
            );
        });
    }

    // System actor must be polling before anything else publishes.
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let sender = BusSender::new("system".into(), bus_tx.clone(), Arc::clone(&shutdown));
        let receiver = sender.subscribe();
        let (actor, ready_rx) =
            actors::system::SystemActor::new(location_writer, Arc::clone(&state), bus_tx.clone());
        actor.start(Arc::clone(&state), sender, receiver);
        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("system actor failed to start"))?;
        state.register_actor("system".into(), Box::new(actor), shutdown);
    }

    let snap = state.system.snapshot();
    for ra in actors::resolve_actors(&snap) {
        tracing::info!("starting actor '{}' ({})", ra.id, ra.name);
        actors::start_actor(ra.id, ra.actor, &state, &bus_tx);
    }

    // Keeps the broadcast channel drained when nothing else subscribes.
    let mut drain_rx = bus_tx.subscribe();
    let drain_handle = tokio::spawn(async move {
        loop {
            match drain_rx.recv().await {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("drain subscriber lagged, dropped {n} events");
                }
            }
        }
    });

    let origin = cli.origin_override().or(snap.origin);

    if cli.headless {
        tracing::info!("running headless (no native GUI)");
        rt.block_on(async { tokio::signal::ctrl_c().await })?;
    } else {
        #[cfg(feature = "gui")]
        {
            let web_addr: std::net::SocketAddr = state
                .system
                .snapshot()
                .webserver
                .values()
                .next()
                .and_then(|w| w.bind.parse().ok())
                .ok_or_else(|| anyhow::anyhow!("no valid webserver bind address in config"))?;
            let gui_url = if web_addr.ip().is_unspecified() {
                format!("http://127.0.0.1:{}", web_addr.port())
            } else {
                format!("http://{web_addr}")
            };
            playermap_ui::net::set_base_url(gui_url);

            let native_options = eframe::NativeOptions {
                viewport: egui::ViewportBuilder::default()
                    .with_inner_size([1200.0, 800.0])
                    .with_title("Player Map"),
                ..Default::default()
            };
            let settings = snap.generator.clone();
            let tiles = snap.map.clone();

            tracing::info!("launching native GUI");
            eframe::run_native(
                "Player Map",
                native_options,
                Box::new(move |cc| {
                    Ok(Box::new(playermap_ui::app::PlayermapApp::new(
                        cc, origin, settings, tiles,
                    )))
                }),
            )
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        #[cfg(not(feature = "gui"))]
        {
            let _ = origin;
            tracing::info!("running headless (built without gui feature)");
            rt.block_on(async { tokio::signal::ctrl_c().await })?;
        }
    }

    tracing::info!("shutting down...");
    for id in state.actor_ids() {
        state.stop_actor(&id);
    }
    drop(bus_tx);
    drain_handle.abort();

    Ok(())
}
