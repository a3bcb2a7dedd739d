//! egui application: PlayermapApp.

use std::collections::HashMap;
use std::time::Duration;

use chrono::SecondsFormat;
use playermap::{
    Clipboard, ClipboardError, Coordinate, CopyFeedback, FilterCriteria, GeneratorSettings,
    GeolocationOptions, LocationRequest, MapView, Player, PopulationCache, PopulationGenerator,
    TileLayer, filter_players, unique_games,
};

use crate::geolocate;
use crate::net::{self, PendingHandle, WsPollEvent};
use crate::panels::Tab;
use crate::storage::{self, PlatformStore};
use crate::tilemap::TileMap;
use crate::types::{
    ActorState, ActorStatus, ActorStatusResponse, LogEntry, PlayermapEvent, PlayermapMessage,
};

/// Radius announced when joining the presence room around the origin.
const ROOM_RADIUS_KM: f64 = 10.0;

const MAX_LOG_ENTRIES: usize = 500;

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

/// Clipboard backed by egui's platform output.
struct EguiClipboard<'a>(&'a egui::Context);

impl Clipboard for EguiClipboard<'_> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.0.copy_text(text.to_owned());
        Ok(())
    }
}

/// Fresh seed per population so every uncached load differs.
fn population_seed() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .unsigned_abs()
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct PlayermapApp {
    // Location
    pub(crate) location: Option<LocationRequest>,
    pub(crate) origin: Option<Coordinate>,
    pub(crate) advisory: Option<String>,

    // Population
    pub(crate) generator: GeneratorSettings,
    pub(crate) cache: PopulationCache<PlatformStore>,
    pub(crate) players: Vec<Player>,
    pub(crate) games: Vec<String>,
    pub(crate) criteria: FilterCriteria,
    pub(crate) filtered: Vec<Player>,

    // Map
    pub(crate) map: MapView<TileMap>,
    pub(crate) map_stale: bool,
    pub(crate) copy_feedback: CopyFeedback,

    // Networking
    pub(crate) pending: PendingHandle,
    pub(crate) ws_sender: Option<ewebsock::WsSender>,
    pub(crate) ws_receiver: Option<ewebsock::WsReceiver>,
    pub(crate) ws_connected: bool,
    pub(crate) ws_ever_connected: bool,
    pub(crate) room_joined: bool,
    pub(crate) actors: HashMap<String, ActorStatusResponse>,
    pub(crate) store_counts: Option<(usize, usize)>,

    // UI state
    pub(crate) active_tab: Tab,

    // Log state
    pub(crate) log_entries: Vec<LogEntry>,
    pub(crate) log_auto_scroll: bool,
    pub(crate) log_type_filters: HashMap<String, bool>,
    /// Alert level filter: 0 = error only, 1 = warn (includes error). Default: warn.
    pub(crate) log_alert_filter: usize,
}

impl PlayermapApp {
    /// `fixed_origin` replaces host geolocation when set.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        fixed_origin: Option<Coordinate>,
        generator: GeneratorSettings,
        tiles: TileLayer,
    ) -> Self {
        let app = Self::with_context(&cc.egui_ctx, fixed_origin, generator, tiles);
        net::fetch_status(&cc.egui_ctx, &app.pending);
        // WebSocket connects on the first update(), once the page has settled.
        app
    }

    pub(crate) fn with_context(
        ctx: &egui::Context,
        fixed_origin: Option<Coordinate>,
        generator: GeneratorSettings,
        tiles: TileLayer,
    ) -> Self {
        let now = ctx.input(|i| i.time);
        let mut geolocator = geolocate::platform_geolocator(fixed_origin);
        let location =
            LocationRequest::start(geolocator.as_mut(), &GeolocationOptions::default(), now);

        Self {
            location: Some(location),
            origin: None,
            advisory: None,
            generator,
            cache: PopulationCache::new(storage::platform_store()),
            players: Vec::new(),
            games: Vec::new(),
            criteria: FilterCriteria::default(),
            filtered: Vec::new(),
            map: MapView::new(tiles),
            map_stale: false,
            copy_feedback: CopyFeedback::default(),
            pending: net::new_pending(),
            ws_sender: None,
            ws_receiver: None,
            ws_connected: false,
            ws_ever_connected: false,
            room_joined: false,
            actors: HashMap::new(),
            store_counts: None,
            active_tab: Tab::Nearby,
            log_entries: Vec::new(),
            log_auto_scroll: true,
            log_type_filters: crate::panels::log::MESSAGE_TYPES
                .iter()
                .map(|&k| (k.to_string(), true))
                .collect(),
            log_alert_filter: 1,
        }
    }

    /// Take the location outcome once it lands.
    pub(crate) fn poll_location(&mut self, ctx: &egui::Context) {
        let Some(request) = &self.location else {
            return;
        };
        let now = ctx.input(|i| i.time);
        let Some(outcome) = request.poll(now) else {
            ctx.request_repaint_after(Duration::from_millis(250));
            return;
        };
        self.location = None;
        if let Some(advisory) = &outcome.advisory {
            log::warn!("{advisory}");
        }
        self.advisory = outcome.advisory;
        self.set_origin(ctx, outcome.origin);
    }

    fn set_origin(&mut self, ctx: &egui::Context, origin: Coordinate) {
        self.origin = Some(origin);

        let settings = self.generator.clone();
        let seed = population_seed();
        let (players, source) = self.cache.load_or_generate(origin, |o| {
            PopulationGenerator::seeded(seed).generate(o, &settings)
        });
        log::info!(
            "{} players near ({:.4}, {:.4}) [{source:?}]",
            players.len(),
            origin.lat,
            origin.lng
        );
        self.games = unique_games(&players);
        self.players = players;
        self.refilter();

        self.map.mount(origin, |o, zoom| TileMap::new(ctx, o, zoom));
        self.join_room();
    }

    pub(crate) fn refilter(&mut self) {
        self.filtered = filter_players(&self.players, &self.criteria);
        self.map_stale = true;
    }

    /// Push the filtered population to the map when it changed.
    pub(crate) fn sync_map(&mut self) {
        if !self.map_stale {
            return;
        }
        if let Some(origin) = self.origin {
            self.map.sync(origin, &self.filtered);
            self.map_stale = false;
        }
    }

    pub(crate) fn copy_handle(&mut self, ctx: &egui::Context, handle: &str) {
        let now = ctx.input(|i| i.time);
        let mut clipboard = EguiClipboard(ctx);
        if let Err(e) = self.copy_feedback.copy(&mut clipboard, handle, now) {
            log::warn!("copy {handle}: {e}");
        }
    }

    fn join_room(&mut self) {
        if self.room_joined {
            return;
        }
        if let (Some(origin), Some(tx)) = (self.origin, &mut self.ws_sender)
            && self.ws_connected
        {
            net::send_join_location(tx, origin, ROOM_RADIUS_KM);
            self.room_joined = true;
        }
    }

    /// Drain pending REST results.
    fn apply_pending(&mut self) {
        let Ok(mut p) = self.pending.try_lock() else {
            return;
        };
        if let Some(status) = p.status.take() {
            self.store_counts = Some((status.locations, status.online));
            for (id, a) in status.actors {
                self.actors.insert(id, a);
            }
        }
    }

    /// Poll WebSocket for bus events.
    fn poll_ws(&mut self) {
        let Some(rx) = &mut self.ws_receiver else {
            return;
        };
        let mut ws_disconnected = false;
        for event in net::poll_ws(rx) {
            match event {
                WsPollEvent::Opened => {
                    if let Some(tx) = &mut self.ws_sender {
                        net::send_ws_start(tx);
                    }
                }
                WsPollEvent::Init {
                    locations, online, ..
                } => {
                    self.store_counts = Some((locations, online));
                    self.room_joined = false;
                    self.join_room();
                }
                WsPollEvent::Message(msg) => self.handle_bus_event(msg),
                WsPollEvent::Error(_) => ws_disconnected = true,
                WsPollEvent::Disconnected => {
                    self.actors.clear();
                    ws_disconnected = true;
                }
            }
        }
        if ws_disconnected {
            self.ws_sender = None;
            self.ws_receiver = None;
            self.ws_connected = false;
            self.room_joined = false;
        }
    }

    pub(crate) fn handle_bus_event(&mut self, msg: PlayermapMessage) {
        {
            use crate::panels::log::{alert_level, event_debug, message_type};

            let source_name = self
                .actors
                .get(&msg.source)
                .map(|a| a.name.clone())
                .unwrap_or_default();
            self.log_entries.push(LogEntry {
                timestamp: msg.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                source_name,
                source_id: msg.source.clone(),
                message_type: message_type(&msg.event).to_string(),
                event_debug: event_debug(&msg.event),
                alert_level: alert_level(&msg.event),
            });
            if self.log_entries.len() > MAX_LOG_ENTRIES {
                self.log_entries
                    .drain(..self.log_entries.len() - MAX_LOG_ENTRIES);
            }
        }

        if let PlayermapEvent::ActorStatus(update) = msg.event {
            self.handle_actor_status(&msg.source, update);
        }
    }

    fn handle_actor_status(&mut self, source: &str, update: ActorState) {
        let actor = self
            .actors
            .entry(source.to_string())
            .or_insert_with(|| ActorStatusResponse {
                name: String::new(),
                status: ActorStatus::Disconnected,
                telemetry: HashMap::new(),
            });
        actor.status = update.status;
        actor.telemetry = update.telemetry;
    }

    fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.active_tab, Tab::Nearby, "Nearby");
            ui.selectable_value(&mut self.active_tab, Tab::Log, "Log");
            ui.separator();

            let dim = egui::Color32::from_rgb(140, 140, 140);
            if self.ws_connected {
                let text = match self.store_counts {
                    Some((total, online)) => format!("server: {online}/{total} online"),
                    None => "server: connected".to_string(),
                };
                ui.label(egui::RichText::new(text).size(12.0).color(dim));
            } else {
                ui.label(egui::RichText::new("server: offline").size(12.0).color(dim));
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new("PLAYER MAP")
                        .strong()
                        .size(14.0)
                        .color(dim),
                );
            });
        });
    }

    fn render_advisories(&self, ui: &mut egui::Ui, now: f64) {
        let warn = egui::Color32::from_rgb(255, 200, 60);
        if let Some(advisory) = &self.advisory {
            ui.label(egui::RichText::new(format!("⚠ {advisory}")).color(warn));
        }
        if let Some(text) = self.copy_feedback.advisory(now) {
            ui.label(egui::RichText::new(text).color(egui::Color32::from_rgb(16, 185, 129)));
        }
    }
}

impl Drop for PlayermapApp {
    fn drop(&mut self) {
        // A late geolocation answer must not land on a dead view.
        if let Some(request) = &self.location {
            request.cancel();
        }
    }
}

impl eframe::App for PlayermapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Connect WebSocket on first frame only. No auto-reconnect.
        if self.ws_sender.is_none()
            && !self.ws_ever_connected
            && let Some((tx, rx)) = net::connect_ws()
        {
            self.ws_sender = Some(tx);
            self.ws_receiver = Some(rx);
            self.ws_connected = true;
            self.ws_ever_connected = true;
        }
        if self.ws_connected {
            // Poll for WebSocket events ~10x/sec instead of only on user input.
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.apply_pending();
        self.poll_ws();
        self.poll_location(ctx);

        let now = ctx.input(|i| i.time);
        if self.copy_feedback.expire(now) {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.render_header(ui);
            self.render_advisories(ui, now);
            if self.active_tab == Tab::Nearby {
                ui.separator();
                let before = self.criteria.clone();
                self.render_filter_bar(ui);
                if self.criteria != before {
                    self.refilter();
                }
            }
        });

        match self.active_tab {
            Tab::Nearby => {
                egui::SidePanel::right("player_list")
                    .resizable(true)
                    .default_width(320.0)
                    .show(ctx, |ui| {
                        if let Some(handle) = self.render_player_list(ui, now) {
                            self.copy_handle(ui.ctx(), &handle);
                        }
                    });
                self.sync_map();
                egui::CentralPanel::default()
                    .frame(egui::Frame::new())
                    .show(ctx, |ui| {
                        if let Some(handle) = self.render_map(ui, now) {
                            self.copy_handle(ui.ctx(), &handle);
                        }
                    });
            }
            Tab::Log => {
                egui::CentralPanel::default().show(ctx, |ui| self.render_log_panel(ui));
            }
        }
    }
}
