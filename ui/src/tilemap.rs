//! Slippy map widget: Web-Mercator raster tiles and markers painted with egui.
//!
//! `TileMap` is the egui-side `MapSurface`. Tiles are fetched with `ehttp`,
//! decoded with `image` off the UI thread (native) or in the fetch callback
//! (WASM), and uploaded as textures on the next frame. The tile cache is
//! shared by every map in one egui context and lives in its data store.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};
use playermap::{Bounds, Coordinate, MapSurface, MarkerIcon, Popup, SharedAssets, TileLayer};

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: u8 = 2;

/// Web-Mercator latitude limit.
const MAX_LAT: f64 = 85.051_128_78;

/// Scroll distance (points) per zoom step.
const SCROLL_PER_ZOOM: f32 = 60.0;

/// Cached tiles beyond this are evicted (other zoom levels first).
const MAX_CACHED_TILES: usize = 384;

/// Viewport assumed before the first paint.
const DEFAULT_VIEWPORT: [f64; 2] = [800.0, 600.0];

fn assets_id() -> egui::Id {
    egui::Id::new("playermap.tilemap.assets")
}

fn tiles_id() -> egui::Id {
    egui::Id::new("playermap.tilemap.tiles")
}

fn pulse_id() -> egui::Id {
    egui::Id::new("playermap.tilemap.pulse")
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn world_size(zoom: u8) -> f64 {
    TILE_SIZE * f64::from(1u32 << zoom)
}

/// World pixel position of `c` at `zoom`.
pub fn project(c: Coordinate, zoom: u8) -> (f64, f64) {
    let n = world_size(zoom);
    let lat = c.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = (c.lng + 180.0) / 360.0 * n;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

pub fn unproject(x: f64, y: f64, zoom: u8) -> Coordinate {
    let n = world_size(zoom);
    let lng = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    Coordinate::new(lat, lng)
}

/// Tile containing `c` at `zoom`.
pub fn tile_for(c: Coordinate, zoom: u8) -> TileId {
    let (x, y) = project(c, zoom);
    TileId {
        z: zoom,
        x: (x / TILE_SIZE).floor() as u32,
        y: (y / TILE_SIZE).floor() as u32,
    }
}

/// Deepest zoom (capped at `max_zoom`) at which `bounds` fits `viewport`.
pub fn fit_zoom(bounds: &Bounds, viewport: [f64; 2], max_zoom: u8) -> u8 {
    for z in (MIN_ZOOM..=max_zoom).rev() {
        let (x0, y0) = project(bounds.south_west, z);
        let (x1, y1) = project(bounds.north_east, z);
        if (x1 - x0).abs() <= viewport[0] && (y0 - y1).abs() <= viewport[1] {
            return z;
        }
    }
    MIN_ZOOM
}

// ---------------------------------------------------------------------------
// Shared assets
// ---------------------------------------------------------------------------

/// Online-marker pulse animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTiming {
    pub period_secs: f64,
    /// Ring growth beyond the marker radius, in points.
    pub spread: f32,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            period_secs: 1.6,
            spread: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

enum TileSlot {
    Loading,
    Decoded(egui::ColorImage),
    Ready(egui::TextureHandle),
    Failed,
}

/// Tile textures keyed by tile id. Cloning shares the cache.
#[derive(Clone, Default)]
pub struct TileCache {
    inner: Arc<Mutex<HashMap<TileId, TileSlot>>>,
}

impl TileCache {
    pub fn shares_with(&self, other: &TileCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Texture for `id`, or `None` while it loads. The first miss starts a fetch.
    fn texture(
        &self,
        ctx: &egui::Context,
        id: TileId,
        layer: &TileLayer,
    ) -> Option<egui::TextureHandle> {
        let mut tiles = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = tiles.get_mut(&id) else {
            if tiles.len() >= MAX_CACHED_TILES {
                tiles.retain(|k, _| k.z == id.z);
                if tiles.len() >= MAX_CACHED_TILES {
                    tiles.clear();
                }
            }
            tiles.insert(id, TileSlot::Loading);
            drop(tiles);
            self.fetch(ctx, id, layer.tile_url(id.z, id.x, id.y));
            return None;
        };
        match std::mem::replace(slot, TileSlot::Loading) {
            TileSlot::Ready(texture) => {
                *slot = TileSlot::Ready(texture.clone());
                Some(texture)
            }
            TileSlot::Decoded(image) => {
                let texture = ctx.load_texture(
                    format!("tile-{}-{}-{}", id.z, id.x, id.y),
                    image,
                    egui::TextureOptions::LINEAR,
                );
                *slot = TileSlot::Ready(texture.clone());
                Some(texture)
            }
            TileSlot::Failed => {
                *slot = TileSlot::Failed;
                None
            }
            TileSlot::Loading => None,
        }
    }

    fn fetch(&self, ctx: &egui::Context, id: TileId, url: String) {
        let inner = Arc::clone(&self.inner);
        let ctx = ctx.clone();
        #[allow(unused_mut)]
        let mut request = ehttp::Request::get(&url);
        #[cfg(not(target_arch = "wasm32"))]
        request.headers.insert(
            "User-Agent".to_string(),
            concat!("playermap/", env!("CARGO_PKG_VERSION")).to_string(),
        );
        ehttp::fetch(request, move |result| {
            let slot = match result {
                Ok(resp) if resp.ok => match decode_tile(&resp.bytes) {
                    Ok(image) => TileSlot::Decoded(image),
                    Err(e) => {
                        log::warn!("tile {url}: {e}");
                        TileSlot::Failed
                    }
                },
                Ok(resp) => {
                    log::warn!("tile {url}: HTTP {}", resp.status);
                    TileSlot::Failed
                }
                Err(e) => {
                    log::warn!("tile {url}: {e}");
                    TileSlot::Failed
                }
            };
            inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, slot);
            ctx.request_repaint();
        });
    }
}

fn decode_tile(bytes: &[u8]) -> Result<egui::ColorImage, image::ImageError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        rgba.as_flat_samples().as_slice(),
    ))
}

/// Install guard for `ctx`. Each egui context gets its own.
fn shared_assets(ctx: &egui::Context) -> Arc<SharedAssets> {
    ctx.data_mut(|d| Arc::clone(d.get_temp_mut_or_default::<Arc<SharedAssets>>(assets_id())))
}

/// Put the shared tile cache and pulse timing into `ctx`, once per context.
fn install_shared_assets(ctx: &egui::Context) {
    let installed = shared_assets(ctx).install(|| {
        ctx.data_mut(|d| {
            d.insert_temp(tiles_id(), TileCache::default());
            d.insert_temp(pulse_id(), PulseTiming::default());
        });
    });
    if installed {
        log::info!("tile map assets installed");
    }
}

// ---------------------------------------------------------------------------
// TileMap
// ---------------------------------------------------------------------------

pub type MarkerId = u64;

struct PlacedMarker {
    at: Coordinate,
    icon: MarkerIcon,
    popup: Option<Popup>,
}

/// What the map asked the app to do this frame.
#[derive(Debug, Default)]
pub struct MapOutput {
    /// Contact handle whose copy button was pressed.
    pub copy: Option<String>,
}

pub struct TileMap {
    ctx: egui::Context,
    center: Coordinate,
    zoom: u8,
    layer: Option<TileLayer>,
    tiles: TileCache,
    pulse: PulseTiming,
    markers: BTreeMap<MarkerId, PlacedMarker>,
    next_marker: MarkerId,
    open_popup: Option<MarkerId>,
    viewport: [f64; 2],
    scroll: f32,
    removed: bool,
}

impl TileMap {
    pub fn new(ctx: &egui::Context, center: Coordinate, zoom: u8) -> Self {
        install_shared_assets(ctx);
        let (tiles, pulse) = ctx.data_mut(|d| {
            (
                d.get_temp_mut_or_default::<TileCache>(tiles_id()).clone(),
                *d.get_temp_mut_or_default::<PulseTiming>(pulse_id()),
            )
        });
        Self {
            ctx: ctx.clone(),
            center,
            zoom,
            layer: None,
            tiles,
            pulse,
            markers: BTreeMap::new(),
            next_marker: 0,
            open_popup: None,
            viewport: DEFAULT_VIEWPORT,
            scroll: 0.0,
            removed: false,
        }
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile_cache(&self) -> &TileCache {
        &self.tiles
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Open the popup bound to the marker nearest `at`, if one is bound.
    pub fn open_popup_at(&mut self, at: Coordinate) -> bool {
        let nearest = self
            .markers
            .iter()
            .filter(|(_, m)| m.popup.is_some())
            .min_by(|(_, a), (_, b)| {
                a.at.distance_km(&at).total_cmp(&b.at.distance_km(&at))
            })
            .map(|(id, _)| *id);
        self.open_popup = nearest;
        nearest.is_some()
    }

    pub fn open_popup(&self) -> Option<&Popup> {
        self.open_popup
            .and_then(|id| self.markers.get(&id))
            .and_then(|m| m.popup.as_ref())
    }

    fn max_zoom(&self) -> u8 {
        self.layer.as_ref().map_or(18, |l| l.max_zoom).max(MIN_ZOOM)
    }

    fn zoom_by(&mut self, step: i8) {
        let z = i16::from(self.zoom) + i16::from(step);
        self.zoom = z.clamp(i16::from(MIN_ZOOM), i16::from(self.max_zoom())) as u8;
    }

    /// Paint the map into the remaining space of `ui`.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        copy_label: impl Fn(&str) -> &'static str,
    ) -> MapOutput {
        let mut output = MapOutput::default();
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.viewport = [f64::from(rect.width()), f64::from(rect.height())];

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(222, 226, 230));
        if self.removed {
            return output;
        }

        if response.dragged() {
            let delta = response.drag_delta();
            let (cx, cy) = project(self.center, self.zoom);
            self.center = unproject(
                cx - f64::from(delta.x),
                cy - f64::from(delta.y),
                self.zoom,
            );
        }
        if response.hovered() {
            self.scroll += ui.input(|i| i.smooth_scroll_delta.y);
            if self.scroll >= SCROLL_PER_ZOOM {
                self.zoom_by(1);
                self.scroll = 0.0;
            } else if self.scroll <= -SCROLL_PER_ZOOM {
                self.zoom_by(-1);
                self.scroll = 0.0;
            }
        }

        let (cx, cy) = project(self.center, self.zoom);
        let left = cx - self.viewport[0] / 2.0;
        let top = cy - self.viewport[1] / 2.0;
        let to_screen = |c: Coordinate, zoom: u8| -> Pos2 {
            let (x, y) = project(c, zoom);
            rect.min + Vec2::new((x - left) as f32, (y - top) as f32)
        };

        if let Some(layer) = &self.layer {
            self.paint_tiles(&painter, rect, layer, left, top);
        }

        // Markers, origin last so it sits on top.
        let time = ui.input(|i| i.time);
        let mut pulsing = false;
        let mut ordered: Vec<_> = self.markers.iter().collect();
        ordered.sort_by_key(|(_, m)| matches!(m.icon, MarkerIcon::Origin));
        for (_, marker) in &ordered {
            let pos = to_screen(marker.at, self.zoom);
            if !rect.expand(24.0).contains(pos) {
                continue;
            }
            let [r, g, b] = marker.icon.color();
            let fill = Color32::from_rgb(r, g, b);
            let radius = marker.icon.size() / 2.0;
            if marker.icon.pulses() {
                pulsing = true;
                let phase = ((time / self.pulse.period_secs).fract()) as f32;
                painter.circle_stroke(
                    pos,
                    radius + phase * self.pulse.spread,
                    Stroke::new(2.0, fill.gamma_multiply(1.0 - phase)),
                );
            }
            painter.circle(pos, radius, fill, Stroke::new(2.0, Color32::WHITE));
        }

        if response.clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.open_popup = self
                .markers
                .iter()
                .filter(|(_, m)| m.popup.is_some())
                .map(|(id, m)| (*id, to_screen(m.at, self.zoom).distance(pointer), m.icon.size()))
                .filter(|(_, d, size)| *d <= size / 2.0 + 4.0)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _, _)| id);
        }

        if let Some(id) = self.open_popup
            && let Some(marker) = self.markers.get(&id)
            && let Some(popup) = &marker.popup
        {
            let anchor = to_screen(marker.at, self.zoom) + Vec2::new(12.0, -12.0);
            let mut close = false;
            egui::Area::new(egui::Id::new(("playermap.popup", id)))
                .fixed_pos(anchor)
                .order(egui::Order::Foreground)
                .show(ui.ctx(), |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_max_width(240.0);
                        close = show_popup(ui, popup, &copy_label, &mut output);
                    });
                });
            if close {
                self.open_popup = None;
            }
        }

        if let Some(layer) = &self.layer {
            let galley = painter.layout_no_wrap(
                layer.attribution.clone(),
                FontId::proportional(10.0),
                Color32::from_rgb(60, 60, 60),
            );
            let text_rect = Align2::RIGHT_BOTTOM
                .anchor_size(rect.right_bottom() - Vec2::new(2.0, 2.0), galley.size())
                .expand(2.0);
            painter.rect_filled(text_rect, 2.0, Color32::from_white_alpha(200));
            painter.galley(text_rect.min + Vec2::splat(2.0), galley, Color32::BLACK);
        }

        if pulsing {
            ui.ctx()
                .request_repaint_after(std::time::Duration::from_millis(33));
        }
        output
    }

    fn paint_tiles(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        layer: &TileLayer,
        left: f64,
        top: f64,
    ) {
        let n = 1i64 << self.zoom;
        let x0 = (left / TILE_SIZE).floor() as i64;
        let x1 = ((left + self.viewport[0]) / TILE_SIZE).floor() as i64;
        let y0 = ((top / TILE_SIZE).floor() as i64).max(0);
        let y1 = (((top + self.viewport[1]) / TILE_SIZE).floor() as i64).min(n - 1);
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));

        for ty in y0..=y1 {
            for tx in x0..=x1 {
                let id = TileId {
                    z: self.zoom,
                    x: tx.rem_euclid(n) as u32,
                    y: ty as u32,
                };
                let min = rect.min
                    + Vec2::new(
                        (tx as f64 * TILE_SIZE - left) as f32,
                        (ty as f64 * TILE_SIZE - top) as f32,
                    );
                let tile_rect = Rect::from_min_size(min, Vec2::splat(TILE_SIZE as f32));
                match self.tiles.texture(&self.ctx, id, layer) {
                    Some(texture) => {
                        painter.image(texture.id(), tile_rect, uv, Color32::WHITE);
                    }
                    None => {
                        painter.rect_stroke(
                            tile_rect,
                            0.0,
                            Stroke::new(1.0, Color32::from_rgb(205, 210, 215)),
                            egui::StrokeKind::Inside,
                        );
                    }
                }
            }
        }
    }
}

/// Popup body. Returns true when the close button was pressed.
fn show_popup(
    ui: &mut egui::Ui,
    popup: &Popup,
    copy_label: &impl Fn(&str) -> &'static str,
    output: &mut MapOutput,
) -> bool {
    let mut close = false;
    ui.horizontal(|ui| {
        ui.strong(&popup.title);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("✕").clicked() {
                close = true;
            }
        });
    });

    for (label, value) in &popup.rows {
        if label.is_empty() {
            ui.label(value);
            continue;
        }
        ui.horizontal(|ui| {
            ui.weak(format!("{label}:"));
            let text = egui::RichText::new(value);
            let text = match (label.as_str(), popup.online) {
                ("Status", Some(true)) => text.color(Color32::from_rgb(16, 185, 129)),
                ("Status", Some(false)) => text.color(Color32::from_rgb(107, 114, 128)),
                _ => text,
            };
            ui.label(text);
        });
    }

    if let Some(contact) = &popup.contact {
        ui.horizontal(|ui| {
            ui.weak("Contact:");
            ui.monospace(contact);
            if ui.small_button(copy_label(contact)).clicked() {
                output.copy = Some(contact.clone());
            }
        });
    }

    if let Some(heading) = popup.listings_heading() {
        ui.separator();
        ui.strong(heading);
        for listing in &popup.listings {
            ui.horizontal_wrapped(|ui| {
                ui.label(&listing.name);
                ui.label(egui::RichText::new(&listing.price).strong());
            });
            ui.weak(format!("{} · {}", listing.condition, listing.platform));
        }
    }
    close
}

impl MapSurface for TileMap {
    type Marker = MarkerId;

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        self.layer = Some(layer.clone());
        self.zoom = self.zoom.clamp(MIN_ZOOM, self.max_zoom());
    }

    fn add_marker(&mut self, at: Coordinate, icon: MarkerIcon) -> MarkerId {
        let id = self.next_marker;
        self.next_marker += 1;
        self.markers.insert(
            id,
            PlacedMarker {
                at,
                icon,
                popup: None,
            },
        );
        id
    }

    fn bind_popup(&mut self, marker: &MarkerId, popup: Popup) {
        if let Some(m) = self.markers.get_mut(marker) {
            m.popup = Some(popup);
        }
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        self.markers.remove(&marker);
        if self.open_popup == Some(marker) {
            self.open_popup = None;
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.zoom = fit_zoom(&bounds, self.viewport, self.max_zoom());
        self.center = bounds.center();
    }

    fn remove(&mut self) {
        self.markers.clear();
        self.open_popup = None;
        self.layer = None;
        self.removed = true;
    }
}
