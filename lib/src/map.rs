//! Map rendering contract and marker lifecycle.
//!
//! `MapSurface` is the boundary to whatever actually draws the map (the egui
//! tile map in the UI crate, a recording fake in tests). `MapView` owns one
//! surface for the life of the view and keeps its markers in step with the
//! origin and the filtered population.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::{Bounds, Coordinate, Player, format_distance, format_price};

/// Initial zoom when the surface is created.
pub const DEFAULT_ZOOM: u8 = 13;

/// Padding ratio applied when fitting the viewport to the markers.
pub const FIT_PADDING: f64 = 0.2;

/// Raster tile source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayer {
    /// `{s}`, `{z}`, `{x}`, `{y}` placeholders.
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "© OpenStreetMap contributors".into(),
            max_zoom: 18,
        }
    }
}

impl TileLayer {
    const SUBDOMAINS: &[&str] = &["a", "b", "c"];

    /// Concrete URL for one tile. Subdomains rotate by tile position.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        let s = Self::SUBDOMAINS[((x as usize) + (y as usize)) % Self::SUBDOMAINS.len()];
        self.url_template
            .replace("{s}", s)
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

/// What a marker depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerIcon {
    Origin,
    Player { online: bool },
}

impl MarkerIcon {
    /// Online players get a small animated indicator.
    pub fn pulses(&self) -> bool {
        matches!(self, MarkerIcon::Player { online: true })
    }

    /// Fill color as RGB.
    pub fn color(&self) -> [u8; 3] {
        match self {
            MarkerIcon::Origin => [59, 130, 246],
            MarkerIcon::Player { online: true } => [16, 185, 129],
            MarkerIcon::Player { online: false } => [107, 114, 128],
        }
    }

    /// Diameter in logical pixels.
    pub fn size(&self) -> f32 {
        match self {
            MarkerIcon::Origin => 20.0,
            MarkerIcon::Player { .. } => 16.0,
        }
    }
}

/// One listing line in a popup.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub name: String,
    pub price: String,
    pub condition: String,
    pub platform: String,
}

/// Structured popup content. Surfaces decide how to lay it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    /// `(label, value)` rows.
    pub rows: Vec<(String, String)>,
    /// Online state for the status row, when the popup is for a player.
    pub online: Option<bool>,
    /// Contact handle with a copy affordance.
    pub contact: Option<String>,
    pub listings: Vec<ListingSummary>,
}

impl Popup {
    pub fn origin() -> Self {
        Self {
            title: "Your Location".into(),
            rows: vec![(String::new(), "You are here".into())],
            online: None,
            contact: None,
            listings: Vec::new(),
        }
    }

    pub fn for_player(player: &Player) -> Self {
        Self {
            title: player.name.clone(),
            rows: vec![
                ("Game".into(), player.game.clone()),
                ("Distance".into(), format_distance(player.distance)),
                ("Status".into(), player.status_label().into()),
            ],
            online: Some(player.is_online),
            contact: player.contact.clone(),
            listings: player
                .listings
                .iter()
                .map(|l| ListingSummary {
                    name: l.name.clone(),
                    price: format_price(l.price),
                    condition: l.condition.to_string(),
                    platform: l.platform.to_string(),
                })
                .collect(),
        }
    }

    pub fn listings_heading(&self) -> Option<String> {
        (!self.listings.is_empty())
            .then(|| format!("🎮 Games for Sale ({})", self.listings.len()))
    }
}

/// The drawing backend a `MapView` drives.
pub trait MapSurface {
    type Marker;

    fn add_tile_layer(&mut self, layer: &TileLayer);
    fn add_marker(&mut self, at: Coordinate, icon: MarkerIcon) -> Self::Marker;
    fn bind_popup(&mut self, marker: &Self::Marker, popup: Popup);
    fn remove_marker(&mut self, marker: Self::Marker);
    /// Fit the viewport to `bounds` (already padded).
    fn fit_bounds(&mut self, bounds: Bounds);
    /// Release the surface. Must tolerate being called on a detached surface.
    fn remove(&mut self);
}

// ---------------------------------------------------------------------------
// SharedAssets
// ---------------------------------------------------------------------------

/// Once-guard for assets every surface in one host shares, such as the tile
/// cache and marker animation timing. Keep one per host: a `static` for
/// process scope, or one stored in each UI context.
pub struct SharedAssets {
    installed: AtomicBool,
}

impl SharedAssets {
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
        }
    }

    /// Run `install` the first time only. Returns whether it ran.
    pub fn install(&self, install: impl FnOnce()) -> bool {
        if self.installed.swap(true, Ordering::AcqRel) {
            return false;
        }
        install();
        true
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

impl Default for SharedAssets {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MapView
// ---------------------------------------------------------------------------

/// Owns one surface and the markers placed on it.
pub struct MapView<S: MapSurface> {
    tile_layer: TileLayer,
    surface: Option<S>,
    origin_marker: Option<S::Marker>,
    markers: Vec<S::Marker>,
}

impl<S: MapSurface> MapView<S> {
    pub fn new(tile_layer: TileLayer) -> Self {
        Self {
            tile_layer,
            surface: None,
            origin_marker: None,
            markers: Vec::new(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    /// Create the surface once an origin is known. A mounted view is never
    /// recreated; returns false in that case.
    pub fn mount<F>(&mut self, origin: Coordinate, create: F) -> bool
    where
        F: FnOnce(Coordinate, u8) -> S,
    {
        if self.surface.is_some() {
            return false;
        }
        let mut surface = create(origin, DEFAULT_ZOOM);
        surface.add_tile_layer(&self.tile_layer);
        self.surface = Some(surface);
        true
    }

    /// Replace every marker: one for the origin, one per player. Fits the
    /// viewport when at least one player is shown. Returns the number of
    /// markers placed (0 when unmounted).
    pub fn sync(&mut self, origin: Coordinate, players: &[Player]) -> usize {
        let Some(surface) = self.surface.as_mut() else {
            return 0;
        };

        if let Some(marker) = self.origin_marker.take() {
            surface.remove_marker(marker);
        }
        for marker in self.markers.drain(..) {
            surface.remove_marker(marker);
        }

        let origin_marker = surface.add_marker(origin, MarkerIcon::Origin);
        surface.bind_popup(&origin_marker, Popup::origin());
        self.origin_marker = Some(origin_marker);

        for player in players {
            let marker = surface.add_marker(
                player.location,
                MarkerIcon::Player {
                    online: player.is_online,
                },
            );
            surface.bind_popup(&marker, Popup::for_player(player));
            self.markers.push(marker);
        }

        if !players.is_empty() {
            let points = std::iter::once(origin).chain(players.iter().map(|p| p.location));
            if let Some(bounds) = Bounds::from_points(points) {
                surface.fit_bounds(bounds.pad(FIT_PADDING));
            }
        }

        self.markers.len() + 1
    }

    /// Release markers, then the surface. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        if let Some(marker) = self.origin_marker.take() {
            surface.remove_marker(marker);
        }
        for marker in self.markers.drain(..) {
            surface.remove_marker(marker);
        }
        surface.remove();
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Markers currently tracked, origin included.
    pub fn marker_count(&self) -> usize {
        self.markers.len() + usize::from(self.origin_marker.is_some())
    }
}

impl<S: MapSurface> Drop for MapView<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;
    use crate::{FilterCriteria, PopulationGenerator, filter_players};

    /// Shared log so assertions still work after the view drops the surface.
    #[derive(Default)]
    struct SurfaceLog {
        created: usize,
        tile_layers: usize,
        live: BTreeMap<usize, (Coordinate, MarkerIcon)>,
        popups: BTreeMap<usize, Popup>,
        fits: Vec<Bounds>,
        removed: usize,
    }

    struct RecordingSurface {
        log: Rc<RefCell<SurfaceLog>>,
        next_id: usize,
        detached: bool,
    }

    impl MapSurface for RecordingSurface {
        type Marker = usize;

        fn add_tile_layer(&mut self, _layer: &TileLayer) {
            self.log.borrow_mut().tile_layers += 1;
        }

        fn add_marker(&mut self, at: Coordinate, icon: MarkerIcon) -> usize {
            self.next_id += 1;
            self.log.borrow_mut().live.insert(self.next_id, (at, icon));
            self.next_id
        }

        fn bind_popup(&mut self, marker: &usize, popup: Popup) {
            self.log.borrow_mut().popups.insert(*marker, popup);
        }

        fn remove_marker(&mut self, marker: usize) {
            let mut log = self.log.borrow_mut();
            log.live.remove(&marker);
            log.popups.remove(&marker);
        }

        fn fit_bounds(&mut self, bounds: Bounds) {
            self.log.borrow_mut().fits.push(bounds);
        }

        fn remove(&mut self) {
            if !self.detached {
                self.detached = true;
                self.log.borrow_mut().removed += 1;
            }
        }
    }

    fn mounted(log: &Rc<RefCell<SurfaceLog>>) -> MapView<RecordingSurface> {
        let mut view = MapView::new(TileLayer::default());
        let log = Rc::clone(log);
        view.mount(Coordinate::DEFAULT_ORIGIN, move |_, zoom| {
            assert_eq!(zoom, DEFAULT_ZOOM);
            log.borrow_mut().created += 1;
            RecordingSurface {
                log,
                next_id: 0,
                detached: false,
            }
        });
        view
    }

    fn population() -> Vec<Player> {
        PopulationGenerator::seeded(21).generate(Coordinate::DEFAULT_ORIGIN, &Default::default())
    }

    fn origin_markers(log: &SurfaceLog) -> usize {
        log.live
            .values()
            .filter(|(_, icon)| *icon == MarkerIcon::Origin)
            .count()
    }

    #[test]
    fn mount_is_guarded() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        let again = view.mount(Coordinate::DEFAULT_ORIGIN, |_, _| unreachable!());
        assert!(!again);
        assert_eq!(log.borrow().created, 1);
        assert_eq!(log.borrow().tile_layers, 1);
    }

    #[test]
    fn repeated_syncs_keep_a_single_origin_marker() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        let players = population();

        for step in 0..5 {
            let origin = Coordinate::new(40.7128 + step as f64 * 0.001, -74.0060);
            let placed = view.sync(origin, &players);
            assert_eq!(placed, players.len() + 1);
            let log = log.borrow();
            assert_eq!(origin_markers(&log), 1);
            assert_eq!(log.live.len(), players.len() + 1);
        }
        assert_eq!(view.marker_count(), players.len() + 1);
    }

    #[test]
    fn sync_tracks_the_filtered_set() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        let players = population();

        view.sync(Coordinate::DEFAULT_ORIGIN, &players);
        let online = filter_players(
            &players,
            &FilterCriteria {
                online_only: true,
                ..Default::default()
            },
        );
        view.sync(Coordinate::DEFAULT_ORIGIN, &online);

        let log = log.borrow();
        let player_markers: Vec<_> = log
            .live
            .values()
            .filter(|(_, icon)| *icon != MarkerIcon::Origin)
            .collect();
        assert_eq!(player_markers.len(), online.len());
        assert!(
            player_markers
                .iter()
                .all(|(_, icon)| *icon == MarkerIcon::Player { online: true })
        );
    }

    #[test]
    fn fit_bounds_covers_everything_with_padding() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        let players = population();
        view.sync(Coordinate::DEFAULT_ORIGIN, &players);

        let log = log.borrow();
        assert_eq!(log.fits.len(), 1);
        let fitted = log.fits[0];
        let raw = Bounds::from_points(
            std::iter::once(Coordinate::DEFAULT_ORIGIN).chain(players.iter().map(|p| p.location)),
        )
        .unwrap();
        assert_eq!(fitted, raw.pad(FIT_PADDING));
        assert!(players.iter().all(|p| fitted.contains(&p.location)));
    }

    #[test]
    fn empty_population_places_origin_only_and_skips_fit() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        assert_eq!(view.sync(Coordinate::DEFAULT_ORIGIN, &[]), 1);
        assert!(log.borrow().fits.is_empty());
    }

    #[test]
    fn popups_carry_contact_and_listings() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        let players = population();
        view.sync(Coordinate::DEFAULT_ORIGIN, &players);

        let log = log.borrow();
        let seller = players.iter().find(|p| p.has_listings()).unwrap();
        let popup = log
            .popups
            .values()
            .find(|p| p.title == seller.name && p.contact == seller.contact)
            .unwrap();
        assert_eq!(
            popup.listings_heading().unwrap(),
            format!("🎮 Games for Sale ({})", seller.listings.len())
        );
        assert!(popup.listings[0].price.starts_with('₹'));
        assert!(log.popups.values().any(|p| p.title == "Your Location"));
    }

    #[test]
    fn unmount_releases_everything_once() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        let mut view = mounted(&log);
        view.sync(Coordinate::DEFAULT_ORIGIN, &population());
        view.unmount();
        view.unmount();
        assert!(!view.is_mounted());
        assert_eq!(view.sync(Coordinate::DEFAULT_ORIGIN, &population()), 0);
        let log = log.borrow();
        assert!(log.live.is_empty());
        assert_eq!(log.removed, 1);
    }

    #[test]
    fn drop_tears_down_and_remount_starts_clean() {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        {
            let mut view = mounted(&log);
            view.sync(Coordinate::DEFAULT_ORIGIN, &population());
        }
        assert!(log.borrow().live.is_empty());
        assert_eq!(log.borrow().removed, 1);

        let mut view = mounted(&log);
        view.sync(Coordinate::DEFAULT_ORIGIN, &population());
        assert_eq!(log.borrow().created, 2);
        assert_eq!(origin_markers(&log.borrow()), 1);
    }

    #[test]
    fn shared_assets_install_once() {
        static ASSETS: SharedAssets = SharedAssets::new();
        let mut runs = 0;
        for _ in 0..3 {
            ASSETS.install(|| runs += 1);
        }
        assert_eq!(runs, 1);
        assert!(ASSETS.is_installed());
    }

    #[test]
    fn tile_url_fills_placeholders() {
        let url = TileLayer::default().tile_url(13, 2410, 3080);
        assert_eq!(url, "https://a.tile.openstreetmap.org/13/2410/3080.png");
        let url = TileLayer::default().tile_url(13, 2411, 3080);
        assert!(url.starts_with("https://b."));
    }
}
