//! Synthetic candidate generation.
//!
//! Builds a population of fake nearby players scattered uniformly inside a
//! disk around the origin. The RNG is injected so a fixed seed reproduces
//! the same population; callers that want a fresh population per session
//! seed from the clock.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{Condition, Coordinate, Listing, Platform, Player, haversine_km, sort_by_distance};

const NAMES: &[&str] = &[
    "Alex_Gamer",
    "Sarah_Pro",
    "Mike_Player",
    "Emma_Gamer",
    "John_Doe",
    "Lisa_Player",
    "David_Pro",
    "Anna_Gamer",
    "Tom_Player",
    "Kate_Pro",
    "Chris_Elite",
    "Maria_Queen",
    "Jake_Slayer",
    "Sophie_Pro",
    "Ryan_Gamer",
];

const GAMES: &[&str] = &[
    "FIFA 24",
    "Call of Duty",
    "Fortnite",
    "Apex Legends",
    "Valorant",
    "League of Legends",
    "Dota 2",
    "CS:GO",
];

const ACHIEVEMENTS: &[&str] = &["First Win", "Team Player", "MVP", "Kill Leader", "Survivor"];

const LISTING_TITLES: &[&str] = &[
    "FIFA 24",
    "Call of Duty: Modern Warfare III",
    "Spider-Man 2",
    "God of War Ragnarok",
    "Elden Ring",
    "Forza Horizon 5",
    "Hogwarts Legacy",
    "GTA V",
    "The Last of Us Part II",
    "Gran Turismo 7",
];

const LISTING_NOTES: &[&str] = &[
    "Barely played, original case included",
    "Disc has light scratches, works fine",
    "Comes with unused DLC code",
];

/// Tunables for one generated population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub count: usize,
    pub radius_km: f64,
    pub online_probability: f64,
    pub listing_probability: f64,
    pub max_listings: usize,
    pub price_min: u32,
    pub price_max: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            count: 15,
            radius_km: 10.0,
            online_probability: 0.7,
            listing_probability: 0.7,
            max_listings: 3,
            price_min: 500,
            price_max: 5000,
        }
    }
}

impl GeneratorSettings {
    /// Clamp hand-edited values into ranges the generator can honor.
    pub fn sanitized(&self) -> Self {
        let price_min = self.price_min.min(self.price_max);
        Self {
            count: self.count,
            radius_km: if self.radius_km.is_finite() {
                self.radius_km.max(0.0)
            } else {
                0.0
            },
            online_probability: clamp_probability(self.online_probability),
            listing_probability: clamp_probability(self.listing_probability),
            max_listings: self.max_listings.max(1),
            price_min,
            price_max: self.price_max.max(price_min),
        }
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Population generator over an injectable RNG.
pub struct PopulationGenerator<R> {
    rng: R,
}

impl PopulationGenerator<ChaCha8Rng> {
    /// Deterministic generator: the same seed yields the same population.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> PopulationGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generate `settings.count` players around `origin`, sorted by distance.
    pub fn generate(&mut self, origin: Coordinate, settings: &GeneratorSettings) -> Vec<Player> {
        let settings = settings.sanitized();
        let players = (0..settings.count)
            .map(|index| self.player(index, origin, &settings))
            .collect();
        sort_by_distance(players)
    }

    fn player(&mut self, index: usize, origin: Coordinate, settings: &GeneratorSettings) -> Player {
        let location = self.sample_position(origin, settings.radius_km);
        let n = index + 1;

        let listings = if self.rng.gen_bool(settings.listing_probability) {
            let count = self.rng.gen_range(1..=settings.max_listings);
            (0..count).map(|_| self.listing(settings)).collect()
        } else {
            Vec::new()
        };
        let contact = (!listings.is_empty()).then(|| format!("user{n}#{}", 1000 + n));

        let achievement_count = self.rng.gen_range(1..=3);
        Player {
            id: format!("player-{n}"),
            name: NAMES[index % NAMES.len()].to_string(),
            game: GAMES[index % GAMES.len()].to_string(),
            location,
            distance: haversine_km(&origin, &location),
            is_online: self.rng.gen_bool(settings.online_probability),
            last_seen: format!("{} minutes ago", self.rng.gen_range(0..60)),
            level: Some(self.rng.gen_range(1..=100)),
            achievements: ACHIEVEMENTS[..achievement_count]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            listings,
            contact,
        }
    }

    /// Uniform point inside a disk of `radius_km` around `origin`.
    fn sample_position(&mut self, origin: Coordinate, radius_km: f64) -> Coordinate {
        let r = radius_km * self.rng.gen_range(0.0..1.0_f64).sqrt();
        let theta = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let point = origin.offset_km(r * theta.cos(), r * theta.sin());

        // The degree conversion is approximate; pull back anything it pushed
        // past the radius so the population honors the configured disk.
        let d = haversine_km(&origin, &point);
        if d > radius_km && d > 0.0 {
            let scale = radius_km / d;
            origin.offset_km(r * scale * theta.cos(), r * scale * theta.sin())
        } else {
            point
        }
    }

    fn listing(&mut self, settings: &GeneratorSettings) -> Listing {
        let name = LISTING_TITLES[self.rng.gen_range(0..LISTING_TITLES.len())];
        let description = self
            .rng
            .gen_bool(0.5)
            .then(|| LISTING_NOTES[self.rng.gen_range(0..LISTING_NOTES.len())].to_string());
        Listing {
            name: name.to_string(),
            price: self.rng.gen_range(settings.price_min..=settings.price_max),
            condition: Condition::ALL[self.rng.gen_range(0..Condition::ALL.len())],
            platform: Platform::ALL[self.rng.gen_range(0..Platform::ALL.len())],
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn settings(count: usize, radius_km: f64) -> GeneratorSettings {
        GeneratorSettings {
            count,
            radius_km,
            ..Default::default()
        }
    }

    #[test]
    fn ten_candidates_within_ten_km_of_nyc() {
        let origin = Coordinate::new(40.7128, -74.0060);
        let players = PopulationGenerator::seeded(1).generate(origin, &settings(10, 10.0));
        assert_eq!(players.len(), 10);
        for p in &players {
            let d = haversine_km(&origin, &p.location);
            assert!(d <= 10.0001, "{} at {d}km", p.id);
            assert!((p.distance - d).abs() < 1e-9);
        }
    }

    #[test]
    fn radius_holds_across_seeds_and_latitudes() {
        for seed in 0..50 {
            for lat in [-60.0, 0.0, 35.0, 64.0] {
                let origin = Coordinate::new(lat, 12.5);
                let players =
                    PopulationGenerator::seeded(seed).generate(origin, &settings(12, 25.0));
                assert!(players.iter().all(|p| p.distance <= 25.0 + 1e-4));
            }
        }
    }

    #[test]
    fn same_seed_same_population() {
        let origin = Coordinate::DEFAULT_ORIGIN;
        let a = PopulationGenerator::seeded(42).generate(origin, &Default::default());
        let b = PopulationGenerator::seeded(42).generate(origin, &Default::default());
        let c = PopulationGenerator::seeded(43).generate(origin, &Default::default());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ids_are_unique_and_population_is_sorted() {
        let players = PopulationGenerator::seeded(5)
            .generate(Coordinate::DEFAULT_ORIGIN, &Default::default());
        assert_eq!(players.len(), 15);
        let ids: HashSet<_> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), players.len());
        assert!(players.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn listings_respect_catalogue_and_price_band() {
        let s = GeneratorSettings {
            count: 200,
            listing_probability: 1.0,
            ..Default::default()
        };
        let players = PopulationGenerator::seeded(11).generate(Coordinate::DEFAULT_ORIGIN, &s);
        for p in &players {
            assert!((1..=3).contains(&p.listings.len()));
            assert!(p.contact.as_deref().is_some_and(|c| c.contains('#')));
            for l in &p.listings {
                assert!(LISTING_TITLES.contains(&l.name.as_str()));
                assert!((500..=5000).contains(&l.price));
            }
        }
    }

    #[test]
    fn probabilities_shape_the_population() {
        let s = GeneratorSettings {
            count: 2000,
            ..Default::default()
        };
        let players = PopulationGenerator::seeded(3).generate(Coordinate::DEFAULT_ORIGIN, &s);
        let online = players.iter().filter(|p| p.is_online).count() as f64 / 2000.0;
        let sellers = players.iter().filter(|p| p.has_listings()).count() as f64 / 2000.0;
        assert!((online - 0.7).abs() < 0.05, "online ratio {online}");
        assert!((sellers - 0.7).abs() < 0.05, "seller ratio {sellers}");
        assert!(players.iter().all(|p| p.contact.is_some() == p.has_listings()));
    }

    #[test]
    fn sanitized_clamps_bad_values() {
        let s = GeneratorSettings {
            count: 3,
            radius_km: f64::NAN,
            online_probability: 1.5,
            listing_probability: -2.0,
            max_listings: 0,
            price_min: 900,
            price_max: 100,
        }
        .sanitized();
        assert_eq!(s.radius_km, 0.0);
        assert_eq!(s.online_probability, 1.0);
        assert_eq!(s.listing_probability, 0.0);
        assert_eq!(s.max_listings, 1);
        assert!(s.price_min <= s.price_max);

        // Zero radius puts everyone on the origin without panicking.
        let players = PopulationGenerator::seeded(0).generate(Coordinate::DEFAULT_ORIGIN, &s);
        assert!(players.iter().all(|p| p.distance == 0.0));
    }
}
