//! Filter pipeline over a generated population.
//!
//! `filter_players` is a stable conjunction of predicates; it never
//! reorders or mutates its input. Distance sorting is a separate step
//! applied once after generation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::Player;

/// Choices offered by the max-distance selector, in kilometers.
pub const DISTANCE_CHOICES_KM: &[f64] = &[2.0, 5.0, 10.0, 25.0, 50.0];

/// Game selector: every game, or one exact game tag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameFilter {
    #[default]
    All,
    Exact(String),
}

impl GameFilter {
    /// Parse the wire form, where the sentinel `"all"` (or empty) means any game.
    pub fn from_param(s: Option<&str>) -> Self {
        match s {
            None | Some("") | Some("all") => Self::All,
            Some(game) => Self::Exact(game.to_string()),
        }
    }

    pub fn accepts(&self, game: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(wanted) => wanted == game,
        }
    }
}

/// The active filter inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub selected_game: GameFilter,
    pub max_distance_km: f64,
    #[serde(default)]
    pub online_only: bool,
    #[serde(default)]
    pub has_listings: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            selected_game: GameFilter::All,
            max_distance_km: 10.0,
            online_only: false,
            has_listings: false,
        }
    }
}

impl FilterCriteria {
    /// True when `player` passes every active predicate.
    pub fn matches(&self, player: &Player) -> bool {
        let needle = self.search_term.trim().to_lowercase();
        self.matches_with_needle(player, &needle)
    }

    fn matches_with_needle(&self, player: &Player, needle: &str) -> bool {
        if !needle.is_empty() && !player.matches_text(needle) {
            return false;
        }
        if !self.selected_game.accepts(&player.game) {
            return false;
        }
        // Written as a negated `<=` so NaN distances never pass.
        if !(player.distance <= self.max_distance_km) {
            return false;
        }
        if self.online_only && !player.is_online {
            return false;
        }
        if self.has_listings && !player.has_listings() {
            return false;
        }
        true
    }
}

/// Ordered subsequence of `players` satisfying `criteria`.
pub fn filter_players(players: &[Player], criteria: &FilterCriteria) -> Vec<Player> {
    let needle = criteria.search_term.trim().to_lowercase();
    players
        .iter()
        .filter(|p| criteria.matches_with_needle(p, &needle))
        .cloned()
        .collect()
}

/// Stable ascending sort by distance from the origin.
pub fn sort_by_distance(mut players: Vec<Player>) -> Vec<Player> {
    players.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    players
}

/// Distinct game tags in first-seen order.
pub fn unique_games(players: &[Player]) -> Vec<String> {
    let mut seen = HashSet::new();
    players
        .iter()
        .filter(|p| seen.insert(p.game.as_str()))
        .map(|p| p.game.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Condition, Coordinate, Listing, Platform, PopulationGenerator};

    fn player(id: &str, name: &str, game: &str, distance: f64, online: bool) -> Player {
        Player {
            id: id.into(),
            name: name.into(),
            game: game.into(),
            location: Coordinate::DEFAULT_ORIGIN,
            distance,
            is_online: online,
            last_seen: "3 minutes ago".into(),
            level: Some(10),
            achievements: Vec::new(),
            listings: Vec::new(),
            contact: None,
        }
    }

    fn fifa_listing() -> Listing {
        Listing {
            name: "FIFA 24".into(),
            price: 1800,
            condition: Condition::Excellent,
            platform: Platform::Ps5,
            description: None,
        }
    }

    fn sample() -> Vec<Player> {
        let mut seller = player("p3", "Mike_Player", "Valorant", 7.5, false);
        seller.listings.push(fifa_listing());
        vec![
            player("p1", "Alex_42", "Valorant", 3.2, true),
            player("p2", "Sarah_Pro", "Fortnite", 1.1, true),
            seller,
            player("p4", "Emma_Gamer", "FIFA 24", 12.0, true),
        ]
    }

    fn ids(players: &[Player]) -> Vec<&str> {
        players.iter().map(|p| p.id.as_str()).collect()
    }

    fn is_subsequence(sub: &[Player], full: &[Player]) -> bool {
        let mut it = full.iter();
        sub.iter().all(|s| it.any(|f| f.id == s.id))
    }

    #[test]
    fn game_online_and_distance_combine() {
        let players = vec![player("p1", "Alex_42", "Valorant", 3.2, true)];
        let mut criteria = FilterCriteria {
            selected_game: GameFilter::Exact("Valorant".into()),
            online_only: true,
            max_distance_km: 5.0,
            ..Default::default()
        };
        assert_eq!(ids(&filter_players(&players, &criteria)), ["p1"]);

        criteria.max_distance_km = 2.0;
        assert!(filter_players(&players, &criteria).is_empty());
    }

    #[test]
    fn search_matches_listing_titles_case_insensitively() {
        let players = sample();
        for term in ["fifa", "FIFA", "FiFa"] {
            let criteria = FilterCriteria {
                search_term: term.into(),
                max_distance_km: 50.0,
                ..Default::default()
            };
            // p3 plays Valorant but sells FIFA 24; p4 plays FIFA 24.
            assert_eq!(ids(&filter_players(&players, &criteria)), ["p3", "p4"]);
        }
    }

    #[test]
    fn has_listings_and_online_only() {
        let players = sample();
        let criteria = FilterCriteria {
            has_listings: true,
            max_distance_km: 50.0,
            ..Default::default()
        };
        assert_eq!(ids(&filter_players(&players, &criteria)), ["p3"]);

        let criteria = FilterCriteria {
            online_only: true,
            max_distance_km: 50.0,
            ..Default::default()
        };
        assert_eq!(ids(&filter_players(&players, &criteria)), ["p1", "p2", "p4"]);
    }

    #[test]
    fn output_preserves_input_order_and_input_is_untouched() {
        let players = sample();
        let before = players.clone();
        let criteria = FilterCriteria {
            max_distance_km: 8.0,
            ..Default::default()
        };
        let first = filter_players(&players, &criteria);
        let second = filter_players(&players, &criteria);
        assert_eq!(first, second);
        assert_eq!(players, before);
        assert!(is_subsequence(&first, &players));
        // Not sorted by distance: p1 (3.2) stays ahead of p2 (1.1).
        assert_eq!(ids(&first), ["p1", "p2", "p3"]);
    }

    #[test]
    fn zero_max_distance_excludes_generated_population() {
        let players = PopulationGenerator::seeded(7)
            .generate(Coordinate::DEFAULT_ORIGIN, &Default::default());
        let criteria = FilterCriteria {
            max_distance_km: 0.0,
            ..Default::default()
        };
        assert!(filter_players(&players, &criteria).is_empty());
    }

    #[test]
    fn stability_holds_for_many_random_criteria() {
        let players = PopulationGenerator::seeded(99)
            .generate(Coordinate::DEFAULT_ORIGIN, &Default::default());
        let games = unique_games(&players);
        for (i, max) in DISTANCE_CHOICES_KM.iter().enumerate() {
            let criteria = FilterCriteria {
                selected_game: if i % 2 == 0 {
                    GameFilter::All
                } else {
                    GameFilter::Exact(games[i % games.len()].clone())
                },
                max_distance_km: *max,
                online_only: i % 3 == 0,
                ..Default::default()
            };
            let out = filter_players(&players, &criteria);
            assert!(is_subsequence(&out, &players));
            assert!(out.iter().all(|p| criteria.matches(p)));
        }
    }

    #[test]
    fn every_keystroke_refilters() {
        // No debouncing: each intermediate term is a complete pipeline run.
        let players = sample();
        let mut criteria = FilterCriteria {
            max_distance_km: 50.0,
            ..Default::default()
        };
        let mut counts = Vec::new();
        for term in ["a", "ar", "ara"] {
            criteria.search_term = term.into();
            counts.push(filter_players(&players, &criteria).len());
        }
        assert_eq!(counts, [4, 1, 1]);
    }

    #[test]
    fn game_filter_parses_sentinel() {
        assert_eq!(GameFilter::from_param(Some("all")), GameFilter::All);
        assert_eq!(GameFilter::from_param(None), GameFilter::All);
        assert_eq!(
            GameFilter::from_param(Some("Dota 2")),
            GameFilter::Exact("Dota 2".into())
        );
    }

    #[test]
    fn sort_and_unique_games() {
        let sorted = sort_by_distance(sample());
        assert_eq!(ids(&sorted), ["p2", "p1", "p3", "p4"]);
        assert_eq!(unique_games(&sample()), ["Valorant", "Fortnite", "FIFA 24"]);
    }
}
