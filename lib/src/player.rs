//! Candidate player and for-sale listing types.
//!
//! Candidates are synthetic: fabricated per session around the viewer's
//! origin and never tied to a real account.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// Condition of a game being sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub const ALL: &[Condition] = &[
        Condition::Excellent,
        Condition::Good,
        Condition::Fair,
        Condition::Poor,
    ];
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "Excellent"),
            Self::Good => write!(f, "Good"),
            Self::Fair => write!(f, "Fair"),
            Self::Poor => write!(f, "Poor"),
        }
    }
}

/// Platform a listed game runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "PS5")]
    Ps5,
    #[serde(rename = "PS4")]
    Ps4,
    Xbox,
    #[serde(rename = "PC")]
    Pc,
    #[serde(rename = "Nintendo Switch")]
    Switch,
}

impl Platform {
    pub const ALL: &[Platform] = &[
        Platform::Ps5,
        Platform::Ps4,
        Platform::Xbox,
        Platform::Pc,
        Platform::Switch,
    ];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ps5 => "PS5",
            Self::Ps4 => "PS4",
            Self::Xbox => "Xbox",
            Self::Pc => "PC",
            Self::Switch => "Nintendo Switch",
        };
        f.write_str(label)
    }
}

/// A game offered for sale by a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    /// Whole currency units, displayed with a rupee sign.
    pub price: u32,
    pub condition: Condition,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A nearby player shown on the map and in the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique within one generated population.
    pub id: String,
    pub name: String,
    pub game: String,
    pub location: Coordinate,
    /// Kilometers from the origin the population was generated around.
    pub distance: f64,
    pub is_online: bool,
    /// Free display text ("12 minutes ago"), not a timestamp.
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub achievements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listings: Vec<Listing>,
    /// Contact handle ("name#1003"), copyable from popups and the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl Player {
    pub fn has_listings(&self) -> bool {
        !self.listings.is_empty()
    }

    /// Case-insensitive substring match against name, game, and listing titles.
    /// `needle_lower` must already be lowercased.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.game.to_lowercase().contains(needle_lower)
            || self
                .listings
                .iter()
                .any(|l| l.name.to_lowercase().contains(needle_lower))
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_online { "Online" } else { "Offline" }
    }
}

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------

/// "850m" below one kilometer, otherwise "3.2km".
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{}m", (km * 1000.0).round() as i64)
    } else {
        format!("{km:.1}km")
    }
}

pub fn format_price(price: u32) -> String {
    format!("₹{price}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str) -> Listing {
        Listing {
            name: name.into(),
            price: 2500,
            condition: Condition::Good,
            platform: Platform::Ps5,
            description: None,
        }
    }

    #[test]
    fn format_distance_switches_units_at_one_km() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(0.8504), "850m");
        assert_eq!(format_distance(0.9996), "1000m");
        assert_eq!(format_distance(1.0), "1.0km");
        assert_eq!(format_distance(3.249), "3.2km");
    }

    #[test]
    fn price_uses_rupee_sign() {
        assert_eq!(format_price(2500), "₹2500");
    }

    #[test]
    fn platform_serializes_display_names() {
        let json = serde_json::to_string(&Platform::Switch).unwrap();
        assert_eq!(json, r#""Nintendo Switch""#);
        let ps5: Platform = serde_json::from_str(r#""PS5""#).unwrap();
        assert_eq!(ps5, Platform::Ps5);
        assert_eq!(Platform::Pc.to_string(), "PC");
    }

    #[test]
    fn text_match_covers_listing_titles() {
        let player = Player {
            id: "player-1".into(),
            name: "Alex_42".into(),
            game: "Valorant".into(),
            location: Coordinate::DEFAULT_ORIGIN,
            distance: 1.0,
            is_online: true,
            last_seen: "now".into(),
            level: None,
            achievements: Vec::new(),
            listings: vec![listing("FIFA 24")],
            contact: None,
        };
        assert!(player.matches_text("fifa"));
        assert!(player.matches_text("alex"));
        assert!(player.matches_text("valo"));
        assert!(!player.matches_text("zelda"));
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let player = Player {
            id: "p".into(),
            name: "n".into(),
            game: "g".into(),
            location: Coordinate::new(1.0, 2.0),
            distance: 0.5,
            is_online: false,
            last_seen: "5 minutes ago".into(),
            level: None,
            achievements: Vec::new(),
            listings: Vec::new(),
            contact: None,
        };
        let v = serde_json::to_value(&player).unwrap();
        assert!(v.get("listings").is_none());
        assert!(v.get("contact").is_none());
        let back: Player = serde_json::from_value(v).unwrap();
        assert_eq!(back, player);
    }
}
