//! Shared types and core logic for the playermap workspace: geography,
//! population generation, filtering, caching, the map marker lifecycle,
//! and the bus / REST schemas used by the app and UI crates.

mod api;
mod cache;
mod clipboard;
mod config;
mod event;
mod filter;
mod generate;
mod geo;
mod locate;
mod map;
mod message;
mod player;

pub use api::*;
pub use cache::*;
pub use clipboard::*;
pub use config::*;
pub use event::*;
pub use filter::*;
pub use generate::*;
pub use geo::*;
pub use locate::*;
pub use map::*;
pub use message::*;
pub use player::*;
