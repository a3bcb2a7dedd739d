//! Simulated actors for running without real clients.

pub mod presence;
