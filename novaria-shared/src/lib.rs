#![deny(clippy::unwrap_used)]

pub mod command;
pub mod config;
pub mod error;
pub mod materials;
pub mod tick;
pub mod wire;
pub mod world;

pub use config::SimConfig;
pub use error::SimError;
pub use tick::TickContext;
