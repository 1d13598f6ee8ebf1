//! Client-side game systems
//!
//! Organized into submodules for maintainability.

mod connection;
mod mounts;
mod player;
mod rendering;
mod world;

// Re-export everything for easy access from main.rs
pub use connection::*;
pub use mounts::*;
pub use player::*;
pub use rendering::*;
pub use world::*;
