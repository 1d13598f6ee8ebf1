//! Game state machine

use bevy::prelude::*;

/// Main game states
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    #[default]
    MainMenu,
    Connecting,
    Playing,
    /// Escape menu. The world keeps simulating on the server; local hoof loops pause.
    Paused,
}
