//! Player-related constants

/// Player movement speed on foot (units per second)
pub const PLAYER_SPEED: f32 = 6.0;

/// Player height (for capsule)
pub const PLAYER_HEIGHT: f32 = 1.8;

/// Mouse sensitivity for look
pub const MOUSE_SENSITIVITY: f32 = 0.003;

/// Spawn position for new players
pub const SPAWN_POSITION: [f32; 3] = [0.0, 2.0, 6.0];

/// How close a player has to be to a mount to climb on (units)
pub const MOUNT_INTERACT_RANGE: f32 = 3.5;
