//! Shared ECS components used by both server and client

use bevy::prelude::*;
use lightyear::prelude::PeerId;
use serde::{Deserialize, Serialize};

use crate::gait::Gait;

// =============================================================================
// WORLD CALENDAR
// =============================================================================

/// Server-authoritative in-game calendar replicated to clients.
///
/// Stamina is evaluated in in-game seconds, so fatigue and regeneration follow
/// `speed_of_time * calendar_speed_mul` rather than wall-clock time.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WorldCalendar {
    pub total_hours: f64,
    /// In-game seconds per real second.
    pub speed_of_time: f32,
    pub calendar_speed_mul: f32,
}

impl WorldCalendar {
    pub const DEFAULT_SPEED_OF_TIME: f32 = 60.0;
    pub const DEFAULT_CALENDAR_SPEED_MUL: f32 = 0.5;
    /// Start early morning.
    pub const DEFAULT_START_HOURS: f64 = 6.0;

    pub fn new(total_hours: f64, speed_of_time: f32, calendar_speed_mul: f32) -> Self {
        Self {
            total_hours: total_hours.max(0.0),
            speed_of_time,
            calendar_speed_mul,
        }
    }

    pub fn new_default() -> Self {
        Self::new(
            Self::DEFAULT_START_HOURS,
            Self::DEFAULT_SPEED_OF_TIME,
            Self::DEFAULT_CALENDAR_SPEED_MUL,
        )
    }

    pub fn time_scale(&self) -> f32 {
        self.speed_of_time * self.calendar_speed_mul
    }

    pub fn advance(&mut self, dt: f32) {
        let game_seconds = f64::from(dt.max(0.0) * self.time_scale());
        self.total_hours += game_seconds / 3600.0;
    }

    pub fn hour_of_day(&self) -> f32 {
        self.total_hours.rem_euclid(24.0) as f32
    }
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Marker component for player entities
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Player {
    pub client_id: PeerId,
    /// Creative players may ride animals that are too wild for everyone else.
    pub creative: bool,
}

/// Player position component - replicated across network
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PlayerPosition(pub Vec3);

/// Player rotation (yaw only) - replicated across network
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PlayerRotation(pub f32);

/// Player velocity (server-authoritative). Not replicated.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PlayerVelocity(pub Vec3);

/// On-foot grounded state (server-authoritative)
#[derive(Component, Clone, Debug, Default)]
pub struct PlayerGrounded {
    pub on_ground: bool,
    /// Time since last grounded (for coyote time)
    pub time_since_grounded: f32,
}

impl PlayerGrounded {
    pub const COYOTE_TIME: f32 = 0.1;

    pub fn can_jump(&self) -> bool {
        self.on_ground || self.time_since_grounded < Self::COYOTE_TIME
    }
}

/// Present on a player while seated on a mount. Replicated.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Riding {
    pub mount_id: u64,
    pub seat: usize,
}

/// Marker for the local player (client-side only)
#[derive(Component)]
pub struct LocalPlayer;

// =============================================================================
// MOUNTS
// =============================================================================

/// A rideable creature.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Mount {
    pub id: u64,
    pub species: String,
    pub generation: u32,
}

/// Position and heading of a mount - replicated across network
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MountPose {
    pub position: Vec3,
    pub yaw: f32,
}

/// Physical state of a mount as seen by the riding logic. Server-authoritative,
/// replicated so clients can drive their local riding state from it.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MountBody {
    pub velocity: Vec3,
    pub on_ground: bool,
    /// Seconds since the body last touched the ground.
    pub airborne_time: f32,
    pub swimming: bool,
    /// 0 at the swim line, 1 fully submerged.
    pub submergedness: f32,
    pub collided_horizontally: bool,
    pub alive: bool,
}

impl Default for MountBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            on_ground: false,
            airborne_time: 0.0,
            swimming: false,
            submergedness: 0.0,
            collided_horizontally: false,
            alive: true,
        }
    }
}

/// The server's view of a mount's gait. Observing clients fold it into their own
/// riding state; the controlling client ignores it.
#[derive(Component, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MountGait(pub Gait);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_advances_in_game_time() {
        let mut calendar = WorldCalendar::new_default();
        assert_eq!(calendar.time_scale(), 30.0);

        // 120 real seconds at 30x = one in-game hour
        calendar.advance(120.0);
        assert!((calendar.total_hours - 7.0).abs() < 1e-9);
        assert!((calendar.hour_of_day() - 7.0).abs() < 1e-6);

        calendar.advance(-5.0);
        assert!((calendar.total_hours - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_coyote_jump() {
        let grounded = PlayerGrounded {
            on_ground: false,
            time_since_grounded: 0.05,
        };
        assert!(grounded.can_jump());
        let falling = PlayerGrounded {
            on_ground: false,
            time_since_grounded: 0.2,
        };
        assert!(!falling.can_jump());
    }
}
