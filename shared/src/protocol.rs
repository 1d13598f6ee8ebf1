//! Lightyear network protocol definition
//!
//! Lightyear 0.25 - merged entity model

use bevy::prelude::*;
use lightyear::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::components::{
    Mount, MountBody, MountGait, MountPose, Player, PlayerPosition, PlayerRotation, Riding,
    WorldCalendar,
};
use crate::motion::MountAccessories;
use crate::seat::{MountSeats, SeatControls};
use crate::stamina::StaminaState;
use crate::sync::SyncCode;

// --- Input ---

/// Player input sent from client to server each tick. On foot it moves the player; while
/// seated it becomes the seat's control snapshot.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct PlayerInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    /// Gait key (cycles Walk / Canter / Gallop while riding)
    pub sprint: bool,
    /// Player's facing direction (yaw) for on-foot movement
    pub yaw: f32,
    /// Request to mount the nearest creature or climb off the current one
    pub interact: bool,
}

impl PlayerInput {
    pub fn seat_controls(&self) -> SeatControls {
        SeatControls {
            forward: self.forward,
            backward: self.backward,
            left: self.left,
            right: self.right,
            jump: self.jump,
            sprint: self.sprint,
        }
    }
}

// --- Messages ---

/// Client -> Server: gait / sprint sync code for a mount. Only the code is meaningful.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct MountPacket {
    pub mount_id: u64,
    pub code: i32,
}

impl MountPacket {
    pub fn new(mount_id: u64, code: SyncCode) -> Self {
        Self {
            mount_id,
            code: code.code(),
        }
    }

    pub fn sync_code(&self) -> Option<SyncCode> {
        SyncCode::from_code(self.code)
    }
}

/// Server -> Client: a ride or mount attempt was refused.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct RideRejected {
    pub mount_id: u64,
    /// Localisation key, e.g. `cantride-nosaddle` or `toowild`
    pub lang_key: String,
}

// --- Channels ---
// In Lightyear 0.25, Channel trait is auto-implemented for all Send + Sync + 'static types

/// Reliable channel for sync codes and rejections
pub struct ReliableChannel;

/// Unreliable channel for frequent input (lowest latency)
pub struct InputChannel;

// --- Protocol Plugin ---

pub struct ProtocolPlugin;

impl Plugin for ProtocolPlugin {
    fn build(&self, app: &mut App) {
        // === PLAYER COMPONENTS ===
        app.register_component::<Player>()
            .add_prediction();

        app.register_component::<PlayerPosition>()
            .add_prediction();

        app.register_component::<PlayerRotation>()
            .add_prediction();

        app.register_component::<Riding>()
            .add_prediction();

        // === MOUNT COMPONENTS ===
        app.register_component::<Mount>()
            .add_prediction();

        app.register_component::<MountPose>()
            .add_prediction();

        app.register_component::<MountBody>()
            .add_prediction();

        app.register_component::<MountSeats>()
            .add_prediction();

        app.register_component::<MountGait>()
            .add_prediction();

        app.register_component::<MountAccessories>()
            .add_prediction();

        app.register_component::<StaminaState>()
            .add_prediction();

        // === WORLD COMPONENTS ===
        app.register_component::<WorldCalendar>()
            .add_prediction();

        // === MESSAGES ===
        // Client -> Server
        app.register_message::<PlayerInput>()
            .add_direction(NetworkDirection::ClientToServer);
        app.register_message::<MountPacket>()
            .add_direction(NetworkDirection::ClientToServer);

        // Server -> Client
        app.register_message::<RideRejected>()
            .add_direction(NetworkDirection::ServerToClient);

        // === CHANNELS ===
        app.add_channel::<ReliableChannel>(ChannelSettings {
            mode: ChannelMode::OrderedReliable(ReliableSettings::default()),
            ..default()
        })
        // Ordered: gait codes for one mount must arrive in send order
        .add_direction(NetworkDirection::Bidirectional);

        app.add_channel::<InputChannel>(ChannelSettings {
            mode: ChannelMode::UnorderedUnreliable,
            ..default()
        })
        .add_direction(NetworkDirection::ClientToServer);
    }
}

// --- Network Configuration ---

pub const SERVER_PORT: u16 = 5000;
pub const SERVER_ADDR: &str = "127.0.0.1";
pub const PROTOCOL_ID: u64 = 0x486F_6F66_6265_6174;

/// Server bind address
pub fn get_server_bind_addr() -> &'static str {
    "0.0.0.0"
}

/// Shared private key for local development
pub const PRIVATE_KEY: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
    0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
];

/// Fixed timestep for riding and physics (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Tick duration for lightyear plugins
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_packet_carries_only_the_code() {
        let packet = MountPacket::new(7, SyncCode::SetGallop);
        assert_eq!(packet.code, 9997);
        assert_eq!(packet.sync_code(), Some(SyncCode::SetGallop));

        let bogus = MountPacket { mount_id: 7, code: 31337 };
        assert_eq!(bogus.sync_code(), None);
    }

    #[test]
    fn test_input_maps_to_seat_controls() {
        let input = PlayerInput {
            forward: true,
            sprint: true,
            yaw: 1.0,
            ..default()
        };
        let controls = input.seat_controls();
        assert!(controls.forward && controls.sprint);
        assert!(!controls.jump);
    }
}
