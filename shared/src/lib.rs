//! Shared code for the riding server and client: the riding core (stamina, gait, seat
//! motion, animation/sound mediation, sync codes), configuration, and the network
//! protocol.

pub mod animation;
pub mod attributes;
pub mod components;
pub mod config;
pub mod error;
pub mod gait;
pub mod motion;
pub mod movement;
pub mod physics;
pub mod player;
pub mod policy;
pub mod protocol;
pub mod riding;
pub mod seat;
pub mod sound;
pub mod species;
pub mod stamina;
pub mod sync;

pub use animation::*;
pub use attributes::*;
pub use components::*;
pub use config::*;
pub use error::*;
pub use gait::*;
pub use motion::*;
pub use movement::*;
pub use physics::*;
pub use player::*;
pub use policy::*;
pub use protocol::*;
pub use riding::*;
pub use seat::*;
pub use sound::*;
pub use species::*;
pub use stamina::*;
pub use sync::*;

use lightyear::prelude::PeerId;

/// Namespace for persisted attributes and log lines.
pub const MOD_ID: &str = "hoofbeat";

/// Stable numeric id of a peer, used as the rider id on seats.
pub fn peer_id_to_u64(peer_id: PeerId) -> u64 {
    match peer_id {
        PeerId::Netcode(id) => id,
        PeerId::Steam(id) => id,
        PeerId::Local(id) => id,
        PeerId::Entity(id) => id,
        PeerId::Raw(addr) => {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            addr.hash(&mut hasher);
            hasher.finish()
        }
        PeerId::Server => 0,
    }
}
