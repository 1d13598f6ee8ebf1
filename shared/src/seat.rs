//! Mount seats
//!
//! A mount owns its seats for its whole lifetime. Occupants are rider ids (peer ids of
//! the riding players); each seat also carries the occupant's latest input snapshot.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RideError;
use crate::policy::PermissionDenied;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SeatConfig {
    pub seat_id: String,
    pub controllable: bool,
    /// Where the rider sits, relative to the mount origin.
    pub attach_offset: Vec3,
    /// Rider rotation offset (degrees).
    pub mount_rotation: Vec3,
    pub teleport_on_unmount: bool,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            seat_id: "rider".to_string(),
            controllable: true,
            attach_offset: Vec3::new(0.0, 1.4, 0.0),
            mount_rotation: Vec3::ZERO,
            teleport_on_unmount: false,
        }
    }
}

/// Input snapshot of a seat's occupant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SeatControls {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub sprint: bool,
}

impl SeatControls {
    pub fn tries_to_move(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }

    pub fn tries_to_turn(&self) -> bool {
        self.left || self.right
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MountSeat {
    pub config: SeatConfig,
    pub occupant: Option<u64>,
    pub controls: SeatControls,
}

impl MountSeat {
    pub fn new(config: SeatConfig) -> Self {
        Self {
            config,
            occupant: None,
            controls: SeatControls::default(),
        }
    }
}

/// All seats of a mount, in fixed iteration order.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MountSeats(pub Vec<MountSeat>);

impl MountSeats {
    pub fn from_configs(configs: &[SeatConfig]) -> Self {
        Self(configs.iter().cloned().map(MountSeat::new).collect())
    }

    pub fn any_mounted(&self) -> bool {
        self.0.iter().any(|seat| seat.occupant.is_some())
    }

    pub fn riders(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().filter_map(|seat| seat.occupant)
    }

    pub fn seat_of(&self, rider: u64) -> Option<usize> {
        self.0.iter().position(|seat| seat.occupant == Some(rider))
    }

    pub fn first_free(&self) -> Option<usize> {
        self.0.iter().position(|seat| seat.occupant.is_none())
    }

    pub fn mount(&mut self, index: usize, rider: u64) -> Result<(), RideError> {
        let len = self.0.len();
        let seat = self
            .0
            .get_mut(index)
            .ok_or(RideError::SeatOutOfRange { index, len })?;
        if seat.occupant.is_some() {
            return Err(RideError::SeatOccupied(index));
        }
        seat.occupant = Some(rider);
        seat.controls = SeatControls::default();
        Ok(())
    }

    /// Clear the rider's seat. Returns the seat index it occupied.
    pub fn unmount(&mut self, rider: u64) -> Option<usize> {
        let index = self.seat_of(rider)?;
        let seat = &mut self.0[index];
        seat.occupant = None;
        seat.controls = SeatControls::default();
        Some(index)
    }

    /// Store the rider's latest input. False if the rider is not seated here.
    pub fn set_controls(&mut self, rider: u64, controls: SeatControls) -> bool {
        match self.seat_of(rider) {
            Some(index) => {
                self.0[index].controls = controls;
                true
            }
            None => false,
        }
    }
}

/// Mount eligibility: wild animals (generation below the species minimum) refuse riders
/// outside creative mode.
pub fn check_can_mount(
    generation: u32,
    min_generation: u32,
    creative: bool,
) -> Result<(), PermissionDenied> {
    if generation < min_generation && !creative {
        return Err(PermissionDenied::new("generation", "toowild"));
    }
    Ok(())
}
