//! Rider placement and mount interaction helpers shared by client and server

use bevy::prelude::*;

use crate::components::MountPose;
use crate::player::MOUNT_INTERACT_RANGE;
use crate::seat::SeatConfig;

/// World rotation of a mount heading. Yaw 0 faces +Z, matching the move intent.
pub fn mount_rotation(yaw: f32) -> Quat {
    Quat::from_rotation_y(yaw)
}

/// Where a seated rider sits in world space.
pub fn seat_world_position(pose: &MountPose, seat: &SeatConfig) -> Vec3 {
    pose.position + mount_rotation(pose.yaw) * seat.attach_offset
}

/// Rider yaw while seated: the mount heading plus the seat's rotation offset. The rider
/// camera looks down -Z, so it is turned half a circle from the mount's +Z heading.
pub fn seat_world_yaw(pose: &MountPose, seat: &SeatConfig) -> f32 {
    pose.yaw + seat.mount_rotation.y.to_radians() + std::f32::consts::PI
}

/// Where a rider ends up after climbing off: beside the mount, or on the seat itself
/// for seats that teleport on unmount.
pub fn dismount_position(pose: &MountPose, seat: &SeatConfig) -> Vec3 {
    if seat.teleport_on_unmount {
        return seat_world_position(pose, seat);
    }
    let side = mount_rotation(pose.yaw) * Vec3::new(1.6, 0.0, 0.0);
    Vec3::new(pose.position.x + side.x, pose.position.y + 0.5, pose.position.z + side.z)
}

pub fn can_interact_with_mount(player_pos: Vec3, pose: &MountPose) -> bool {
    player_pos.distance(pose.position) < MOUNT_INTERACT_RANGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_follows_heading() {
        let seat = SeatConfig {
            attach_offset: Vec3::new(0.0, 1.0, 1.0),
            ..default()
        };
        let pose = MountPose {
            position: Vec3::new(10.0, 0.0, 0.0),
            yaw: std::f32::consts::FRAC_PI_2,
        };
        let world = seat_world_position(&pose, &seat);
        assert!((world - Vec3::new(11.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_interaction_range() {
        let pose = MountPose::default();
        assert!(can_interact_with_mount(Vec3::new(2.0, 0.0, 0.0), &pose));
        assert!(!can_interact_with_mount(Vec3::new(5.0, 0.0, 0.0), &pose));
    }
}
