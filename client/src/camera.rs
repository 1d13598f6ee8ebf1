//! Third-person orbit camera around the local player

use bevy::prelude::*;
use shared::{LocalPlayer, Riding, PLAYER_HEIGHT};

use crate::input::InputState;

/// Orbit radius on foot
const ORBIT_DISTANCE: f32 = 5.5;
/// Pulled back further while seated so the whole mount is in view
const ORBIT_DISTANCE_RIDING: f32 = 8.0;
const DEFAULT_PITCH: f32 = 0.25;

/// Update camera to follow local player
pub fn update_camera(
    player_query: Query<(&Transform, Option<&Riding>), (With<LocalPlayer>, Without<Camera3d>)>,
    mut camera_query: Query<&mut Transform, (With<Camera3d>, Without<LocalPlayer>)>,
    input_state: Res<InputState>,
    time: Res<Time>,
) {
    let Some((player_transform, riding)) = player_query.iter().next() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let distance = if riding.is_some() {
        ORBIT_DISTANCE_RIDING
    } else {
        ORBIT_DISTANCE
    };
    let pivot = player_transform.translation + Vec3::Y * PLAYER_HEIGHT * 0.5;
    let pitch = (DEFAULT_PITCH - input_state.pitch * 0.6).clamp(-0.2, 1.3);
    let target_pos = orbit_position(pivot, input_state.yaw, pitch, distance);
    let target_rot = Transform::from_translation(target_pos)
        .looking_at(pivot, Vec3::Y)
        .rotation;

    let t = 1.0_f32 - (-35.0 * time.delta_secs()).exp();
    camera_transform.translation = camera_transform.translation.lerp(target_pos, t);
    camera_transform.rotation = camera_transform.rotation.slerp(target_rot, t);
}

/// Camera position on a sphere around the pivot; pitch 0 is level behind, positive is above.
fn orbit_position(pivot: Vec3, yaw: f32, pitch: f32, distance: f32) -> Vec3 {
    let behind = Vec3::new(yaw.sin(), 0.0, yaw.cos());
    pivot + behind * distance * pitch.cos() + Vec3::Y * distance * pitch.sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_position_keeps_distance() {
        let pivot = Vec3::new(1.0, 2.0, 3.0);
        let pos = orbit_position(pivot, 0.7, 0.4, 5.0);
        assert!((pos.distance(pivot) - 5.0).abs() < 1e-4);
        assert!(pos.y > pivot.y);
    }
}
