//! Shared character and mount physics.
//!
//! A flat meadow with one lake basin. The server runs these at the fixed timestep; the
//! riding logic only asks the mount body whether it is on the ground, swimming or alive.

use bevy::prelude::*;

use crate::components::{MountBody, MountPose, PlayerGrounded, PlayerPosition, PlayerRotation, PlayerVelocity};
use crate::player::{PLAYER_HEIGHT, PLAYER_SPEED};
use crate::protocol::PlayerInput;
use crate::riding::MoveIntent;

/// Gravity in m/s^2 (negative Y).
pub const GRAVITY: f32 = -18.0;

/// Horizontal acceleration in m/s^2.
pub const MOVE_ACCEL: f32 = 45.0;

/// Horizontal deceleration when no input ("friction") in m/s^2.
pub const MOVE_BRAKE: f32 = 55.0;

/// How close to the ground we "snap" when falling (prevents tiny hovering).
pub const GROUND_SNAP_DISTANCE: f32 = 0.35;

/// On-foot jump velocity in m/s (upward).
pub const JUMP_VELOCITY: f32 = 7.5;

/// Mount jump velocity in m/s (upward).
pub const MOUNT_JUMP_VELOCITY: f32 = 6.5;

/// Surface height of the lake.
pub const WATER_LEVEL: f32 = -0.4;

pub const LAKE_CENTER: Vec2 = Vec2::new(30.0, -30.0);
pub const LAKE_RADIUS: f32 = 18.0;
pub const LAKE_DEPTH: f32 = 4.0;

/// Half size of the playable square.
pub const WORLD_HALF_EXTENT: f32 = 200.0;

/// A mount counts as swimming once this much of its body is under water.
pub const SWIM_SUBMERGED_THRESHOLD: f32 = 0.6;

/// Vertical pull toward the swim line while swimming (1/s).
pub const SWIM_SPRING: f32 = 3.0;

/// Intent fly/buoyancy values are per physics frame; this turns them into m/s.
pub const FLY_TO_VELOCITY: f32 = 60.0;

/// Ground height at a point. Flat except for the lake basin.
pub fn ground_height(x: f32, z: f32) -> f32 {
    let d = Vec2::new(x, z).distance(LAKE_CENTER);
    if d >= LAKE_RADIUS {
        return 0.0;
    }
    let t = 1.0 - d / LAKE_RADIUS;
    -LAKE_DEPTH * t * (2.0 - t)
}

#[inline]
pub fn ground_clearance_center() -> f32 {
    PLAYER_HEIGHT * 0.5
}

/// Step an on-foot player one fixed tick.
pub fn step_character(
    input: &PlayerInput,
    position: &mut PlayerPosition,
    rotation: &mut PlayerRotation,
    velocity: &mut PlayerVelocity,
    grounded: &mut PlayerGrounded,
    dt: f32,
) {
    rotation.0 = input.yaw;

    // In Bevy: +X right, +Y up, -Z forward.
    let forward = Vec3::new(-rotation.0.sin(), 0.0, -rotation.0.cos());
    let right = Vec3::new(rotation.0.cos(), 0.0, -rotation.0.sin());

    let mut move_dir = Vec3::ZERO;
    if input.forward {
        move_dir += forward;
    }
    if input.backward {
        move_dir -= forward;
    }
    if input.right {
        move_dir += right;
    }
    if input.left {
        move_dir -= right;
    }
    let moving = move_dir.length_squared() > 0.0;
    if moving {
        move_dir = move_dir.normalize();
    }

    let desired_horiz = move_dir * PLAYER_SPEED;
    let mut horiz = Vec3::new(velocity.0.x, 0.0, velocity.0.z);
    let delta = desired_horiz - horiz;
    let max_change = if moving { MOVE_ACCEL } else { MOVE_BRAKE } * dt;
    if delta.length() <= max_change {
        horiz = desired_horiz;
    } else {
        horiz += delta * (max_change / delta.length());
    }
    velocity.0.x = horiz.x;
    velocity.0.z = horiz.z;

    if input.jump && grounded.can_jump() && velocity.0.y < 1.0 {
        velocity.0.y = JUMP_VELOCITY;
        grounded.time_since_grounded = PlayerGrounded::COYOTE_TIME;
    }

    velocity.0.y += GRAVITY * dt;
    position.0 += velocity.0 * dt;
    position.0.x = position.0.x.clamp(-WORLD_HALF_EXTENT, WORLD_HALF_EXTENT);
    position.0.z = position.0.z.clamp(-WORLD_HALF_EXTENT, WORLD_HALF_EXTENT);

    let target_y = ground_height(position.0.x, position.0.z) + ground_clearance_center();
    let mut on_ground = false;
    if position.0.y < target_y {
        position.0.y = target_y;
        velocity.0.y = velocity.0.y.max(0.0);
        on_ground = true;
    } else if velocity.0.y <= 0.0 && (position.0.y - target_y) < GROUND_SNAP_DISTANCE {
        position.0.y = target_y;
        velocity.0.y = 0.0;
        on_ground = true;
    }

    grounded.on_ground = on_ground;
    if on_ground {
        grounded.time_since_grounded = 0.0;
    } else {
        grounded.time_since_grounded += dt;
    }
}

/// How deep the body sits in the lake: 0 at or above the swim line, 1 fully under.
pub fn submergedness(position: Vec3, half_extents: Vec3) -> f32 {
    let height = (half_extents.y * 2.0).max(f32::EPSILON);
    let bottom = position.y - half_extents.y;
    ((WATER_LEVEL - bottom) / height).clamp(0.0, 1.0)
}

/// Direction of the world edge the body is pressed against, if any. Used as the climbed
/// face for the move intent so riders slide along the edge.
pub fn boundary_face(position: Vec3) -> Option<Vec3> {
    let limit = WORLD_HALF_EXTENT - 0.01;
    let axis = |v: f32| {
        if v >= limit {
            1.0
        } else if v <= -limit {
            -1.0
        } else {
            0.0
        }
    };
    let face = Vec3::new(axis(position.x), 0.0, axis(position.z));
    (face != Vec3::ZERO).then_some(face)
}

/// Step a mount body one fixed tick from the riding logic's move intent.
pub fn step_mount_body(
    body: &mut MountBody,
    pose: &mut MountPose,
    intent: &MoveIntent,
    jump: bool,
    half_extents: Vec3,
    dt: f32,
) {
    if !body.alive {
        body.velocity = Vec3::ZERO;
        return;
    }

    let horizontal = if body.swimming { intent.fly } else { intent.walk };
    body.velocity.x = horizontal.x;
    body.velocity.z = horizontal.z;

    if body.swimming {
        let swim_line = WATER_LEVEL - half_extents.y * 0.3;
        let drive = (intent.fly.y + intent.buoyancy) * FLY_TO_VELOCITY;
        body.velocity.y = (swim_line - pose.position.y) * SWIM_SPRING + drive;
    } else {
        if jump && body.on_ground {
            body.velocity.y = MOUNT_JUMP_VELOCITY;
        }
        body.velocity.y += GRAVITY * dt;
    }

    pose.position += body.velocity * dt;

    let limit = WORLD_HALF_EXTENT;
    body.collided_horizontally = pose.position.x.abs() > limit || pose.position.z.abs() > limit;
    pose.position.x = pose.position.x.clamp(-limit, limit);
    pose.position.z = pose.position.z.clamp(-limit, limit);

    let rest_y = ground_height(pose.position.x, pose.position.z) + half_extents.y;
    body.on_ground = false;
    if pose.position.y <= rest_y {
        pose.position.y = rest_y;
        body.velocity.y = body.velocity.y.max(0.0);
        body.on_ground = true;
    } else if body.velocity.y <= 0.0 && pose.position.y - rest_y < GROUND_SNAP_DISTANCE * 0.25 {
        pose.position.y = rest_y;
        body.velocity.y = 0.0;
        body.on_ground = true;
    }

    body.airborne_time = if body.on_ground { 0.0 } else { body.airborne_time + dt };
    body.submergedness = submergedness(pose.position, half_extents);
    body.swimming = body.submergedness >= SWIM_SUBMERGED_THRESHOLD;
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;
    const HALF: Vec3 = Vec3::new(0.5, 0.8, 1.1);

    #[test]
    fn test_lake_basin() {
        assert_eq!(ground_height(0.0, 0.0), 0.0);
        assert!((ground_height(LAKE_CENTER.x, LAKE_CENTER.y) + LAKE_DEPTH).abs() < 1e-5);
        assert!(ground_height(LAKE_CENTER.x + LAKE_RADIUS * 0.5, LAKE_CENTER.y) < WATER_LEVEL);
    }

    #[test]
    fn test_mount_lands_and_walks() {
        let mut body = MountBody::default();
        let mut pose = MountPose {
            position: Vec3::new(0.0, 3.0, 0.0),
            yaw: 0.0,
        };
        let idle = MoveIntent::default();
        for _ in 0..120 {
            step_mount_body(&mut body, &mut pose, &idle, false, HALF, DT);
        }
        assert!(body.on_ground);
        assert!((pose.position.y - HALF.y).abs() < 1e-4);
        assert!(!body.swimming);

        let walk = MoveIntent {
            walk: Vec3::new(0.0, 0.0, 2.0),
            ..default()
        };
        step_mount_body(&mut body, &mut pose, &walk, false, HALF, 0.5);
        assert!((pose.position.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_mount_jump_leaves_ground() {
        let mut body = MountBody {
            on_ground: true,
            ..default()
        };
        let mut pose = MountPose {
            position: Vec3::new(0.0, HALF.y, 0.0),
            yaw: 0.0,
        };
        step_mount_body(&mut body, &mut pose, &MoveIntent::default(), true, HALF, DT);
        assert!(!body.on_ground);
        assert!(body.velocity.y > 0.0);
        assert!(body.airborne_time > 0.0);
    }

    #[test]
    fn test_mount_swims_in_lake() {
        let mut body = MountBody::default();
        let mut pose = MountPose {
            position: Vec3::new(LAKE_CENTER.x, WATER_LEVEL - 1.0, LAKE_CENTER.y),
            yaw: 0.0,
        };
        body.submergedness = submergedness(pose.position, HALF);
        body.swimming = body.submergedness >= SWIM_SUBMERGED_THRESHOLD;
        assert!(body.swimming);

        for _ in 0..300 {
            step_mount_body(&mut body, &mut pose, &MoveIntent::default(), false, HALF, DT);
        }
        assert!(body.swimming);
        assert!(!body.on_ground);
        let swim_line = WATER_LEVEL - HALF.y * 0.3;
        assert!((pose.position.y - swim_line).abs() < 0.05);
    }

    #[test]
    fn test_boundary_face() {
        assert_eq!(boundary_face(Vec3::ZERO), None);
        assert_eq!(
            boundary_face(Vec3::new(WORLD_HALF_EXTENT, 0.0, -WORLD_HALF_EXTENT)),
            Some(Vec3::new(1.0, 0.0, -1.0))
        );
    }

    #[test]
    fn test_character_walks_forward() {
        let input = PlayerInput {
            forward: true,
            ..default()
        };
        let mut position = PlayerPosition(Vec3::new(0.0, ground_clearance_center(), 0.0));
        let mut rotation = PlayerRotation::default();
        let mut velocity = PlayerVelocity::default();
        let mut grounded = PlayerGrounded::default();
        for _ in 0..60 {
            step_character(&input, &mut position, &mut rotation, &mut velocity, &mut grounded, DT);
        }
        assert!(position.0.z < -3.0);
        assert!(grounded.on_ground);
    }
}
