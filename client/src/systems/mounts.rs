//! Mount visuals
//!
//! Placeholder creature meshes built from the species body, smoothed transform sync, and
//! a leg cycle driven by the mount's active animations.

use bevy::prelude::*;
use shared::{mount_rotation, ActiveAnimations, ControlCode, Mount, MountPose, SpeciesRegistry};

// =============================================================================
// COMPONENTS
// =============================================================================

/// Marker for mount visual entities
#[derive(Component)]
pub struct MountVisual;

/// One leg, pivoting at the hip.
#[derive(Component)]
pub struct MountLeg {
    /// Diagonal pairs move together.
    pub phase: f32,
    pub hip: Vec3,
}

/// Client-side render smoothing state for mounts. When a new authoritative pose arrives we
/// correct toward it instead of snapping.
#[derive(Component, Clone, Copy, Default)]
pub struct MountRenderSmoothing {
    pub initialized: bool,
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Component, Default)]
pub struct LegCycle {
    pub time: f32,
}

/// Leg swing frequency (rad/s) for the playing control animation. Negative runs backwards.
pub fn stride_rate(animations: &ActiveAnimations) -> f32 {
    const RATES: [(ControlCode, f32); 5] = [
        (ControlCode::Sprint, 12.0),
        (ControlCode::Canter, 8.0),
        (ControlCode::Walk, 4.5),
        (ControlCode::WalkBack, -3.5),
        (ControlCode::Swim, 3.0),
    ];
    RATES
        .iter()
        .find(|(code, _)| animations.is_active(code.as_str()))
        .map_or(0.0, |(_, rate)| *rate)
}

// =============================================================================
// SPAWNING
// =============================================================================

/// Build a creature out of primitives when a mount is replicated
pub fn handle_mount_spawned(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    species: Res<SpeciesRegistry>,
    new_mounts: Query<(Entity, &Mount, &MountPose), Added<Mount>>,
) {
    for (entity, mount, pose) in new_mounts.iter() {
        let (half, color) = match species.get(&mount.species) {
            Ok(config) => (config.body, config.color),
            Err(e) => {
                warn!("Mount {}: {}; using a default body", mount.id, e);
                (Vec3::new(0.5, 0.8, 1.1), [0.5, 0.5, 0.5])
            }
        };
        info!("Mount {} ({}) spawned at {:?}", mount.id, mount.species, pose.position);

        let coat = materials.add(StandardMaterial {
            base_color: Color::srgb(color[0], color[1], color[2]),
            perceptual_roughness: 0.9,
            ..default()
        });
        let hoof = materials.add(StandardMaterial {
            base_color: Color::srgb(0.12, 0.1, 0.08),
            perceptual_roughness: 0.7,
            ..default()
        });

        commands.entity(entity).insert((
            Transform::from_translation(pose.position).with_rotation(mount_rotation(pose.yaw)),
            Visibility::Inherited,
            MountVisual,
            MountRenderSmoothing {
                initialized: true,
                position: pose.position,
                yaw: pose.yaw,
            },
            LegCycle::default(),
        ));

        let leg_len = half.y * 0.9;
        let torso_h = half.y * 0.8;
        let leg_mesh = meshes.add(Cuboid::new(half.x * 0.3, leg_len, half.x * 0.3));
        commands.entity(entity).with_children(|parent| {
            // Torso sits on the legs
            parent.spawn((
                Mesh3d(meshes.add(Cuboid::new(half.x * 2.0, torso_h, half.z * 2.0))),
                MeshMaterial3d(coat.clone()),
                Transform::from_xyz(0.0, -half.y + leg_len + torso_h * 0.5, 0.0),
            ));
            // Neck and head at +Z, which is forward for yaw 0
            parent.spawn((
                Mesh3d(meshes.add(Cuboid::new(half.x * 0.6, half.y * 0.9, half.x * 0.6))),
                MeshMaterial3d(coat.clone()),
                Transform::from_xyz(0.0, half.y * 0.55, half.z * 0.95)
                    .with_rotation(Quat::from_rotation_x(0.5)),
            ));
            parent.spawn((
                Mesh3d(meshes.add(Cuboid::new(half.x * 0.55, half.x * 0.55, half.z * 0.5))),
                MeshMaterial3d(coat.clone()),
                Transform::from_xyz(0.0, half.y * 0.95, half.z * 1.3),
            ));

            let hip_y = -half.y + leg_len;
            let corners = [
                (-1.0, 1.0, 0.0),
                (1.0, 1.0, std::f32::consts::PI),
                (-1.0, -1.0, std::f32::consts::PI),
                (1.0, -1.0, 0.0),
            ];
            for (sx, sz, phase) in corners {
                let hip = Vec3::new(sx * half.x * 0.65, hip_y, sz * half.z * 0.75);
                parent.spawn((
                    MountLeg { phase, hip },
                    Mesh3d(leg_mesh.clone()),
                    MeshMaterial3d(hoof.clone()),
                    Transform::from_translation(hip - Vec3::Y * leg_len * 0.5),
                ));
            }
        });
    }
}

// =============================================================================
// TRANSFORM SYNC
// =============================================================================

/// Sync mount transforms from the replicated pose
pub fn sync_mount_transforms(
    time: Res<Time>,
    mut mounts: Query<(&MountPose, &mut MountRenderSmoothing, &mut Transform), With<Mount>>,
) {
    let dt = time.delta_secs();
    let t_pos = 1.0_f32 - (-25.0 * dt).exp();
    let t_rot = 1.0_f32 - (-30.0 * dt).exp();

    for (pose, mut smooth, mut transform) in mounts.iter_mut() {
        if !smooth.initialized {
            *smooth = MountRenderSmoothing {
                initialized: true,
                position: pose.position,
                yaw: pose.yaw,
            };
        } else {
            smooth.position = smooth.position.lerp(pose.position, t_pos);
            smooth.yaw = lerp_angle(smooth.yaw, pose.yaw, t_rot);
        }
        transform.translation = smooth.position;
        transform.rotation = mount_rotation(smooth.yaw);
    }
}

/// Swing legs at the rate of whatever locomotion animation is playing
pub fn animate_mount_legs(
    time: Res<Time>,
    mut mounts: Query<(&ActiveAnimations, &mut LegCycle, &Children), With<Mount>>,
    mut legs: Query<(&MountLeg, &mut Transform)>,
) {
    for (animations, mut cycle, children) in mounts.iter_mut() {
        let rate = stride_rate(animations);
        cycle.time += time.delta_secs() * rate;
        let amplitude = if rate == 0.0 { 0.0 } else { 0.45 };
        for child in children.iter() {
            let Ok((leg, mut transform)) = legs.get_mut(child) else {
                continue;
            };
            let swing = (cycle.time + leg.phase).sin() * amplitude;
            let rotation = Quat::from_rotation_x(swing);
            let half_len = (transform.translation - leg.hip).length();
            transform.rotation = rotation;
            transform.translation = leg.hip + rotation * (Vec3::NEG_Y * half_len);
        }
    }
}

// =============================================================================
// ANGLE HELPERS
// =============================================================================

fn angle_diff(from: f32, to: f32) -> f32 {
    let diff = to - from;
    ((diff + std::f32::consts::PI).rem_euclid(std::f32::consts::TAU)) - std::f32::consts::PI
}

fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    from + angle_diff(from, to) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AnimCommand, AnimTarget, AnimationMeta};

    #[test]
    fn test_stride_rate_follows_active_control() {
        let mut animations = ActiveAnimations::default();
        assert_eq!(stride_rate(&animations), 0.0);

        animations.apply(&AnimCommand::Start {
            target: AnimTarget::Mount,
            meta: AnimationMeta::named("canter"),
        });
        assert_eq!(stride_rate(&animations), 8.0);

        animations.apply(&AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "canter".into(),
        });
        animations.apply(&AnimCommand::Start {
            target: AnimTarget::Mount,
            meta: AnimationMeta::named("walkback"),
        });
        assert!(stride_rate(&animations) < 0.0);
    }

    #[test]
    fn test_lerp_angle_takes_short_way_round() {
        let mid = lerp_angle(6.0, 0.2, 0.5);
        assert!(mid > 6.0 || mid < 0.2);
    }
}
