//! World systems
//!
//! Spawning the static pasture: ground, lake, lights.

use bevy::prelude::*;
use bevy::light::{light_consts::lux, CascadeShadowConfigBuilder};
use shared::{LAKE_CENTER, LAKE_RADIUS, WATER_LEVEL, WORLD_HALF_EXTENT};

use super::rendering::{MoonLight, SunLight};

// =============================================================================
// COMPONENTS
// =============================================================================

/// Root entity for all client-side world visuals
#[derive(Component)]
pub struct ClientWorldRoot;

// =============================================================================
// SPAWNING
// =============================================================================

/// Spawn the visual world
pub fn spawn_world(
    mut commands: Commands,
    world_roots: Query<Entity, With<ClientWorldRoot>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !world_roots.is_empty() {
        return;
    }

    // IMPORTANT: this is the parent of the ground / lights.
    // It must have GlobalTransform or Bevy will emit B0004 warnings for children.
    let root = commands
        .spawn((
            ClientWorldRoot,
            Transform::default(),
            GlobalTransform::default(),
            Visibility::default(),
            InheritedVisibility::default(),
        ))
        .id();

    commands.entity(root).with_children(|parent| {
        // Grass. The lake basin dips below it; the water plane hides the seam.
        parent.spawn((
            Mesh3d(meshes.add(Plane3d::default().mesh().size(WORLD_HALF_EXTENT * 2.0, WORLD_HALF_EXTENT * 2.0))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.32, 0.45, 0.22),
                perceptual_roughness: 0.95,
                ..default()
            })),
            Transform::from_xyz(0.0, 0.0, 0.0),
        ));

        parent.spawn((
            Mesh3d(meshes.add(Circle::new(LAKE_RADIUS))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgba(0.15, 0.35, 0.55, 0.8),
                alpha_mode: AlphaMode::Blend,
                perceptual_roughness: 0.1,
                ..default()
            })),
            Transform::from_xyz(LAKE_CENTER.x, WATER_LEVEL.max(0.02), LAKE_CENTER.y)
                .with_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
        ));

        // --- Sun light (driven by the world calendar) ---
        parent.spawn((
            SunLight,
            DirectionalLight {
                illuminance: lux::AMBIENT_DAYLIGHT,
                shadows_enabled: true,
                color: Color::srgb(1.0, 0.97, 0.9),
                ..default()
            },
            CascadeShadowConfigBuilder {
                num_cascades: 2,
                maximum_distance: 80.0,
                first_cascade_far_bound: 15.0,
                ..default()
            }
            .build(),
            Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.7, 0.3, 0.0)),
        ));

        // --- Moon light (keeps night rides readable) ---
        parent.spawn((
            MoonLight,
            DirectionalLight {
                illuminance: 800.0,
                shadows_enabled: false,
                color: Color::srgb(0.7, 0.8, 1.0),
                ..default()
            },
            Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, 0.7, -0.3, 0.0)),
        ));
    });

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.85, 0.9, 0.85),
        brightness: 80.0,
        affects_lightmapped_meshes: true,
    });

    info!("Spawned client world visuals");
}
