//! Player character systems
//!
//! Capsule riders, local player tagging, and transform sync.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::Connected;
use shared::{ActiveAnimations, LocalPlayer, Player, PlayerPosition, PlayerRotation, Riding, PLAYER_HEIGHT};

// =============================================================================
// COMPONENTS
// =============================================================================

/// Child mesh of a player; leans back while a rider animation plays.
#[derive(Component)]
pub struct PlayerModel;

/// Render-side smoothing state, so 60Hz replication does not step at high frame rates.
#[derive(Component, Default)]
pub struct PlayerRenderSmoothing {
    pub initialized: bool,
    pub position: Vec3,
}

// =============================================================================
// SPAWNING
// =============================================================================

/// Give each replicated player a capsule and an animation set
pub fn handle_player_spawned(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    new_players: Query<(Entity, &Player, &PlayerPosition), Added<Player>>,
) {
    for (entity, player, position) in new_players.iter() {
        info!("Player {:?} spawned at {:?}", player.client_id, position.0);

        let material = materials.add(StandardMaterial {
            base_color: if player.creative {
                Color::srgb(0.8, 0.7, 0.25)
            } else {
                Color::srgb(0.35, 0.3, 0.6)
            },
            perceptual_roughness: 0.8,
            ..default()
        });

        commands
            .entity(entity)
            .insert((
                Transform::from_translation(position.0),
                Visibility::Inherited,
                PlayerRenderSmoothing::default(),
                ActiveAnimations::default(),
            ))
            .with_children(|parent| {
                parent.spawn((
                    PlayerModel,
                    Mesh3d(meshes.add(Capsule3d::new(0.3, PLAYER_HEIGHT - 0.6))),
                    MeshMaterial3d(material),
                    Transform::default(),
                ));
            });
    }
}

// =============================================================================
// LOCAL PLAYER TAGGING
// =============================================================================

/// Ensure exactly one `Player` entity is tagged as `LocalPlayer`, based on our `LocalId`.
///
/// The first replicated `Player` can arrive while we're still connecting, so an
/// `Added<Player>` check alone would miss it.
pub fn ensure_local_player_tag(
    mut commands: Commands,
    client_query: Query<&LocalId, (With<crate::GameClient>, With<Connected>)>,
    players: Query<(Entity, &Player)>,
    existing_local: Query<Entity, With<LocalPlayer>>,
) {
    let Some(our_peer_id) = client_query.iter().next().map(|r| r.0) else {
        return;
    };
    let Some(local_entity) = players
        .iter()
        .find(|(_, p)| p.client_id == our_peer_id)
        .map(|(e, _)| e)
    else {
        return;
    };

    for e in existing_local.iter() {
        if e != local_entity {
            commands.entity(e).remove::<LocalPlayer>();
        }
    }
    if !existing_local.contains(local_entity) {
        commands.entity(local_entity).insert(LocalPlayer);
        info!("Tagged local player {:?}", local_entity);
    }
}

// =============================================================================
// TRANSFORM SYNC
// =============================================================================

/// Sync player transforms from replicated state. Seated riders snap so they never drift
/// off the saddle; players on foot are smoothed.
pub fn sync_player_transforms(
    time: Res<Time>,
    mut players: Query<(
        &PlayerPosition,
        &PlayerRotation,
        Option<&Riding>,
        &mut PlayerRenderSmoothing,
        &mut Transform,
    )>,
) {
    let t = 1.0_f32 - (-25.0 * time.delta_secs()).exp();

    for (position, rotation, riding, mut smooth, mut transform) in players.iter_mut() {
        if !smooth.initialized || riding.is_some() {
            smooth.initialized = true;
            smooth.position = position.0;
        } else {
            smooth.position = smooth.position.lerp(position.0, t);
        }
        transform.translation = smooth.position;
        transform.rotation = Quat::from_rotation_y(rotation.0);
    }
}

/// Lean the capsule while any rider animation is active
pub fn pose_riders(
    players: Query<(&ActiveAnimations, &Children), (With<Player>, Changed<ActiveAnimations>)>,
    mut models: Query<&mut Transform, With<PlayerModel>>,
) {
    for (animations, children) in players.iter() {
        let riding_anim = animations.names().next().is_some();
        for child in children.iter() {
            if let Ok(mut transform) = models.get_mut(child) {
                transform.rotation = if riding_anim {
                    Quat::from_rotation_x(-0.2)
                } else {
                    Quat::IDENTITY
                };
            }
        }
    }
}
