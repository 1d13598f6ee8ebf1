//! Server-side riding systems
//!
//! Updated for Lightyear 0.25

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
use std::collections::HashMap;

use shared::{
    boundary_face, can_interact_with_mount, check_can_mount, dismount_position, ground_clearance_center,
    peer_id_to_u64, seat_world_position, seat_world_yaw, step_character, step_mount_body, ControlScheme,
    FatigueHooks, Mount, MountAccessories, MountBody, MountGait, MountPacket, MountPose, MountSeats,
    MoveEnv, Player, PlayerGrounded, PlayerInput, PlayerPosition, PlayerRotation, PlayerVelocity,
    ReliableChannel, RideEnv, RideOutput, RidePolicies, RideRejected, Rideable, Riding, RidingConfig,
    StaminaEnv, StaminaState, StaminaTicker, SyncAction, WorldCalendar, FIXED_TIMESTEP_HZ,
    SPAWN_POSITION,
};

use crate::mounts::{BodyExtents, MountIntent};

/// Denials are repeated every tick while a rider keeps pushing; tell them at most this often.
const DENIAL_RESEND_MS: u64 = 1000;

/// Stores the latest input for each connected client.
/// We use PeerId in Lightyear 0.25
#[derive(Resource, Default)]
pub struct ClientInputs {
    pub latest: HashMap<PeerId, PlayerInput>,
    /// Peers that pressed interact since the last interaction pass.
    pub interact_requests: Vec<PeerId>,
}

fn now_ms(time: &Time) -> u64 {
    time.elapsed().as_millis() as u64
}

fn ride_env(now_ms: u64, pose: &MountPose, body: &MountBody) -> RideEnv {
    RideEnv {
        now_ms,
        on_ground: body.on_ground,
        swimming: body.swimming,
        alive: body.alive,
        authoritative: true,
        position: pose.position,
    }
}

/// The server has no animation or sound collaborators; it only reports what it decided.
fn log_ride_output(mount_id: u64, out: &RideOutput, debug_mode: bool) {
    if !debug_mode {
        return;
    }
    for command in &out.anims {
        debug!("Mount {} anim {:?}", mount_id, command);
    }
    for code in &out.packets {
        debug!("Mount {} sync {:?}", mount_id, code);
    }
}

fn send_rejection(
    links: &mut Query<(&RemoteId, &mut MessageSender<RideRejected>), With<ClientOf>>,
    peer_id: PeerId,
    message: RideRejected,
) {
    for (remote_id, mut sender) in links.iter_mut() {
        if remote_id.0 == peer_id {
            sender.send::<ReliableChannel>(message);
            return;
        }
    }
}

/// Clear a rider from its seat and run the unmount bookkeeping. Returns the seat index
/// the rider occupied.
fn dismount_rider(
    rider: u64,
    seats: &mut MountSeats,
    rideable: &mut Rideable,
    stamina: &mut StaminaState,
    body: &MountBody,
    total_hours: f64,
    mount_id: u64,
    debug_mode: bool,
) -> Option<usize> {
    let was_controller = rideable.state.controller == Some(rider);
    let index = seats.unmount(rider)?;
    let mut out = RideOutput::default();
    rideable.did_unmount(rider, total_hours, body.swimming, seats, &mut out);
    log_ride_output(mount_id, &out, debug_mode);
    // The leaving controller can no longer send 2424; whoever takes over sends 4242 again.
    if (was_controller || !seats.any_mounted()) && stamina.sprinting {
        stamina.sprinting = false;
    }
    Some(index)
}

/// Handle new client connections - setup message channels and spawn the player
/// In Lightyear 0.25, we query for newly added ClientOf + Connected entities
pub fn handle_connections(
    mut commands: Commands,
    // Query for client links that just got Connected
    new_clients: Query<(Entity, &RemoteId), (Added<Connected>, With<ClientOf>)>,
) {
    let creative = std::env::var("HOOFBEAT_CREATIVE").is_ok_and(|v| v == "1");

    for (client_entity, remote_id) in new_clients.iter() {
        let peer_id = remote_id.0;
        info!("Client connected: {:?}", peer_id);

        // IMPORTANT: enable replication + message I/O on this client link.
        //
        // Lightyear 0.25 requires you to add these components to the connection entity
        // (the entity with `ClientOf` + `Connected`). Without them, no replication happens.
        commands.entity(client_entity).insert((
            // Replication out: server -> this client
            ReplicationSender::new(shared::protocol::tick_duration(), SendUpdatesMode::SinceLastAck, false),
            // Client -> Server
            MessageReceiver::<PlayerInput>::default(),
            MessageReceiver::<MountPacket>::default(),
            // Server -> Client
            MessageSender::<RideRejected>::default(),
        ));

        let spawn = Vec3::new(
            SPAWN_POSITION[0],
            SPAWN_POSITION[1].max(ground_clearance_center()),
            SPAWN_POSITION[2],
        );
        commands.spawn((
            Player {
                client_id: peer_id,
                creative,
            },
            PlayerPosition(spawn),
            PlayerRotation(0.0),
            PlayerVelocity::default(),
            PlayerGrounded::default(),
            Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
            ControlledBy {
                owner: client_entity,
                lifetime: Lifetime::default(),
            },
        ));
        info!("Player spawned for {:?} (creative: {})", peer_id, creative);
    }
}

/// Free the seat and despawn the player on disconnect
/// This is an observer that triggers when a client gets Disconnected component added
pub fn handle_disconnections(
    trigger: On<Add, Disconnected>,
    mut commands: Commands,
    config: Res<RidingConfig>,
    client_entities: Query<&RemoteId>,
    players: Query<(Entity, &Player, Option<&Riding>)>,
    calendar: Query<&WorldCalendar>,
    mut mounts: Query<(&Mount, &MountBody, &mut MountSeats, &mut Rideable, &mut StaminaState)>,
    mut inputs: ResMut<ClientInputs>,
) {
    let client_entity = trigger.entity;

    // Get peer ID from client entity
    let Ok(remote_id) = client_entities.get(client_entity) else {
        warn!("Disconnect trigger for entity {:?} but no RemoteId found", client_entity);
        return;
    };
    let peer_id = remote_id.0;
    info!("Client {:?} disconnected: {:?}", client_entity, peer_id);

    let total_hours = calendar.iter().next().map_or(0.0, |c| c.total_hours);
    let rider = peer_id_to_u64(peer_id);
    for (player_entity, player, riding) in players.iter() {
        if player.client_id != peer_id {
            continue;
        }
        if let Some(riding) = riding {
            for (mount, body, mut seats, mut rideable, mut stamina) in mounts.iter_mut() {
                if mount.id == riding.mount_id {
                    dismount_rider(
                        rider,
                        &mut seats,
                        &mut rideable,
                        &mut stamina,
                        body,
                        total_hours,
                        mount.id,
                        config.debug_mode,
                    );
                    info!("Freed seat {} on mount {}", riding.seat, mount.id);
                }
            }
        }
        commands.entity(player_entity).despawn();
    }

    inputs.latest.remove(&peer_id);
    inputs.interact_requests.retain(|p| *p != peer_id);
}

/// Receive input messages from clients
/// In Lightyear 0.25, we read from MessageReceiver components
pub fn receive_client_input(
    mut inputs: ResMut<ClientInputs>,
    // Query client link entities that have a MessageReceiver for PlayerInput
    mut client_links: Query<(&RemoteId, &mut MessageReceiver<PlayerInput>), With<ClientOf>>,
) {
    for (remote_id, mut receiver) in client_links.iter_mut() {
        for input in receiver.receive() {
            if input.interact && !inputs.interact_requests.contains(&remote_id.0) {
                inputs.interact_requests.push(remote_id.0);
            }
            inputs.latest.insert(remote_id.0, input);
        }
    }
}

/// Handle mount / dismount requests
pub fn handle_mount_interactions(
    mut commands: Commands,
    config: Res<RidingConfig>,
    mut inputs: ResMut<ClientInputs>,
    calendar: Query<&WorldCalendar>,
    mut players: Query<(Entity, &Player, &mut PlayerPosition, Option<&Riding>)>,
    mut mounts: Query<(
        &Mount,
        &MountPose,
        &MountBody,
        &mut MountSeats,
        &mut Rideable,
        &mut StaminaState,
        &MountAccessories,
    )>,
    mut links: Query<(&RemoteId, &mut MessageSender<RideRejected>), With<ClientOf>>,
) {
    let total_hours = calendar.iter().next().map_or(0.0, |c| c.total_hours);
    let requests: Vec<PeerId> = inputs.interact_requests.drain(..).collect();

    for peer_id in requests {
        let Some((player_entity, player, mut player_pos, riding)) =
            players.iter_mut().find(|(_, p, _, _)| p.client_id == peer_id)
        else {
            continue;
        };
        let rider = peer_id_to_u64(peer_id);

        if let Some(riding) = riding {
            for (mount, pose, body, mut seats, mut rideable, mut stamina, _) in mounts.iter_mut() {
                if mount.id != riding.mount_id {
                    continue;
                }
                if let Some(index) = dismount_rider(
                    rider,
                    &mut seats,
                    &mut rideable,
                    &mut stamina,
                    body,
                    total_hours,
                    mount.id,
                    config.debug_mode,
                ) {
                    player_pos.0 = dismount_position(pose, &seats.0[index].config);
                }
                info!("Player {:?} dismounted mount {}", peer_id, mount.id);
            }
            commands.entity(player_entity).remove::<Riding>();
            continue;
        }

        // Nearest mount in range with a free seat
        let nearest = mounts
            .iter_mut()
            .filter(|(_, pose, _, seats, _, _, _)| {
                can_interact_with_mount(player_pos.0, pose) && seats.first_free().is_some()
            })
            .min_by(|a, b| {
                let da = a.1.position.distance_squared(player_pos.0);
                let db = b.1.position.distance_squared(player_pos.0);
                da.total_cmp(&db)
            });
        let Some((mount, _, _, mut seats, mut rideable, _, accessories)) = nearest else {
            continue;
        };

        if let Err(denied) = check_can_mount(mount.generation, rideable.config.min_generation, player.creative) {
            info!("Player {:?} refused by mount {}: {}", peer_id, mount.id, denied.code);
            send_rejection(
                &mut links,
                peer_id,
                RideRejected {
                    mount_id: mount.id,
                    lang_key: denied.code,
                },
            );
            continue;
        }

        let Some(index) = seats.first_free() else {
            continue;
        };
        if let Err(e) = seats.mount(index, rider) {
            warn!("Mount {} seat {}: {}", mount.id, index, e);
            continue;
        }

        let scheme = ControlScheme::from_accessories(&accessories.0);
        let mut out = RideOutput::default();
        if let Err(e) = rideable.did_mount(rider, scheme, &mut out) {
            error!("Mount {}: {}", mount.id, e);
        }
        log_ride_output(mount.id, &out, config.debug_mode);

        commands.entity(player_entity).insert(Riding {
            mount_id: mount.id,
            seat: index,
        });
        info!(
            "Player {:?} mounted {} {} in seat {} ({:?} controls)",
            peer_id, mount.species, mount.id, index, scheme
        );
    }
}

/// Copy each seated rider's latest input onto its seat
pub fn apply_seat_controls(
    inputs: Res<ClientInputs>,
    riders: Query<(&Player, &Riding)>,
    mut mounts: Query<(&Mount, &mut MountSeats)>,
) {
    for (mount, mut seats) in mounts.iter_mut() {
        for (player, riding) in riders.iter() {
            if riding.mount_id != mount.id {
                continue;
            }
            let controls = inputs
                .latest
                .get(&player.client_id)
                .map(PlayerInput::seat_controls)
                .unwrap_or_default();
            let rider = peer_id_to_u64(player.client_id);
            let current = seats.seat_of(rider).map(|i| seats.0[i].controls);
            if current.is_some() && current != Some(controls) {
                seats.set_controls(rider, controls);
            }
        }
    }
}

/// Apply gait and sprint codes sent by the controlling client
pub fn receive_mount_packets(
    config: Res<RidingConfig>,
    time: Res<Time>,
    mut client_links: Query<(&RemoteId, &mut MessageReceiver<MountPacket>), With<ClientOf>>,
    mut mounts: Query<(
        &Mount,
        &MountPose,
        &MountBody,
        &MountSeats,
        &mut Rideable,
        &mut StaminaState,
        &mut MountGait,
    )>,
) {
    let now = now_ms(&time);
    for (remote_id, mut receiver) in client_links.iter_mut() {
        let rider = peer_id_to_u64(remote_id.0);
        for packet in receiver.receive() {
            let Some(code) = packet.sync_code() else {
                debug!("Ignoring unknown mount packet code {} from {:?}", packet.code, remote_id.0);
                continue;
            };
            let Some((mount, pose, body, seats, mut rideable, mut stamina, mut gait)) =
                mounts.iter_mut().find(|(m, ..)| m.id == packet.mount_id)
            else {
                continue;
            };
            if seats.seat_of(rider).is_none() {
                debug!("Ignoring {:?} for mount {}: sender is not seated", code, mount.id);
                continue;
            }
            if config.debug_mode {
                debug!("Mount {} received {:?} ({}) from {:?}", mount.id, code, code.code(), remote_id.0);
            }

            let env = ride_env(now, pose, body);
            let mut out = RideOutput::default();
            match rideable.receive_sync(code, seats, &env, &mut out) {
                Ok(true) => {}
                Ok(false) => {
                    if let SyncAction::SetSprinting(sprinting) = code.action() {
                        if stamina.sprinting != sprinting {
                            stamina.sprinting = sprinting;
                        }
                    }
                }
                Err(e) => error!("Mount {}: {}", mount.id, e),
            }
            log_ride_output(mount.id, &out, config.debug_mode);

            if gait.0 != rideable.gait() {
                gait.0 = rideable.gait();
            }
        }
    }
}

/// Evaluate each mount's stamina window (authoritative)
pub fn tick_stamina(
    config: Res<RidingConfig>,
    hooks: Res<FatigueHooks>,
    calendar: Query<&WorldCalendar>,
    mut mounts: Query<(
        Entity,
        &Mount,
        &MountPose,
        &MountBody,
        &MountSeats,
        &mut StaminaState,
        &mut StaminaTicker,
    )>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    let time_scale = calendar.iter().next().map_or(1.0, WorldCalendar::time_scale);

    for (entity, mount, pose, body, seats, mut stamina, mut ticker) in mounts.iter_mut() {
        let Some(elapsed) = ticker.advance(dt) else {
            continue;
        };
        let env = StaminaEnv {
            authoritative: true,
            alive: body.alive,
            swimming: body.swimming,
            mounted: seats.any_mounted(),
            time_scale,
            entity: Some(entity),
            position: Some(pose.position),
        };
        let fatigued = stamina.evaluate_window(elapsed, &env, &config, &hooks);
        if config.debug_mode && fatigued {
            debug!(
                "Mount {} fatigued to {:.1}/{:.1} (sprinting: {}, swimming: {})",
                mount.id,
                stamina.stamina(),
                stamina.max_stamina(),
                stamina.sprinting,
                body.swimming
            );
        }
    }
}

/// Run the seat translator and riding reconciliation, and derive each mount's move intent
pub fn tick_riding(
    config: Res<RidingConfig>,
    policies: Res<RidePolicies>,
    time: Res<Time>,
    players: Query<&Player>,
    mut links: Query<(&RemoteId, &mut MessageSender<RideRejected>), With<ClientOf>>,
    mut last_denial: Local<HashMap<u64, u64>>,
    mut mounts: Query<(
        &Mount,
        &mut MountPose,
        &MountBody,
        &MountSeats,
        &mut Rideable,
        &mut MountGait,
        &mut MountIntent,
    )>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    let now = now_ms(&time);

    for (mount, mut pose, body, seats, mut rideable, mut gait, mut intent) in mounts.iter_mut() {
        rideable.debug = config.debug_mode;
        let env = ride_env(now, &pose, body);
        let mut out = RideOutput::default();

        if seats.any_mounted() {
            let mut yaw = pose.yaw;
            rideable.update_angle_and_motion(dt, &mut yaw, seats, &env, &policies, &mut out);
            if yaw != pose.yaw {
                pose.yaw = yaw;
            }
            if let Err(e) = rideable.update_riding_state(seats, &env, &mut out) {
                error!("Mount {}: {}", mount.id, e);
            }
        }

        for (rider, denied) in out.denials.drain(..) {
            let due = last_denial
                .get(&rider)
                .is_none_or(|last| now.saturating_sub(*last) >= DENIAL_RESEND_MS);
            if !due {
                continue;
            }
            last_denial.insert(rider, now);
            debug!("Rider {} denied by '{}' on mount {}", rider, denied.policy, mount.id);
            if let Some(player) = players.iter().find(|p| peer_id_to_u64(p.client_id) == rider) {
                send_rejection(
                    &mut links,
                    player.client_id,
                    RideRejected {
                        mount_id: mount.id,
                        lang_key: denied.lang_key(),
                    },
                );
            }
        }
        log_ride_output(mount.id, &out, config.debug_mode);

        if gait.0 != rideable.gait() {
            gait.0 = rideable.gait();
        }

        let move_env = MoveEnv {
            swimming: body.swimming,
            climbing_face: boundary_face(pose.position),
            submergedness: body.submergedness,
            collided_horizontally: body.collided_horizontally,
            alive: body.alive,
        };
        match rideable.move_intent(pose.yaw, &move_env) {
            Ok(next) => intent.0 = next,
            Err(e) => {
                error!("Mount {}: {}", mount.id, e);
                intent.0 = default();
            }
        }
    }
}

/// Integrate mount bodies from their move intents
pub fn simulate_mounts(
    mut mounts: Query<(&mut MountBody, &mut MountPose, &MountIntent, &BodyExtents, &Rideable)>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    for (mut body, mut pose, intent, extents, rideable) in mounts.iter_mut() {
        let jump = rideable.state.controls.jump;
        step_mount_body(&mut body, &mut pose, &intent.0, jump, extents.0, dt);
    }
}

/// Keep seated riders on their seat
pub fn sync_riders(
    mounts: Query<(&Mount, &MountPose, &MountSeats)>,
    mut riders: Query<(&Riding, &mut PlayerPosition, &mut PlayerRotation, &mut PlayerVelocity)>,
) {
    for (riding, mut position, mut rotation, mut velocity) in riders.iter_mut() {
        let Some((_, pose, seats)) = mounts.iter().find(|(m, _, _)| m.id == riding.mount_id) else {
            continue;
        };
        let Some(seat) = seats.0.get(riding.seat) else {
            continue;
        };
        position.0 = seat_world_position(pose, &seat.config);
        rotation.0 = seat_world_yaw(pose, &seat.config);
        velocity.0 = Vec3::ZERO;
    }
}

/// Simulate all players on foot
pub fn simulate_players(
    inputs: Res<ClientInputs>,
    mut players: Query<
        (&Player, &mut PlayerPosition, &mut PlayerRotation, &mut PlayerVelocity, &mut PlayerGrounded),
        Without<Riding>,
    >,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    for (player, mut position, mut rotation, mut velocity, mut grounded) in players.iter_mut() {
        let input = inputs
            .latest
            .get(&player.client_id)
            .cloned()
            .unwrap_or_default();
        step_character(&input, &mut position, &mut rotation, &mut velocity, &mut grounded, dt);
    }
}
