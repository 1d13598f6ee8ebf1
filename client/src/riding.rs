//! Client-side riding
//!
//! Every replicated mount carries its own riding state on the client. For the mount the
//! local player controls, that copy runs the seat translator and gait machine against
//! local keys so there is no round trip, rolls the stamina downgrade, and reports gait and
//! sprint changes to the server. For everyone else it follows the replicated gait. Either
//! way its animation and sound commands drive the local collaborators.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::Connected;
use rand::rngs::StdRng;
use rand::SeedableRng;

use shared::{
    peer_id_to_u64, ActiveAnimations, AnimTarget, ControlScheme, Gait, Mount, MountAccessories,
    MountBody, MountGait, MountPacket, MountPose, MountSeats, Player, ReliableChannel, RideEnv,
    RideOutput, RidePolicies, Rideable, RidingConfig, RidingSounds, SeatControls,
    SoundCommand, SpeciesRegistry, SprintObserver, StaminaState, SyncAction, SyncCode, WorldCalendar,
    FIXED_TIMESTEP_HZ,
};

use crate::input::InputState;
use crate::states::GameState;

/// Riders seen on a mount last tick, to spot mounts and dismounts in replicated seats.
#[derive(Component, Default, Debug, PartialEq)]
pub struct KnownRiders(pub Vec<u64>);

/// A sound command for one mount, consumed by the audio layer.
#[derive(Message, Clone, Debug, PartialEq)]
pub struct MountSound {
    pub mount: Entity,
    pub command: SoundCommand,
}

/// Randomness for the stamina downgrade roll.
#[derive(Resource)]
pub struct RideRng(pub StdRng);

impl Default for RideRng {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

/// Give each replicated mount its local riding state
pub fn attach_riding_state(
    mut commands: Commands,
    species: Res<SpeciesRegistry>,
    new_mounts: Query<(Entity, &Mount), Added<Mount>>,
) {
    for (entity, mount) in new_mounts.iter() {
        let config = match species.get(&mount.species) {
            Ok(config) => config,
            Err(e) => {
                warn!("Mount {}: {}; it will not animate", mount.id, e);
                continue;
            }
        };
        commands.entity(entity).insert((
            Rideable::new(config.rideable.clone(), config.shadows()),
            RidingSounds::default(),
            SprintObserver::default(),
            ActiveAnimations::default(),
            KnownRiders::default(),
        ));
    }
}

/// Seats as this client sees them: replicated, with the local rider's keys swapped in.
pub fn local_seat_view(seats: &MountSeats, local: u64, controls: SeatControls) -> MountSeats {
    let mut view = seats.clone();
    view.set_controls(local, controls);
    view
}

/// Sprint code to send this tick. The observer only turns on under control, so a flip back
/// to off is still sent on the tick the local rider loses control or leaves.
pub fn sprint_packet(observer: &mut SprintObserver, is_controller: bool, sprinting: bool) -> Option<SyncCode> {
    observer.observe(is_controller && sprinting)
}

/// Gait code the controller still owes the server after a tick that moved its gait from
/// `before` to `after`. Codes already queued in `packets` count as reported.
pub fn gait_packet(before: Gait, after: Gait, packets: &[SyncCode]) -> Option<SyncCode> {
    let reported = packets
        .iter()
        .rev()
        .find_map(|code| match code.action() {
            SyncAction::SetGait(gait) => Some(gait),
            SyncAction::SetSprinting(_) => None,
        })
        .unwrap_or(before);
    (after != reported).then(|| SyncCode::for_gait(after))
}

/// Run the local riding step for every mount
pub fn tick_local_riding(
    config: Res<RidingConfig>,
    policies: Res<RidePolicies>,
    time: Res<Time>,
    input: Res<InputState>,
    game_state: Res<State<GameState>>,
    calendar: Query<&WorldCalendar>,
    mut rng: ResMut<RideRng>,
    mut client: Query<(&LocalId, &mut MessageSender<MountPacket>), (With<crate::GameClient>, With<Connected>)>,
    mut mounts: Query<(
        Entity,
        &Mount,
        &MountPose,
        &MountBody,
        &MountSeats,
        Ref<MountAccessories>,
        &MountGait,
        &StaminaState,
        &mut Rideable,
        &mut SprintObserver,
        &mut KnownRiders,
        &mut ActiveAnimations,
    )>,
    mut riders: Query<(&Player, &mut ActiveAnimations), Without<Mount>>,
    mut sounds: MessageWriter<MountSound>,
) {
    let Ok((local_id, mut sender)) = client.single_mut() else {
        return;
    };
    let local = peer_id_to_u64(local_id.0);
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    let now_ms = time.elapsed().as_millis() as u64;
    let total_hours = calendar.iter().next().map_or(0.0, |c| c.total_hours);
    let controls = if game_state.get() == &GameState::Paused {
        SeatControls::default()
    } else {
        input.seat_controls()
    };

    for (
        entity,
        mount,
        pose,
        body,
        replicated_seats,
        accessories,
        gait,
        stamina,
        mut rideable,
        mut observer,
        mut known,
        mut mount_anims,
    ) in mounts.iter_mut()
    {
        rideable.debug = config.debug_mode;
        let env = RideEnv {
            now_ms,
            on_ground: body.on_ground,
            swimming: body.swimming,
            alive: body.alive,
            authoritative: false,
            position: pose.position,
        };
        let seats = local_seat_view(replicated_seats, local, controls);
        let mut out = RideOutput::default();

        if accessories.is_changed() {
            rideable.scheme = ControlScheme::from_accessories(&accessories.0);
        }

        // Mount / unmount bookkeeping from the replicated seats
        let current: Vec<u64> = seats.riders().collect();
        if current != known.0 {
            for rider in known.0.iter().filter(|r| !current.contains(r)) {
                rideable.did_unmount(*rider, total_hours, body.swimming, &seats, &mut out);
            }
            for rider in current.iter().filter(|r| !known.0.contains(r)) {
                let scheme = ControlScheme::from_accessories(&accessories.0);
                if let Err(e) = rideable.did_mount(*rider, scheme, &mut out) {
                    error!("Mount {}: {}", mount.id, e);
                }
            }
            known.0 = current;
        }

        let mut is_controller = false;
        if seats.any_mounted() {
            let gait_before = rideable.gait();
            let mut yaw = pose.yaw;
            rideable.update_angle_and_motion(dt, &mut yaw, &seats, &env, &policies, &mut out);
            is_controller = rideable.state.controller == Some(local);

            // Observers take the server's gait; the controller decides its own.
            if !is_controller && rideable.gait() != gait.0 {
                if let Err(e) = rideable.receive_sync(SyncCode::for_gait(gait.0), &seats, &env, &mut out) {
                    error!("Mount {}: {}", mount.id, e);
                }
            }
            if let Err(e) = rideable.update_riding_state(&seats, &env, &mut out) {
                error!("Mount {}: {}", mount.id, e);
            }
            if is_controller {
                rideable.stamina_gait_check(dt, body.swimming, stamina, &mut rng.0, &mut out);
                // Sprint-key cycles and the backward override move the gait without a code
                if let Some(code) = gait_packet(gait_before, rideable.gait(), &out.packets) {
                    out.packets.push(code);
                }
            }
        } else if rideable.gait() != gait.0 {
            rideable.state.gait.set(gait.0);
        }

        // Sprint flag: observed locally and sent only on change
        if let Some(code) = sprint_packet(&mut observer, is_controller, rideable.state.controls.sprint) {
            out.packets.push(code);
        }

        for code in out.packets.drain(..) {
            if config.debug_mode {
                debug!("Mount {} sending {:?} ({})", mount.id, code, code.code());
            }
            sender.send::<ReliableChannel>(MountPacket::new(mount.id, code));
        }

        // Denials are reported by the server, which also owns the toast.
        out.denials.clear();

        for command in out.anims.drain(..) {
            match command.target() {
                AnimTarget::Mount => mount_anims.apply(&command),
                AnimTarget::Rider(rider) => {
                    if let Some((_, mut anims)) = riders
                        .iter_mut()
                        .find(|(p, _)| peer_id_to_u64(p.client_id) == rider)
                    {
                        anims.apply(&command);
                    }
                }
            }
        }

        for command in out.sounds.drain(..) {
            sounds.write(MountSound { mount: entity, command });
        }
    }
}

/// Drive the hoof loops from each mount's motion and the pause state
pub fn update_riding_sounds(
    time: Res<Time>,
    game_state: Res<State<GameState>>,
    mut mounts: Query<(Entity, &Rideable, &MountBody, &MountPose, &mut RidingSounds)>,
    mut sounds: MessageWriter<MountSound>,
) {
    let paused = game_state.get() == &GameState::Paused;
    let dt = time.delta_secs();
    for (entity, rideable, body, pose, mut riding_sounds) in mounts.iter_mut() {
        let mut commands = riding_sounds.update_pause(paused);
        commands.extend(riding_sounds.update(
            dt,
            rideable.state.should_move,
            rideable.gait(),
            body.on_ground,
            pose.position,
        ));
        for command in commands {
            sounds.write(MountSound { mount: entity, command });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::SeatConfig;

    #[test]
    fn test_local_seat_view_only_touches_local_rider() {
        let mut seats = MountSeats::from_configs(&[SeatConfig::default(), SeatConfig::default()]);
        seats.mount(0, 7).expect("seat 0");
        seats.mount(1, 8).expect("seat 1");
        let remote = SeatControls {
            forward: true,
            ..default()
        };
        seats.set_controls(8, remote);

        let local = SeatControls {
            sprint: true,
            left: true,
            ..default()
        };
        let view = local_seat_view(&seats, 7, local);
        assert_eq!(view.0[0].controls, local);
        assert_eq!(view.0[1].controls, remote);

        // Not seated: nothing changes
        let untouched = local_seat_view(&seats, 99, local);
        assert_eq!(untouched.0[0].controls, SeatControls::default());
    }

    #[test]
    fn test_sprint_release_sent_when_control_is_lost() {
        let mut observer = SprintObserver::default();
        assert_eq!(sprint_packet(&mut observer, true, true), Some(SyncCode::SprintOn));
        assert_eq!(sprint_packet(&mut observer, true, true), None);
        // Control moved to another seat while the key is still held
        assert_eq!(sprint_packet(&mut observer, false, true), Some(SyncCode::SprintOff));
        assert_eq!(sprint_packet(&mut observer, false, false), None);

        // A passenger never reports sprinting
        let mut passenger = SprintObserver::default();
        assert_eq!(sprint_packet(&mut passenger, false, true), None);
    }

    #[test]
    fn test_controller_reports_manual_gait_changes() {
        // Sprint-key cycle with nothing queued
        assert_eq!(gait_packet(Gait::Walk, Gait::Canter, &[]), Some(SyncCode::SetCanter));
        // Backward override
        assert_eq!(gait_packet(Gait::Gallop, Gait::Walk, &[SyncCode::SprintOff]), Some(SyncCode::ForceWalk));
        // Stamina downgrade already queued its own code
        assert_eq!(gait_packet(Gait::Gallop, Gait::Canter, &[SyncCode::SetCanter]), None);
        // Cycled to Gallop, then downgraded back to the starting gait in the same tick
        assert_eq!(gait_packet(Gait::Canter, Gait::Canter, &[SyncCode::SetCanter]), None);
        assert_eq!(gait_packet(Gait::Walk, Gait::Walk, &[]), None);
    }
}
