//! Mount riding behaviour
//!
//! [`Rideable`] owns one mount's transient riding state and turns seat input into motion,
//! gait changes and a single active locomotion control. Side effects are collected in a
//! [`RideOutput`] for the calling system to apply (animations, sounds, sync packets,
//! error toasts).

use bevy::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;

use crate::animation::{
    AnimCommand, AnimTarget, AnimationMeta, ControlCode, RideableConfig, ShadowTargets,
};
use crate::error::RideError;
use crate::gait::{Gait, GaitMachine};
use crate::motion::{ControlScheme, MotionContext, MotionTranslator};
use crate::policy::{PermissionDenied, RidePolicies};
use crate::seat::MountSeats;
use crate::sound::SoundCommand;
use crate::stamina::StaminaState;
use crate::sync::{SyncAction, SyncCode};

/// A mid-jump ends this long after take-off once the mount is back on the ground (ms).
pub const JUMP_COMPLETE_MS: u64 = 500;

/// Angular velocity beyond which the turn-lean overlay plays.
pub const TURN_ANIM_THRESHOLD: f32 = 0.001;

/// Wander is suppressed for this many in-game hours after a dismount.
pub const WANDER_BLOCK_HOURS: f64 = 24.0;

/// Host-facing snapshot of the mount for one tick.
#[derive(Clone, Copy, Debug)]
pub struct RideEnv {
    pub now_ms: u64,
    pub on_ground: bool,
    pub swimming: bool,
    pub alive: bool,
    /// True on the server.
    pub authoritative: bool,
    pub position: Vec3,
}

impl RideEnv {
    fn motion_context(&self) -> MotionContext {
        MotionContext {
            now_ms: self.now_ms,
            on_ground: self.on_ground,
            alive: self.alive,
        }
    }
}

/// Movement controls derived from the riding state, read by the physics collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountControls {
    pub forward: bool,
    pub backward: bool,
    pub sprint: bool,
    pub jump: bool,
}

/// Side effects of one riding update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RideOutput {
    pub anims: Vec<AnimCommand>,
    pub sounds: Vec<SoundCommand>,
    pub packets: Vec<SyncCode>,
    pub denials: Vec<(u64, PermissionDenied)>,
}

impl RideOutput {
    pub fn is_empty(&self) -> bool {
        self.anims.is_empty()
            && self.sounds.is_empty()
            && self.packets.is_empty()
            && self.denials.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct RidingState {
    /// -1, 0 or 1.
    pub forward_speed: f32,
    pub angular_velocity: f32,
    pub gait: GaitMachine,
    pub translator: MotionTranslator,
    pub in_mid_jump: bool,
    pub jump_now: bool,
    pub mount_jump_anim: bool,
    pub cur_control: Option<ControlCode>,
    pub rider_control: Option<ControlCode>,
    pub cur_turn_anim: Option<String>,
    pub should_move: bool,
    pub controller: Option<u64>,
    pub controls: MountControls,
}

/// What the mount should do with its body this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveIntent {
    pub walk: Vec3,
    pub fly: Vec3,
    /// Added to vertical motion while swimming.
    pub buoyancy: f32,
}

/// Physics facts used to shape the move intent.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveEnv {
    pub swimming: bool,
    /// Outward normal of the face being climbed, if any.
    pub climbing_face: Option<Vec3>,
    /// 0 at the swim line, 1 fully submerged.
    pub submergedness: f32,
    pub collided_horizontally: bool,
    pub alive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiTask {
    Wander,
    Idle,
}

#[derive(Component, Clone, Debug)]
pub struct Rideable {
    pub config: RideableConfig,
    pub shadows: ShadowTargets,
    pub scheme: ControlScheme,
    pub state: RidingState,
    pub stamina_speed_multiplier: f32,
    pub last_dismount_total_hours: Option<f64>,
    pub debug: bool,
}

fn sign(v: f32) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

impl Rideable {
    pub fn new(config: RideableConfig, shadows: ShadowTargets) -> Self {
        Self {
            config,
            shadows,
            scheme: ControlScheme::Hold,
            state: RidingState::default(),
            stamina_speed_multiplier: 1.0,
            last_dismount_total_hours: None,
            debug: false,
        }
    }

    pub fn gait(&self) -> Gait {
        self.state.gait.current()
    }

    fn mount_anim(&self, out: &mut RideOutput, command: AnimCommand) {
        out.anims.extend(self.shadows.expand(command));
    }

    fn start_mount(&self, out: &mut RideOutput, meta: AnimationMeta) {
        self.mount_anim(
            out,
            AnimCommand::Start {
                target: AnimTarget::Mount,
                meta,
            },
        );
    }

    fn stop_mount(&self, out: &mut RideOutput, animation: &str) {
        self.mount_anim(
            out,
            AnimCommand::Stop {
                target: AnimTarget::Mount,
                animation: animation.to_string(),
            },
        );
    }

    /// Run the seat translator and integrate yaw. `dt` is clamped to ignore lag spikes.
    pub fn update_angle_and_motion(
        &mut self,
        dt: f32,
        yaw: &mut f32,
        seats: &MountSeats,
        env: &RideEnv,
        policies: &RidePolicies,
        out: &mut RideOutput,
    ) {
        let dt = dt.min(0.5);
        let state = &mut self.state;
        let motion = state.translator.seats_to_motion(
            seats,
            dt,
            &env.motion_context(),
            self.scheme,
            policies,
            &mut state.gait,
        );

        state.controller = motion.controller;
        state.jump_now |= motion.jump_now;
        out.denials.extend(motion.denials);

        state.forward_speed = f32::from(sign(motion.linear));
        state.angular_velocity = motion.angular * state.gait.current().yaw_multiplier();
        *yaw = (*yaw + motion.angular * dt * 30.0).rem_euclid(TAU);

        let since_jump = state.translator.ms_since_jump(env.now_ms);
        if state.mount_jump_anim && env.on_ground && since_jump > 200 && since_jump < 2000 {
            state.mount_jump_anim = false;
            self.stop_mount(out, "jump");
        }
    }

    /// Reconcile the derived control with the current gait and motion. Animation commands
    /// are only emitted when the control actually changes.
    pub fn update_riding_state(
        &mut self,
        seats: &MountSeats,
        env: &RideEnv,
        out: &mut RideOutput,
    ) -> Result<(), RideError> {
        if !seats.any_mounted() {
            return Ok(());
        }

        let was_mid_jump = self.state.in_mid_jump;
        let since_jump = self.state.translator.ms_since_jump(env.now_ms);
        self.state.in_mid_jump &= (since_jump < JUMP_COMPLETE_MS || !env.on_ground) && !env.swimming;

        if was_mid_jump && !self.state.in_mid_jump {
            let meta = self.config.control(ControlCode::Jump)?.clone();
            for rider in seats.riders() {
                out.anims.push(AnimCommand::Stop {
                    target: AnimTarget::Rider(rider),
                    animation: meta.rider_anim.animation.clone(),
                });
            }
            if self.state.mount_jump_anim {
                self.state.mount_jump_anim = false;
                self.stop_mount(out, &meta.anim.animation);
            }
        }

        let forward_speed = self.state.forward_speed;
        self.state.controls.backward = forward_speed < 0.0;
        self.state.controls.forward = forward_speed >= 0.0;
        self.state.controls.sprint = self.gait() == Gait::Gallop && forward_speed > 0.0;

        self.update_turn_overlay(out);

        let was_moving = self.state.should_move;
        self.state.should_move = forward_speed != 0.0;
        let now_control;
        let mut rider_control = self.state.rider_control;

        if !self.state.should_move && !self.state.jump_now {
            let rest = if env.swimming {
                ControlCode::Swim
            } else {
                ControlCode::Idle
            };
            if was_moving || self.state.cur_control == Some(ControlCode::Jump) {
                self.halt(rest, out)?;
            }
            rider_control = Some(rest);
            now_control = Some(rest);
        } else {
            let mut code = match self.gait() {
                Gait::Walk if self.state.controls.backward => ControlCode::WalkBack,
                Gait::Walk => ControlCode::Walk,
                Gait::Canter => ControlCode::Canter,
                Gait::Gallop => ControlCode::Sprint,
            };
            if env.swimming {
                code = ControlCode::Swim;
            }
            self.state.controls.jump = self.state.jump_now;

            if self.state.jump_now {
                self.state.in_mid_jump = true;
                self.state.jump_now = false;
                code = ControlCode::Jump;
                self.start_jump(seats, env, out)?;
            } else {
                rider_control = Some(code);
            }
            now_control = Some(code);
        }

        if now_control != self.state.cur_control && self.debug {
            debug!(
                "Riding control -> {:?} (authoritative: {})",
                now_control, env.authoritative
            );
        }
        self.switch_control(now_control, forward_speed, out)?;

        self.update_rider_animation(rider_control, seats, out)?;

        if env.authoritative {
            self.state.controls.sprint = false;
        }
        Ok(())
    }

    fn start_jump(
        &mut self,
        seats: &MountSeats,
        env: &RideEnv,
        out: &mut RideOutput,
    ) -> Result<(), RideError> {
        let rider_anim = self.config.control(ControlCode::Jump)?.rider_anim.clone();
        for rider in seats.riders() {
            out.anims.push(AnimCommand::Start {
                target: AnimTarget::Rider(rider),
                meta: rider_anim.clone(),
            });
        }
        out.sounds.push(SoundCommand::OneShot {
            sound: "jump".to_string(),
            position: env.position,
        });
        Ok(())
    }

    fn update_turn_overlay(&mut self, out: &mut RideOutput) {
        let forward_speed = self.state.forward_speed;
        let av = self.state.angular_velocity;
        let lean = if forward_speed >= 0.0 && av > TURN_ANIM_THRESHOLD {
            Some("turn-left")
        } else if forward_speed >= 0.0 && av < -TURN_ANIM_THRESHOLD {
            Some("turn-right")
        } else {
            None
        };
        let now = lean.map(|name| {
            if forward_speed == 0.0 {
                format!("idle-{}", name)
            } else {
                name.to_string()
            }
        });

        if now == self.state.cur_turn_anim {
            return;
        }
        if let Some(cur) = self.state.cur_turn_anim.take() {
            self.stop_mount(out, &cur);
        }
        if let Some(name) = &now {
            self.start_mount(out, AnimationMeta::named(name.clone()));
        }
        self.state.cur_turn_anim = now;
    }

    fn update_rider_animation(
        &mut self,
        next: Option<ControlCode>,
        seats: &MountSeats,
        out: &mut RideOutput,
    ) -> Result<(), RideError> {
        if next == self.state.rider_control {
            return Ok(());
        }
        if let Some(prev) = self.state.rider_control {
            let animation = self.config.control(prev)?.rider_anim.animation.clone();
            for rider in seats.riders() {
                out.anims.push(AnimCommand::Stop {
                    target: AnimTarget::Rider(rider),
                    animation: animation.clone(),
                });
            }
        }
        if let Some(code) = next {
            let meta = self.config.control(code)?.rider_anim.clone();
            for rider in seats.riders() {
                out.anims.push(AnimCommand::Start {
                    target: AnimTarget::Rider(rider),
                    meta: meta.clone(),
                });
            }
        }
        self.state.rider_control = next;
        Ok(())
    }

    /// Make `next` the one active locomotion control. The outgoing control is stopped
    /// unless it is the jump, which only ends through the jump-completion check.
    fn switch_control(
        &mut self,
        next: Option<ControlCode>,
        forward_speed: f32,
        out: &mut RideOutput,
    ) -> Result<(), RideError> {
        if next == self.state.cur_control {
            return Ok(());
        }
        if let Some(cur) = self.state.cur_control {
            if cur != ControlCode::Jump {
                let animation = self.config.control(cur)?.anim.animation.clone();
                self.stop_mount(out, &animation);
            }
        }
        self.state.cur_control = next;
        if let Some(code) = next {
            let mut meta = self.config.control(code)?.anim.clone();
            if code == ControlCode::Jump {
                meta.ease_out_speed = if forward_speed != 0.0 { 30.0 } else { 40.0 };
                self.state.mount_jump_anim = true;
            }
            self.start_mount(out, meta);
        }
        Ok(())
    }

    fn halt(&mut self, rest: ControlCode, out: &mut RideOutput) -> Result<(), RideError> {
        self.state.gait.force_walk();
        self.state.controls = MountControls::default();
        self.state.should_move = false;
        self.switch_control(Some(rest), 0.0, out)
    }

    /// Halt: back to Walk, no movement, locomotion replaced by "idle".
    pub fn stop(&mut self, out: &mut RideOutput) {
        if let Err(e) = self.halt(ControlCode::Idle, out) {
            error!("Mount stop: {}", e);
        }
    }

    /// Apply a sync code. Gait codes re-run the reconciliation right away; sprint codes
    /// belong to the stamina record and are reported back as unhandled here.
    pub fn receive_sync(
        &mut self,
        code: SyncCode,
        seats: &MountSeats,
        env: &RideEnv,
        out: &mut RideOutput,
    ) -> Result<bool, RideError> {
        match code.action() {
            SyncAction::SetGait(gait) => {
                let changed = self.state.gait.set(gait);
                if self.debug {
                    debug!("Gait sync {:?} -> {:?} (changed: {})", code, gait, changed);
                }
                self.update_riding_state(seats, env, out)?;
                Ok(true)
            }
            SyncAction::SetSprinting(_) => Ok(false),
        }
    }

    /// Stamina-driven downgrade roll. Only the deciding side calls this; the returned
    /// code is already applied locally and must be sent to the authoritative side.
    pub fn stamina_gait_check<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        swimming: bool,
        stamina: &StaminaState,
        rng: &mut R,
        out: &mut RideOutput,
    ) {
        if let Some(code) = self.state.gait.stamina_check(
            dt,
            swimming,
            stamina.stamina(),
            stamina.max_stamina(),
            rng,
        ) {
            if self.debug {
                debug!(
                    "Stamina gait change {:?} at {:.1}/{:.1}",
                    code,
                    stamina.stamina(),
                    stamina.max_stamina()
                );
            }
            out.packets.push(code);
        }
    }

    pub fn did_mount(
        &mut self,
        rider: u64,
        scheme: ControlScheme,
        out: &mut RideOutput,
    ) -> Result<(), RideError> {
        self.scheme = scheme;
        if let Some(code) = self.state.rider_control {
            out.anims.push(AnimCommand::Start {
                target: AnimTarget::Rider(rider),
                meta: self.config.control(code)?.rider_anim.clone(),
            });
        }
        Ok(())
    }

    pub fn did_unmount(
        &mut self,
        rider: u64,
        total_hours: f64,
        swimming: bool,
        seats_left: &MountSeats,
        out: &mut RideOutput,
    ) {
        let rest = if swimming {
            ControlCode::Swim
        } else {
            ControlCode::Idle
        };
        if let Err(e) = self.halt(rest, out) {
            error!("Mount stop on unmount: {}", e);
        }
        self.last_dismount_total_hours = Some(total_hours);
        for meta in self.config.controls.values() {
            if !meta.rider_anim.animation.is_empty() {
                out.anims.push(AnimCommand::Stop {
                    target: AnimTarget::Rider(rider),
                    animation: meta.rider_anim.animation.clone(),
                });
            }
        }
        if !seats_left.any_mounted() {
            self.state.translator.reset_toggles();
            self.state.rider_control = None;
            self.state.controller = None;
            self.state.forward_speed = 0.0;
            self.state.angular_velocity = 0.0;
        }
    }

    /// Where the mount wants to go this tick, in world units per second.
    pub fn move_intent(&self, yaw: f32, env: &MoveEnv) -> Result<MoveIntent, RideError> {
        let mut intent = MoveIntent::default();

        if !self.state.should_move {
            if env.swimming {
                intent.fly.y = 0.2;
            }
            return Ok(intent);
        }

        let move_speed = match self.state.cur_control {
            Some(code) => self.config.control(code)?.move_speed,
            None => 0.0,
        };
        let mut walk = Vec3::new(yaw.sin(), 0.0, yaw.cos())
            * move_speed
            * self.stamina_speed_multiplier
            * self.state.forward_speed;

        // Walk along a wall instead of into it
        if let Some(face) = env.climbing_face {
            if env.alive {
                if sign(face.x) == sign(walk.x) {
                    walk.x = 0.0;
                }
                if sign(face.z) == sign(walk.z) {
                    walk.z = 0.0;
                }
            }
        }
        intent.walk = walk;

        if env.swimming {
            let submerged = (env.submergedness.clamp(0.0, 1.0) + 0.075).min(1.0);
            let mut fly = walk;
            fly.y = fly.y.clamp(0.002, 0.004) * submerged * 3.0;
            if env.collided_horizontally {
                fly.y = 0.05;
            }
            intent.fly = fly;
            intent.buoyancy = (submerged - 0.1) / 300.0;
        }
        Ok(intent)
    }

    /// AI task blocker: nothing runs while ridden, and no wandering shortly after a
    /// dismount.
    pub fn should_execute_ai_task(&self, task: AiTask, total_hours: f64, seats: &MountSeats) -> bool {
        if task == AiTask::Wander {
            if let Some(last) = self.last_dismount_total_hours {
                if total_hours - last < WANDER_BLOCK_HOURS {
                    return false;
                }
            }
        }
        !seats.any_mounted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ControlMeta;
    use crate::seat::{SeatConfig, SeatControls};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn config() -> RideableConfig {
        let mut config = RideableConfig::default();
        for code in ControlCode::REQUIRED {
            config.controls.insert(
                code,
                ControlMeta {
                    anim: AnimationMeta::named(code.as_str()),
                    move_speed: 0.05,
                    rider_anim: AnimationMeta::named(format!("ride-{}", code.as_str())),
                },
            );
        }
        config
    }

    fn env(now_ms: u64) -> RideEnv {
        RideEnv {
            now_ms,
            on_ground: true,
            swimming: false,
            alive: true,
            authoritative: true,
            position: Vec3::ZERO,
        }
    }

    fn ridden(controls: SeatControls) -> MountSeats {
        let mut seats = MountSeats::from_configs(&[SeatConfig::default()]);
        seats.mount(0, 1).expect("free seat");
        seats.set_controls(1, controls);
        seats
    }

    fn tick(
        rideable: &mut Rideable,
        seats: &MountSeats,
        now_ms: u64,
    ) -> RideOutput {
        let mut out = RideOutput::default();
        let mut yaw = 0.0;
        rideable.update_angle_and_motion(DT, &mut yaw, seats, &env(now_ms), &RidePolicies::default(), &mut out);
        rideable
            .update_riding_state(seats, &env(now_ms), &mut out)
            .expect("complete control map");
        out
    }

    fn starts(out: &RideOutput, target: AnimTarget) -> Vec<String> {
        out.anims
            .iter()
            .filter_map(|c| match c {
                AnimCommand::Start { target: t, meta } if *t == target => Some(meta.animation.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_animation_switch_only_on_change() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let seats = ridden(SeatControls { forward: true, ..default() });

        let first = tick(&mut rideable, &seats, 5_000);
        assert_eq!(starts(&first, AnimTarget::Mount), vec!["walk"]);
        assert_eq!(starts(&first, AnimTarget::Rider(1)), vec!["ride-walk"]);

        for i in 1..10 {
            let steady = tick(&mut rideable, &seats, 5_000 + i * 16);
            assert!(steady.anims.is_empty(), "tick {} re-issued {:?}", i, steady.anims);
        }
    }

    #[test]
    fn test_gait_packet_is_idempotent() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let seats = ridden(SeatControls { forward: true, ..default() });
        tick(&mut rideable, &seats, 5_000);

        let mut out = RideOutput::default();
        assert_eq!(rideable.receive_sync(SyncCode::SetCanter, &seats, &env(5_016), &mut out), Ok(true));
        assert_eq!(rideable.gait(), Gait::Canter);
        assert_eq!(starts(&out, AnimTarget::Mount), vec!["canter"]);

        let mut again = RideOutput::default();
        rideable
            .receive_sync(SyncCode::SetCanter, &seats, &env(5_032), &mut again)
            .expect("valid config");
        assert_eq!(rideable.gait(), Gait::Canter);
        assert!(again.anims.is_empty());

        let mut sprint = RideOutput::default();
        assert_eq!(rideable.receive_sync(SyncCode::SprintOn, &seats, &env(5_048), &mut sprint), Ok(false));
    }

    #[test]
    fn test_low_stamina_gallop_emits_force_walk() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        rideable.state.gait.set(Gait::Gallop);
        let mut stamina = StaminaState::new(&Default::default());
        stamina.set_stamina(8.0);
        let mut rng = StdRng::seed_from_u64(1);

        let mut out = RideOutput::default();
        rideable.stamina_gait_check(1.0, false, &stamina, &mut rng, &mut out);
        assert_eq!(rideable.gait(), Gait::Walk);
        assert_eq!(out.packets, vec![SyncCode::ForceWalk]);
        assert_eq!(SyncCode::ForceWalk.code(), 9999);
    }

    #[test]
    fn test_idle_stop_resets_gait_and_plays_idle() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let moving = ridden(SeatControls { forward: true, ..default() });
        tick(&mut rideable, &moving, 5_000);
        rideable.state.gait.set(Gait::Canter);

        let idle = ridden(SeatControls::default());
        let out = tick(&mut rideable, &idle, 5_016);
        assert_eq!(rideable.gait(), Gait::Walk);
        assert!(out.anims.contains(&AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "walk".into()
        }));
        assert_eq!(starts(&out, AnimTarget::Mount), vec!["idle"]);
        assert_eq!(starts(&out, AnimTarget::Rider(1)), vec!["ride-idle"]);
        assert!(!rideable.state.should_move);
    }

    #[test]
    fn test_one_locomotion_animation_across_stop_and_go() {
        use crate::animation::ActiveAnimations;

        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let moving = ridden(SeatControls { forward: true, ..default() });
        let idle = ridden(SeatControls::default());
        let mut active = ActiveAnimations::default();
        let locomotion = |active: &ActiveAnimations| {
            [
                ControlCode::Idle,
                ControlCode::Walk,
                ControlCode::WalkBack,
                ControlCode::Canter,
                ControlCode::Sprint,
                ControlCode::Swim,
            ]
            .into_iter()
            .filter(|code| active.is_active(code.as_str()))
            .collect::<Vec<_>>()
        };

        let steps = [
            (&moving, ControlCode::Walk),
            (&idle, ControlCode::Idle),
            (&moving, ControlCode::Walk),
            (&idle, ControlCode::Idle),
        ];
        for (i, (seats, expected)) in steps.into_iter().enumerate() {
            let out = tick(&mut rideable, seats, 5_000 + i as u64 * 16);
            for command in &out.anims {
                active.apply(command);
            }
            assert_eq!(locomotion(&active), vec![expected], "step {}", i);
            assert_eq!(rideable.state.cur_control, Some(expected));
        }
    }

    #[test]
    fn test_jump_is_not_stopped_by_control_change() {
        let mut rideable = Rideable::new(config(), ShadowTargets::new(vec!["-antlers".into()]));
        let jumping = ridden(SeatControls { forward: true, jump: true, ..default() });

        let out = tick(&mut rideable, &jumping, 5_000);
        assert_eq!(starts(&out, AnimTarget::Mount), vec!["jump", "jump-antlers"]);
        assert!(out.sounds.iter().any(|s| matches!(s, SoundCommand::OneShot { sound, .. } if sound == "jump")));
        assert!(rideable.state.in_mid_jump);
        assert!(rideable.state.controls.jump);

        // Next tick switches locomotion back to walk without stopping the jump
        let walking = ridden(SeatControls { forward: true, ..default() });
        let out = tick(&mut rideable, &walking, 5_100);
        assert_eq!(starts(&out, AnimTarget::Mount), vec!["walk", "walk-antlers"]);
        assert!(!out.anims.iter().any(|c| matches!(c, AnimCommand::Stop { animation, .. } if animation == "jump")));

        // Grounded and past the completion window: jump ends for mount and rider
        let out = tick(&mut rideable, &walking, 5_600);
        assert!(!rideable.state.in_mid_jump);
        assert!(out.anims.contains(&AnimCommand::Stop {
            target: AnimTarget::Rider(1),
            animation: "ride-jump".into()
        }));
        assert!(out.anims.contains(&AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "jump-antlers".into()
        }));
    }

    #[test]
    fn test_turn_overlay_uses_idle_prefix_when_stationary() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let turning = ridden(SeatControls { left: true, ..default() });
        let out = tick(&mut rideable, &turning, 5_000);
        assert!(starts(&out, AnimTarget::Mount).contains(&"idle-turn-left".to_string()));
        assert_eq!(rideable.state.cur_turn_anim.as_deref(), Some("idle-turn-left"));

        let out = tick(&mut rideable, &turning, 5_016);
        assert!(!starts(&out, AnimTarget::Mount).contains(&"idle-turn-left".to_string()));

        let moving_right = ridden(SeatControls { forward: true, right: true, ..default() });
        let out = tick(&mut rideable, &moving_right, 5_032);
        assert!(out.anims.contains(&AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "idle-turn-left".into()
        }));
        assert!(starts(&out, AnimTarget::Mount).contains(&"turn-right".to_string()));
    }

    #[test]
    fn test_missing_control_fails_the_update() {
        let mut config = config();
        config.controls.remove(&ControlCode::Canter);
        let mut rideable = Rideable::new(config, ShadowTargets::default());
        rideable.state.gait.set(Gait::Canter);
        let seats = ridden(SeatControls { forward: true, ..default() });

        let mut out = RideOutput::default();
        let mut yaw = 0.0;
        rideable.update_angle_and_motion(DT, &mut yaw, &seats, &env(5_000), &RidePolicies::default(), &mut out);
        assert_eq!(
            rideable.update_riding_state(&seats, &env(5_000), &mut out),
            Err(RideError::MissingControl("canter".into()))
        );
    }

    #[test]
    fn test_move_intent_follows_yaw_and_swims() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let seats = ridden(SeatControls { forward: true, ..default() });
        tick(&mut rideable, &seats, 5_000);

        let land = MoveEnv { alive: true, ..default() };
        let intent = rideable.move_intent(0.0, &land).expect("walk control exists");
        assert!((intent.walk.z - 0.05).abs() < 1e-6);
        assert_eq!(intent.fly, Vec3::ZERO);

        let water = MoveEnv {
            alive: true,
            swimming: true,
            submergedness: 0.5,
            ..default()
        };
        let intent = rideable.move_intent(0.0, &water).expect("walk control exists");
        assert!((intent.fly.y - 0.002 * 0.575 * 3.0).abs() < 1e-6);
        assert!((intent.buoyancy - (0.575 - 0.1) / 300.0).abs() < 1e-6);

        // Climbing into a face drops the component pointing into it
        let climbing = MoveEnv {
            alive: true,
            climbing_face: Some(Vec3::Z),
            ..default()
        };
        assert_eq!(rideable.move_intent(0.0, &climbing).expect("ok").walk.z, 0.0);

        rideable.stop(&mut RideOutput::default());
        let idle_water = rideable.move_intent(0.0, &water).expect("ok");
        assert_eq!(idle_water.fly.y, 0.2);
    }

    #[test]
    fn test_unmount_blocks_wander() {
        let mut rideable = Rideable::new(config(), ShadowTargets::default());
        let mut seats = ridden(SeatControls::default());
        assert!(!rideable.should_execute_ai_task(AiTask::Idle, 0.0, &seats));

        seats.unmount(1);
        let mut out = RideOutput::default();
        rideable.did_unmount(1, 100.0, true, &seats, &mut out);
        assert!(out.anims.contains(&AnimCommand::Stop {
            target: AnimTarget::Rider(1),
            animation: "ride-walk".into()
        }));
        assert_eq!(starts(&out, AnimTarget::Mount), vec!["swim"]);

        assert!(!rideable.should_execute_ai_task(AiTask::Wander, 110.0, &seats));
        assert!(rideable.should_execute_ai_task(AiTask::Idle, 110.0, &seats));
        assert!(rideable.should_execute_ai_task(AiTask::Wander, 125.0, &seats));
    }
}
