//! Seat input -> mount motion
//!
//! Every tick the seats are walked in order and folded into one linear and one angular
//! motion scalar. The first permitted seat is the controller: it alone drives jumping,
//! gait cycling and the press-mode toggles. Riders after the first contributing one
//! steer at half weight.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::RideError;
use crate::gait::GaitMachine;
use crate::policy::{PermissionDenied, PolicyContext, RidePolicies};
use crate::seat::{MountSeats, SeatControls};

/// Grace period after leaving the ground during which a jump is still accepted.
pub const COYOTE_TIME: f32 = 0.15;

/// Minimum time between two mount jumps (ms).
pub const JUMP_COOLDOWN_MS: u64 = 1000;

/// Accessory attribute naming the control scheme.
pub const CONTROL_SCHEME_ATTRIBUTE: &str = "controlScheme";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ControlScheme {
    /// Moves only while a direction key is held.
    #[default]
    Hold,
    /// A press starts or stops continuous motion.
    Press,
}

impl FromStr for ControlScheme {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hold" | "hold" => Ok(ControlScheme::Hold),
            "Press" | "press" => Ok(ControlScheme::Press),
            other => Err(RideError::UnknownControlScheme(other.to_string())),
        }
    }
}

/// Item metadata of something worn by the mount (saddle, reins).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct AccessoryMeta {
    pub item: String,
    pub attributes: BTreeMap<String, String>,
}

/// Accessory slots of a mount. `None` is an empty slot.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MountAccessories(pub Vec<Option<AccessoryMeta>>);

impl ControlScheme {
    /// The first accessory whose scheme attribute parses wins; anything else is Hold.
    pub fn from_accessories(slots: &[Option<AccessoryMeta>]) -> Self {
        for accessory in slots.iter().flatten() {
            let Some(raw) = accessory.attributes.get(CONTROL_SCHEME_ATTRIBUTE) else {
                continue;
            };
            match raw.parse() {
                Ok(scheme) => return scheme,
                Err(e) => warn!("Accessory '{}': {}", accessory.item, e),
            }
        }
        ControlScheme::Hold
    }
}

/// World facts the translator needs for one tick.
#[derive(Clone, Copy, Debug)]
pub struct MotionContext {
    pub now_ms: u64,
    pub on_ground: bool,
    pub alive: bool,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SeatMotion {
    pub linear: f32,
    pub angular: f32,
    pub jump_now: bool,
    pub controller: Option<u64>,
    /// Denied riders, to be shown the error.
    pub denials: Vec<(u64, PermissionDenied)>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MotionTranslator {
    coyote_timer: f32,
    last_jump_ms: Option<u64>,
    forward: bool,
    backward: bool,
    prev_forward_key: bool,
    prev_backward_key: bool,
}

impl MotionTranslator {
    pub fn last_jump_ms(&self) -> Option<u64> {
        self.last_jump_ms
    }

    /// Milliseconds since the last jump (`u64::MAX` if never jumped).
    pub fn ms_since_jump(&self, now_ms: u64) -> u64 {
        self.last_jump_ms
            .map_or(u64::MAX, |last| now_ms.saturating_sub(last))
    }

    /// Drop press-mode toggles (used when the rider leaves).
    pub fn reset_toggles(&mut self) {
        self.forward = false;
        self.backward = false;
        self.prev_forward_key = false;
        self.prev_backward_key = false;
    }

    fn jump_ready(&self, ctx: &MotionContext) -> bool {
        let cooled = self.ms_since_jump(ctx.now_ms) >= JUMP_COOLDOWN_MS;
        cooled && ctx.alive && (ctx.on_ground || self.coyote_timer > 0.0)
    }

    fn update_toggles(&mut self, controls: &SeatControls, gait: &mut GaitMachine) {
        let forward_pressed = controls.forward && !self.prev_forward_key;
        let backward_pressed = controls.backward && !self.prev_backward_key;

        if !self.forward && !self.backward && forward_pressed {
            self.forward = true;
            gait.force_walk();
        } else if self.forward && backward_pressed {
            self.forward = false;
            gait.force_walk();
        } else if !self.backward && backward_pressed {
            self.backward = true;
            gait.force_walk();
        } else if self.backward && forward_pressed {
            self.backward = false;
            gait.force_walk();
        }

        self.prev_forward_key = controls.forward;
        self.prev_backward_key = controls.backward;
    }

    pub fn seats_to_motion(
        &mut self,
        seats: &MountSeats,
        dt: f32,
        ctx: &MotionContext,
        scheme: ControlScheme,
        policies: &RidePolicies,
        gait: &mut GaitMachine,
    ) -> SeatMotion {
        let mut out = SeatMotion::default();
        let mut contributing = 0;

        self.coyote_timer -= dt;
        if ctx.on_ground {
            self.coyote_timer = COYOTE_TIME;
        }

        for (seat_index, seat) in seats.0.iter().enumerate() {
            let Some(rider) = seat.occupant else { continue };
            if !seat.config.controllable {
                continue;
            }
            let controls = &seat.controls;
            let policy_ctx = PolicyContext {
                seat_index,
                seat_id: &seat.config.seat_id,
                rider,
                controls,
            };

            if controls.jump || controls.tries_to_move() {
                if let Err(denied) = policies.can_ride.check(&policy_ctx) {
                    out.denials.push((rider, denied));
                    continue;
                }
            }

            let mut can_turn = true;
            if controls.tries_to_turn() {
                if let Err(denied) = policies.can_turn.check(&policy_ctx) {
                    out.denials.push((rider, denied));
                    can_turn = false;
                }
            }

            let is_controller = out.controller.is_none();
            if is_controller {
                out.controller = Some(rider);
                if controls.jump && self.jump_ready(ctx) {
                    self.last_jump_ms = Some(ctx.now_ms);
                    out.jump_now = true;
                }
            }

            if scheme == ControlScheme::Hold && !controls.tries_to_move() {
                continue;
            }

            contributing += 1;
            let weight = if contributing == 1 { 1.0 } else { 0.5 };

            if is_controller {
                gait.sprint_key(controls.sprint, ctx.now_ms);
            }

            let (forward, backward) = match scheme {
                ControlScheme::Hold => {
                    // No backward canter or gallop
                    if controls.backward {
                        gait.force_walk();
                    }
                    (controls.forward, controls.backward)
                }
                ControlScheme::Press if is_controller => {
                    self.update_toggles(controls, gait);
                    (self.forward, self.backward)
                }
                ControlScheme::Press => (false, false),
            };

            if can_turn && controls.tries_to_turn() {
                let dir = if controls.left { 1.0 } else { -1.0 };
                out.angular += weight * dir * dt;
            }
            if forward || backward {
                let dir = if forward { 1.0 } else { -1.0 };
                out.linear += weight * dir * dt * 2.0;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gait::Gait;
    use crate::seat::SeatConfig;

    const DT: f32 = 1.0 / 60.0;

    fn ctx(now_ms: u64) -> MotionContext {
        MotionContext {
            now_ms,
            on_ground: true,
            alive: true,
        }
    }

    fn seats_with(riders: &[(u64, SeatControls)]) -> MountSeats {
        let mut seats = MountSeats::from_configs(&vec![SeatConfig::default(); riders.len().max(2)]);
        for (i, (rider, controls)) in riders.iter().enumerate() {
            seats.mount(i, *rider).expect("free seat");
            seats.set_controls(*rider, *controls);
        }
        seats
    }

    fn forward() -> SeatControls {
        SeatControls {
            forward: true,
            ..default()
        }
    }

    #[test]
    fn test_empty_seats_produce_no_motion() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let seats = MountSeats::from_configs(&[SeatConfig::default()]);
        let motion = translator.seats_to_motion(
            &seats,
            DT,
            &ctx(5_000),
            ControlScheme::Hold,
            &RidePolicies::default(),
            &mut gait,
        );
        assert_eq!(motion, SeatMotion::default());
        assert_eq!(gait.current(), Gait::Walk);
    }

    #[test]
    fn test_second_rider_adds_half_weight() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let seats = seats_with(&[(1, forward()), (2, forward())]);

        let motion = translator.seats_to_motion(
            &seats,
            DT,
            &ctx(5_000),
            ControlScheme::Hold,
            &RidePolicies::default(),
            &mut gait,
        );
        let expected = 1.0 * DT * 2.0 + 0.5 * DT * 2.0;
        assert!((motion.linear - expected).abs() < 1e-6);
        assert_eq!(motion.controller, Some(1));
    }

    #[test]
    fn test_backward_forces_walk_from_gallop() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        gait.set(Gait::Gallop);
        let back = SeatControls {
            backward: true,
            sprint: true,
            ..default()
        };
        let seats = seats_with(&[(1, back)]);

        let motion = translator.seats_to_motion(
            &seats,
            DT,
            &ctx(5_000),
            ControlScheme::Hold,
            &RidePolicies::default(),
            &mut gait,
        );
        assert_eq!(gait.current(), Gait::Walk);
        assert!(motion.linear < 0.0);
    }

    #[test]
    fn test_jump_cooldown_and_coyote_time() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let jump = SeatControls {
            jump: true,
            ..default()
        };
        let seats = seats_with(&[(1, jump)]);
        let policies = RidePolicies::default();

        let first = translator.seats_to_motion(&seats, DT, &ctx(5_000), ControlScheme::Hold, &policies, &mut gait);
        assert!(first.jump_now);

        let too_soon = translator.seats_to_motion(&seats, DT, &ctx(5_500), ControlScheme::Hold, &policies, &mut gait);
        assert!(!too_soon.jump_now);

        // Left the ground 0.1s ago: still inside the coyote window
        let mut airborne = ctx(7_000);
        airborne.on_ground = false;
        let coyote = translator.seats_to_motion(&seats, 0.1, &airborne, ControlScheme::Hold, &policies, &mut gait);
        assert!(coyote.jump_now);

        // Long airborne: no jump
        translator.seats_to_motion(&seats, 0.2, &ctx(7_100), ControlScheme::Hold, &policies, &mut gait);
        let mut late = ctx(9_000);
        late.on_ground = false;
        let late_jump = translator.seats_to_motion(&seats, 0.3, &late, ControlScheme::Hold, &policies, &mut gait);
        assert!(!late_jump.jump_now);

        let mut dead = ctx(20_000);
        dead.alive = false;
        assert!(!translator.seats_to_motion(&seats, DT, &dead, ControlScheme::Hold, &policies, &mut gait).jump_now);
    }

    #[test]
    fn test_jump_allowed_exactly_at_cooldown() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let jump = SeatControls {
            jump: true,
            ..default()
        };
        let seats = seats_with(&[(1, jump)]);
        let policies = RidePolicies::default();

        assert!(translator.seats_to_motion(&seats, DT, &ctx(5_000), ControlScheme::Hold, &policies, &mut gait).jump_now);
        assert!(!translator.seats_to_motion(&seats, DT, &ctx(5_999), ControlScheme::Hold, &policies, &mut gait).jump_now);
        assert!(translator.seats_to_motion(&seats, DT, &ctx(6_000), ControlScheme::Hold, &policies, &mut gait).jump_now);
        assert_eq!(translator.last_jump_ms(), Some(6_000));
    }

    #[test]
    fn test_blocked_rider_is_reported_and_next_seat_controls() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let mut policies = RidePolicies::default();
        policies.can_ride.push("no-saddle", |ctx| {
            if ctx.rider == 1 {
                Err("nosaddle".to_string())
            } else {
                Ok(())
            }
        });
        let seats = seats_with(&[(1, forward()), (2, forward())]);

        let motion = translator.seats_to_motion(&seats, DT, &ctx(5_000), ControlScheme::Hold, &policies, &mut gait);
        assert_eq!(motion.controller, Some(2));
        assert_eq!(motion.denials.len(), 1);
        assert_eq!(motion.denials[0].0, 1);
        assert_eq!(motion.denials[0].1.lang_key(), "cantride-nosaddle");
        assert!((motion.linear - DT * 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_turn_denial_keeps_linear_motion() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let mut policies = RidePolicies::default();
        policies.can_turn.push("reins", |_| Err("noreins".to_string()));
        let controls = SeatControls {
            forward: true,
            left: true,
            ..default()
        };
        let seats = seats_with(&[(1, controls)]);

        let motion = translator.seats_to_motion(&seats, DT, &ctx(5_000), ControlScheme::Hold, &policies, &mut gait);
        assert_eq!(motion.angular, 0.0);
        assert!(motion.linear > 0.0);
        assert_eq!(motion.denials.len(), 1);
    }

    #[test]
    fn test_press_scheme_toggles() {
        let mut translator = MotionTranslator::default();
        let mut gait = GaitMachine::new();
        let policies = RidePolicies::default();

        let pressed = seats_with(&[(1, forward())]);
        let released = seats_with(&[(1, SeatControls::default())]);
        let back = seats_with(&[(1, SeatControls { backward: true, ..default() })]);

        let m = translator.seats_to_motion(&pressed, DT, &ctx(5_000), ControlScheme::Press, &policies, &mut gait);
        assert!(m.linear > 0.0);
        // Keeps moving after the key is released
        let m = translator.seats_to_motion(&released, DT, &ctx(5_020), ControlScheme::Press, &policies, &mut gait);
        assert!(m.linear > 0.0);
        // Backward press stops forward motion
        let m = translator.seats_to_motion(&back, DT, &ctx(5_040), ControlScheme::Press, &policies, &mut gait);
        assert_eq!(m.linear, 0.0);
    }

    #[test]
    fn test_scheme_from_accessories() {
        let reins = |scheme: &str| {
            Some(AccessoryMeta {
                item: "reins".into(),
                attributes: BTreeMap::from([(CONTROL_SCHEME_ATTRIBUTE.to_string(), scheme.to_string())]),
            })
        };
        let saddle = Some(AccessoryMeta {
            item: "saddle".into(),
            attributes: BTreeMap::new(),
        });

        assert_eq!(ControlScheme::from_accessories(&[]), ControlScheme::Hold);
        assert_eq!(ControlScheme::from_accessories(&[None, saddle.clone(), reins("Press")]), ControlScheme::Press);
        assert_eq!(ControlScheme::from_accessories(&[reins("Gallopy"), saddle]), ControlScheme::Hold);
        assert_eq!(ControlScheme::from_accessories(&[reins("Gallopy"), reins("Press")]), ControlScheme::Press);
        assert!("Nonsense".parse::<ControlScheme>().is_err());
    }
}
