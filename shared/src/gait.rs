//! Gait state machine
//!
//! Walk -> Canter -> Gallop -> Walk on fresh sprint-key edges (300ms cooldown), forced
//! back to Walk by backward input, and downgraded by a stamina roll while galloping.
//! The roll only runs on the side that decides (the controlling client); everyone else
//! gets the result through a [`SyncCode`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::sync::SyncCode;

/// Minimum time between two manual gait cycles (ms).
pub const GAIT_CYCLE_COOLDOWN_MS: u64 = 300;

/// Length of the stamina downgrade evaluation window (seconds).
pub const STAMINA_CHECK_WINDOW: f32 = 1.0;

/// Below this stamina a galloping mount is forced straight to Walk.
pub const GALLOP_MIN_STAMINA: f32 = 10.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Gait {
    #[default]
    Walk,
    Canter,
    Gallop,
}

impl Gait {
    pub fn next(self) -> Self {
        match self {
            Gait::Walk => Gait::Canter,
            Gait::Canter => Gait::Gallop,
            Gait::Gallop => Gait::Walk,
        }
    }

    /// Turn rate multiplier applied to the angular motion.
    pub fn yaw_multiplier(self) -> f32 {
        match self {
            Gait::Walk => 3.0,
            Gait::Canter => 2.0,
            Gait::Gallop => 1.5,
        }
    }
}

/// 0 at or above half stamina, rising quadratically to 1 at zero.
pub fn stamina_deficit_multiplier(stamina: f32, max_stamina: f32) -> f32 {
    let half = 0.5 * max_stamina;
    if half <= 0.0 || stamina >= half {
        return 0.0;
    }
    let deficit = (1.0 - stamina / half).clamp(0.0, 1.0);
    deficit * deficit
}

/// Per-mount gait state. Each side keeps its own copy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct GaitMachine {
    current: Gait,
    last_change_ms: Option<u64>,
    prev_sprint_key: bool,
    check_elapsed: f32,
}

impl GaitMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Gait {
        self.current
    }

    /// Set the gait directly (remote packets, stop). Returns true if it changed.
    pub fn set(&mut self, gait: Gait) -> bool {
        let changed = self.current != gait;
        self.current = gait;
        changed
    }

    pub fn force_walk(&mut self) -> bool {
        self.set(Gait::Walk)
    }

    /// Feed the sprint key state for this tick. Only a rising edge outside the cooldown
    /// cycles the gait. Returns the new gait when it changed.
    pub fn sprint_key(&mut self, pressed: bool, now_ms: u64) -> Option<Gait> {
        let rising = pressed && !self.prev_sprint_key;
        self.prev_sprint_key = pressed;
        if !rising {
            return None;
        }

        if let Some(last) = self.last_change_ms {
            if now_ms.saturating_sub(last) < GAIT_CYCLE_COOLDOWN_MS {
                return None;
            }
        }

        self.current = self.current.next();
        self.last_change_ms = Some(now_ms);
        Some(self.current)
    }

    /// Accumulate `dt` and, once per window while galloping on land, roll for a
    /// stamina downgrade. Returns the code to push to the authoritative side.
    pub fn stamina_check<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        swimming: bool,
        stamina: f32,
        max_stamina: f32,
        rng: &mut R,
    ) -> Option<SyncCode> {
        self.check_elapsed += dt;
        if self.check_elapsed < STAMINA_CHECK_WINDOW {
            return None;
        }
        self.check_elapsed = 0.0;

        if self.current != Gait::Gallop || swimming {
            return None;
        }

        if stamina < GALLOP_MIN_STAMINA {
            self.current = Gait::Walk;
            return Some(SyncCode::ForceWalk);
        }

        let chance = stamina_deficit_multiplier(stamina, max_stamina);
        if rng.gen::<f32>() < chance {
            self.current = Gait::Canter;
            return Some(SyncCode::SetCanter);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_deficit_multiplier_values() {
        assert_eq!(stamina_deficit_multiplier(50.0, 100.0), 0.0);
        assert_eq!(stamina_deficit_multiplier(80.0, 100.0), 0.0);
        assert!((stamina_deficit_multiplier(25.0, 100.0) - 0.25).abs() < 1e-6);
        assert_eq!(stamina_deficit_multiplier(0.0, 100.0), 1.0);
    }

    #[test]
    fn test_deficit_multiplier_is_bounded_and_monotonic() {
        let mut prev = f32::MAX;
        for i in 0..=100 {
            let value = stamina_deficit_multiplier(i as f32, 100.0);
            assert!((0.0..=1.0).contains(&value));
            assert!(value <= prev);
            prev = value;
        }
        assert_eq!(stamina_deficit_multiplier(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_sprint_key_cycles_with_cooldown() {
        let mut gait = GaitMachine::new();

        assert_eq!(gait.sprint_key(true, 1_000), Some(Gait::Canter));
        // Held key does not repeat
        assert_eq!(gait.sprint_key(true, 1_500), None);
        gait.sprint_key(false, 1_510);

        // Fresh edge inside the cooldown is a no-op
        let mut fast = gait.clone();
        fast.sprint_key(false, 1_000);
        assert_eq!(fast.sprint_key(true, 1_200), None);
        assert_eq!(fast.current(), Gait::Canter);

        assert_eq!(gait.sprint_key(true, 1_600), Some(Gait::Gallop));
        gait.sprint_key(false, 1_700);
        assert_eq!(gait.sprint_key(true, 1_900), Some(Gait::Walk));
    }

    #[test]
    fn test_low_stamina_forces_walk() {
        let mut gait = GaitMachine::new();
        gait.set(Gait::Gallop);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(gait.stamina_check(0.5, false, 8.0, 100.0, &mut rng), None);
        assert_eq!(
            gait.stamina_check(0.5, false, 8.0, 100.0, &mut rng),
            Some(SyncCode::ForceWalk)
        );
        assert_eq!(gait.current(), Gait::Walk);
    }

    #[test]
    fn test_stamina_roll_downgrades_to_canter() {
        // StepRng(0, 0) always yields 0.0 for f32, so any positive chance succeeds
        let mut low_roll = StepRng::new(0, 0);
        let mut gait = GaitMachine::new();
        gait.set(Gait::Gallop);
        assert_eq!(
            gait.stamina_check(1.0, false, 30.0, 100.0, &mut low_roll),
            Some(SyncCode::SetCanter)
        );
        assert_eq!(gait.current(), Gait::Canter);

        // Above half stamina there is no chance at all
        let mut gait = GaitMachine::new();
        gait.set(Gait::Gallop);
        assert_eq!(gait.stamina_check(1.0, false, 60.0, 100.0, &mut low_roll), None);
        assert_eq!(gait.current(), Gait::Gallop);
    }

    #[test]
    fn test_no_downgrade_while_swimming_or_not_galloping() {
        let mut rng = StepRng::new(0, 0);
        let mut gait = GaitMachine::new();
        gait.set(Gait::Gallop);
        assert_eq!(gait.stamina_check(1.0, true, 0.0, 100.0, &mut rng), None);

        gait.set(Gait::Canter);
        assert_eq!(gait.stamina_check(1.0, false, 0.0, 100.0, &mut rng), None);
        assert_eq!(gait.current(), Gait::Canter);
    }
}
