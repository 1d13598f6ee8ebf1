//! Stamina resource model
//!
//! Server-authoritative. The server evaluates fatigue and regeneration on a 0.25s
//! accumulator; clients only read the replicated [`StaminaState`] and push their observed
//! sprint flag through a [`SyncCode`] when it flips.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeTree;
use crate::config::RidingConfig;
use crate::sync::SyncCode;

/// Seconds of tick delta accumulated between two stamina evaluations.
pub const STAMINA_TICK_INTERVAL: f32 = 0.25;

/// Regen is evaluated four times a second, so each slice gets a quarter of the rate.
pub const REGEN_SLICE_FACTOR: f32 = 0.25;

/// Attribute subtree the stamina record is persisted under.
pub const STAMINA_TREE_KEY: &str = "hoofbeat:stamina";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FatigueKind {
    Run,
    Swim,
    Other(String),
}

/// Why fatigue is being applied. Only ever passed by reference, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct FatigueSource {
    pub kind: FatigueKind,
    pub entity: Option<Entity>,
    pub position: Option<Vec3>,
}

impl FatigueSource {
    pub fn new(kind: FatigueKind, entity: Option<Entity>, position: Option<Vec3>) -> Self {
        Self {
            kind,
            entity,
            position,
        }
    }
}

type FatigueTransform = Box<dyn Fn(f32, &FatigueSource) -> f32 + Send + Sync>;

/// Ordered list of named fatigue transforms, folded in registration order.
#[derive(Resource, Default)]
pub struct FatigueHooks {
    hooks: Vec<(String, FatigueTransform)>,
}

impl FatigueHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        hook: impl Fn(f32, &FatigueSource) -> f32 + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.push((name.into(), Box::new(hook)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|(name, _)| name.as_str())
    }

    pub fn apply(&self, fatigue: f32, source: &FatigueSource) -> f32 {
        self.hooks
            .iter()
            .fold(fatigue, |acc, (_, hook)| hook(acc, source))
    }
}

/// Per-species stamina defaults, overridable per entity by saved attributes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StaminaDefaults {
    pub max_stamina: f32,
    pub sprint_fatigue: f32,
    pub swim_fatigue: f32,
    pub base_fatigue_rate: f32,
    pub regen_rate: f32,
    pub regen_penalty_swimming: f32,
    pub regen_penalty_mounted: f32,
}

impl Default for StaminaDefaults {
    fn default() -> Self {
        Self {
            max_stamina: 100.0,
            sprint_fatigue: 0.2,
            swim_fatigue: 0.2,
            base_fatigue_rate: 1.0,
            regen_rate: 1.0,
            regen_penalty_swimming: 0.0,
            regen_penalty_mounted: 0.0,
        }
    }
}

/// What the stamina model needs to know about its entity for one evaluation.
#[derive(Clone, Copy, Debug)]
pub struct StaminaEnv {
    pub authoritative: bool,
    pub alive: bool,
    pub swimming: bool,
    pub mounted: bool,
    /// In-game seconds per real second (speed of time x calendar speed multiplier).
    pub time_scale: f32,
    pub entity: Option<Entity>,
    pub position: Option<Vec3>,
}

impl Default for StaminaEnv {
    fn default() -> Self {
        Self {
            authoritative: true,
            alive: true,
            swimming: false,
            mounted: false,
            time_scale: 1.0,
            entity: None,
            position: None,
        }
    }
}

/// Replicated stamina record. `stamina` is kept in `[0, max_stamina]` and `exhausted`
/// always mirrors `stamina == 0`.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StaminaState {
    stamina: f32,
    max_stamina: f32,
    pub sprint_fatigue: f32,
    pub swim_fatigue: f32,
    pub base_fatigue_rate: f32,
    pub regen_rate: f32,
    pub regen_penalty_swimming: f32,
    pub regen_penalty_mounted: f32,
    pub sprinting: bool,
    exhausted: bool,
}

impl StaminaState {
    pub fn new(defaults: &StaminaDefaults) -> Self {
        let mut state = Self {
            stamina: defaults.max_stamina,
            max_stamina: defaults.max_stamina.max(0.0),
            sprint_fatigue: defaults.sprint_fatigue,
            swim_fatigue: defaults.swim_fatigue,
            base_fatigue_rate: defaults.base_fatigue_rate,
            regen_rate: defaults.regen_rate,
            regen_penalty_swimming: defaults.regen_penalty_swimming,
            regen_penalty_mounted: defaults.regen_penalty_mounted,
            sprinting: false,
            exhausted: false,
        };
        state.set_stamina(defaults.max_stamina);
        state
    }

    /// Build from species defaults plus any saved per-entity overrides found under
    /// [`STAMINA_TREE_KEY`] in `saved`.
    pub fn from_attributes(
        defaults: &StaminaDefaults,
        saved: Option<&AttributeTree>,
        max_multiplier: f32,
    ) -> Self {
        let default_max = defaults.max_stamina * max_multiplier;
        let Some(tree) = saved.and_then(|root| root.tree(STAMINA_TREE_KEY)) else {
            return Self::new(&StaminaDefaults {
                max_stamina: default_max,
                ..defaults.clone()
            });
        };

        let max_stamina = tree.float_or("maxstamina", default_max).max(0.0);
        let mut state = Self {
            stamina: 0.0,
            max_stamina,
            sprint_fatigue: tree.float_or("sprintfatigue", defaults.sprint_fatigue),
            swim_fatigue: tree.float_or("swimfatigue", defaults.swim_fatigue),
            base_fatigue_rate: tree.float_or("basefatiguerate", defaults.base_fatigue_rate),
            regen_rate: tree.float_or("staminaregenrate", defaults.regen_rate),
            regen_penalty_swimming: tree
                .float_or("regenpenaltyswimming", defaults.regen_penalty_swimming),
            regen_penalty_mounted: tree
                .float_or("regenpenaltymounted", defaults.regen_penalty_mounted),
            sprinting: tree.bool_or("sprinting", false),
            exhausted: false,
        };
        state.set_stamina(tree.float_or("currentstamina", max_stamina));
        state
    }

    /// Write the record into the namespaced subtree of `root`.
    pub fn to_attributes(&self, root: &mut AttributeTree) {
        let tree = root.tree_mut(STAMINA_TREE_KEY);
        tree.set_float("currentstamina", self.stamina);
        tree.set_float("maxstamina", self.max_stamina);
        tree.set_float("sprintfatigue", self.sprint_fatigue);
        tree.set_float("swimfatigue", self.swim_fatigue);
        tree.set_float("basefatiguerate", self.base_fatigue_rate);
        tree.set_float("staminaregenrate", self.regen_rate);
        tree.set_float("regenpenaltyswimming", self.regen_penalty_swimming);
        tree.set_float("regenpenaltymounted", self.regen_penalty_mounted);
        tree.set_bool("sprinting", self.sprinting);
        tree.set_bool("exhausted", self.exhausted);
    }

    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    pub fn max_stamina(&self) -> f32 {
        self.max_stamina
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn fraction(&self) -> f32 {
        if self.max_stamina <= 0.0 {
            0.0
        } else {
            self.stamina / self.max_stamina
        }
    }

    pub fn set_stamina(&mut self, value: f32) {
        self.stamina = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, self.max_stamina)
        };
        self.exhausted = self.stamina == 0.0;
    }

    pub fn set_max_stamina(&mut self, value: f32) {
        self.max_stamina = value.max(0.0);
        self.set_stamina(self.stamina);
    }

    /// Drain stamina by `base_fatigue_rate x hooks(amount)`. No-op (returns false) when
    /// the entity is dead, this side is not authoritative, or `amount <= 0`.
    pub fn apply_fatigue(
        &mut self,
        amount: f32,
        source: &FatigueSource,
        env: &StaminaEnv,
        hooks: &FatigueHooks,
    ) -> bool {
        if !env.alive || !env.authoritative || amount <= 0.0 {
            return false;
        }
        let fatigue = hooks.apply(amount, source);
        self.set_stamina(self.stamina - self.base_fatigue_rate * fatigue);
        true
    }

    pub fn effective_regen_rate(&self, env: &StaminaEnv, global_multiplier: f32) -> f32 {
        let mut penalty = 0.0;
        if env.swimming {
            penalty += self.regen_penalty_swimming;
        }
        if env.mounted {
            penalty += self.regen_penalty_mounted;
        }
        (self.regen_rate - penalty) * global_multiplier
    }

    /// Advance stamina for `elapsed` real seconds, scaled to in-game seconds by the
    /// environment's time scale.
    pub fn regenerate(&mut self, elapsed: f32, env: &StaminaEnv, global_multiplier: f32) {
        if self.stamina >= self.max_stamina {
            return;
        }
        let rate = self.effective_regen_rate(env, global_multiplier);
        let game_seconds = elapsed * env.time_scale;
        self.set_stamina(self.stamina + game_seconds * REGEN_SLICE_FACTOR * rate);
    }

    /// One accumulator window on the authoritative side: swim and sprint fatigue, or
    /// regeneration when nothing fatigued. Returns true when fatigue was applied.
    pub fn evaluate_window(
        &mut self,
        elapsed: f32,
        env: &StaminaEnv,
        config: &RidingConfig,
        hooks: &FatigueHooks,
    ) -> bool {
        let mut fatiguing = false;
        if env.alive {
            let scaled = elapsed * env.time_scale;
            if config.enable_stamina {
                if env.swimming {
                    let amount =
                        self.swim_fatigue * scaled * config.global_swim_stamina_cost_multiplier;
                    let source = FatigueSource::new(FatigueKind::Swim, env.entity, env.position);
                    fatiguing |= self.apply_fatigue(amount, &source, env, hooks);
                }
                if self.sprinting {
                    let amount =
                        self.sprint_fatigue * scaled * config.global_sprint_stamina_cost_multiplier;
                    let source = FatigueSource::new(FatigueKind::Run, env.entity, env.position);
                    fatiguing |= self.apply_fatigue(amount, &source, env, hooks);
                }
            }
            if !fatiguing {
                self.regenerate(elapsed, env, config.global_stamina_regen_multiplier);
            }
        }
        self.exhausted = self.stamina == 0.0;
        fatiguing
    }
}

/// 0.25s accumulator with a randomised phase.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct StaminaTicker {
    since_last: f32,
}

impl StaminaTicker {
    pub fn new(phase: f32) -> Self {
        Self { since_last: phase }
    }

    /// Start somewhere in [0, 1) so entities loaded together do not all evaluate on the
    /// same tick.
    pub fn randomised<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(rng.gen_range(0.0..1.0))
    }

    /// Returns the accumulated window once it reaches the interval.
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        self.since_last += dt;
        if self.since_last < STAMINA_TICK_INTERVAL {
            return None;
        }
        let elapsed = self.since_last;
        self.since_last = 0.0;
        Some(elapsed)
    }
}

/// Client-side watcher of the locally derived sprint flag. Emits a code only on change.
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct SprintObserver {
    last: bool,
}

impl SprintObserver {
    pub fn observe(&mut self, sprinting: bool) -> Option<SyncCode> {
        if sprinting == self.last {
            return None;
        }
        self.last = sprinting;
        Some(SyncCode::for_sprint(sprinting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horse() -> StaminaState {
        StaminaState::new(&StaminaDefaults::default())
    }

    #[test]
    fn test_fatigue_clamps_and_exhausts() {
        let mut state = horse();
        let hooks = FatigueHooks::new();
        let env = StaminaEnv::default();
        let source = FatigueSource::new(FatigueKind::Run, None, None);

        assert!(state.apply_fatigue(30.0, &source, &env, &hooks));
        assert_eq!(state.stamina(), 70.0);
        assert!(!state.exhausted());

        // Overshoot clamps to zero
        assert!(state.apply_fatigue(1_000.0, &source, &env, &hooks));
        assert_eq!(state.stamina(), 0.0);
        assert!(state.exhausted());
    }

    #[test]
    fn test_fatigue_noops() {
        let mut state = horse();
        let hooks = FatigueHooks::new();
        let source = FatigueSource::new(FatigueKind::Swim, None, None);

        let dead = StaminaEnv {
            alive: false,
            ..default()
        };
        let remote = StaminaEnv {
            authoritative: false,
            ..default()
        };
        assert!(!state.apply_fatigue(10.0, &source, &dead, &hooks));
        assert!(!state.apply_fatigue(10.0, &source, &remote, &hooks));
        assert!(!state.apply_fatigue(0.0, &source, &StaminaEnv::default(), &hooks));
        assert!(!state.apply_fatigue(-5.0, &source, &StaminaEnv::default(), &hooks));
        assert_eq!(state.stamina(), 100.0);
    }

    #[test]
    fn test_fatigue_hooks_fold_in_order() {
        let mut hooks = FatigueHooks::new();
        hooks
            .register("halve", |f, _| f * 0.5)
            .register("swim-only-minus-one", |f, src| {
                if src.kind == FatigueKind::Swim {
                    f - 1.0
                } else {
                    f
                }
            });
        assert_eq!(hooks.names().collect::<Vec<_>>(), vec!["halve", "swim-only-minus-one"]);

        let swim = FatigueSource::new(FatigueKind::Swim, None, None);
        let run = FatigueSource::new(FatigueKind::Run, None, None);
        assert_eq!(hooks.apply(10.0, &swim), 4.0);
        assert_eq!(hooks.apply(10.0, &run), 5.0);

        let mut state = horse();
        state.base_fatigue_rate = 2.0;
        state.apply_fatigue(10.0, &swim, &StaminaEnv::default(), &hooks);
        assert_eq!(state.stamina(), 92.0);
    }

    #[test]
    fn test_regen_penalties_and_clamp() {
        let mut state = horse();
        state.regen_penalty_mounted = 0.5;
        state.regen_penalty_swimming = 0.25;
        state.set_stamina(50.0);

        let env = StaminaEnv {
            mounted: true,
            swimming: true,
            ..default()
        };
        assert!((state.effective_regen_rate(&env, 2.0) - 0.5).abs() < 1e-6);

        // 4s * 0.25 * 1.0
        state.regenerate(4.0, &StaminaEnv::default(), 1.0);
        assert!((state.stamina() - 51.0).abs() < 1e-5);

        // Time scale applies, result never overshoots max
        let fast = StaminaEnv {
            time_scale: 1_000.0,
            ..default()
        };
        state.regenerate(4.0, &fast, 1.0);
        assert_eq!(state.stamina(), 100.0);

        // Penalties larger than the rate drain but never below zero
        state.regen_penalty_mounted = 10_000.0;
        state.set_stamina(1.0);
        let mounted = StaminaEnv {
            mounted: true,
            ..default()
        };
        state.regenerate(4.0, &mounted, 1.0);
        assert_eq!(state.stamina(), 0.0);
        assert!(state.exhausted());
    }

    #[test]
    fn test_evaluate_window_sprinting_skips_regen() {
        let config = RidingConfig::default();
        let hooks = FatigueHooks::new();
        let env = StaminaEnv::default();

        let mut state = horse();
        state.set_stamina(50.0);
        state.sprinting = true;
        assert!(state.evaluate_window(0.25, &env, &config, &hooks));
        // 0.2 fatigue * 0.25s
        assert!((state.stamina() - 49.95).abs() < 1e-4);

        state.sprinting = false;
        assert!(!state.evaluate_window(0.25, &env, &config, &hooks));
        assert!(state.stamina() > 49.95);

        let disabled = RidingConfig {
            enable_stamina: false,
            ..default()
        };
        state.sprinting = true;
        let before = state.stamina();
        assert!(!state.evaluate_window(0.25, &env, &disabled, &hooks));
        assert!(state.stamina() >= before);
    }

    #[test]
    fn test_attribute_round_trip_with_overrides() {
        let defaults = StaminaDefaults::default();

        // No saved tree: species defaults with the global multiplier
        let fresh = StaminaState::from_attributes(&defaults, None, 1.5);
        assert_eq!(fresh.max_stamina(), 150.0);
        assert_eq!(fresh.stamina(), 150.0);

        let mut saved = AttributeTree::new();
        let sub = saved.tree_mut(STAMINA_TREE_KEY);
        sub.set_float("currentstamina", 500.0);
        sub.set_float("maxstamina", 80.0);
        sub.set_float("swimfatigue", 0.7);

        let state = StaminaState::from_attributes(&defaults, Some(&saved), 1.0);
        assert_eq!(state.max_stamina(), 80.0);
        // Saved current above max is clamped
        assert_eq!(state.stamina(), 80.0);
        assert_eq!(state.swim_fatigue, 0.7);
        assert_eq!(state.sprint_fatigue, 0.2);

        let mut out = AttributeTree::new();
        state.to_attributes(&mut out);
        let back = StaminaState::from_attributes(&defaults, Some(&out), 1.0);
        assert_eq!(back, state);
    }

    #[test]
    fn test_ticker_window() {
        let mut ticker = StaminaTicker::new(0.0);
        assert_eq!(ticker.advance(0.1), None);
        assert_eq!(ticker.advance(0.1), None);
        let elapsed = ticker.advance(0.1).expect("window reached");
        assert!((elapsed - 0.3).abs() < 1e-6);
        assert_eq!(ticker.advance(0.1), None);

        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let mut phased = StaminaTicker::randomised(&mut rng);
        assert_eq!(phased.advance(0.0), None);
    }

    #[test]
    fn test_sprint_observer_sends_on_change_only() {
        let mut observer = SprintObserver::default();
        assert_eq!(observer.observe(false), None);
        assert_eq!(observer.observe(true), Some(SyncCode::SprintOn));
        assert_eq!(observer.observe(true), None);
        assert_eq!(observer.observe(false), Some(SyncCode::SprintOff));
    }
}
