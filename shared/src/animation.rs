//! Animation descriptors and commands
//!
//! The riding logic never plays anything itself. It emits [`AnimCommand`]s which the
//! client applies to [`ActiveAnimations`] (and the server simply drops).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::RideError;

/// Locomotion control codes every rideable species must define.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlCode {
    Idle,
    Swim,
    Walk,
    WalkBack,
    Canter,
    Sprint,
    Jump,
}

impl ControlCode {
    pub const REQUIRED: [ControlCode; 7] = [
        ControlCode::Idle,
        ControlCode::Swim,
        ControlCode::Walk,
        ControlCode::WalkBack,
        ControlCode::Canter,
        ControlCode::Sprint,
        ControlCode::Jump,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlCode::Idle => "idle",
            ControlCode::Swim => "swim",
            ControlCode::Walk => "walk",
            ControlCode::WalkBack => "walkback",
            ControlCode::Canter => "canter",
            ControlCode::Sprint => "sprint",
            ControlCode::Jump => "jump",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AnimationMeta {
    pub animation: String,
    pub speed: f32,
    pub ease_in_speed: f32,
    pub ease_out_speed: f32,
}

impl AnimationMeta {
    pub fn named(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            ..default()
        }
    }
}

impl Default for AnimationMeta {
    fn default() -> Self {
        Self {
            animation: String::new(),
            speed: 1.0,
            ease_in_speed: 10.0,
            ease_out_speed: 10.0,
        }
    }
}

/// Mount animation, movement speed and rider animation for one control code.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct ControlMeta {
    pub anim: AnimationMeta,
    pub move_speed: f32,
    pub rider_anim: AnimationMeta,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct RideableConfig {
    pub min_generation: u32,
    pub controls: BTreeMap<ControlCode, ControlMeta>,
}

impl RideableConfig {
    pub fn control(&self, code: ControlCode) -> Result<&ControlMeta, RideError> {
        self.controls
            .get(&code)
            .ok_or_else(|| RideError::MissingControl(code.as_str().to_string()))
    }

    /// Content check run at load time: every required control must be present.
    pub fn validate(&self) -> Result<(), RideError> {
        for code in ControlCode::REQUIRED {
            self.control(code)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimTarget {
    Mount,
    Rider(u64),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AnimCommand {
    Start { target: AnimTarget, meta: AnimationMeta },
    Stop { target: AnimTarget, animation: String },
}

impl AnimCommand {
    pub fn target(&self) -> AnimTarget {
        match self {
            AnimCommand::Start { target, .. } | AnimCommand::Stop { target, .. } => *target,
        }
    }

    pub fn animation(&self) -> &str {
        match self {
            AnimCommand::Start { meta, .. } => &meta.animation,
            AnimCommand::Stop { animation, .. } => animation,
        }
    }
}

/// Suffixed variants every mount command is mirrored to (e.g. an antler overlay).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ShadowTargets {
    pub suffixes: Vec<String>,
}

impl ShadowTargets {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// The command itself followed by one mirrored copy per suffix. Rider commands are
    /// never mirrored.
    pub fn expand(&self, command: AnimCommand) -> Vec<AnimCommand> {
        if command.target() != AnimTarget::Mount || self.suffixes.is_empty() {
            return vec![command];
        }
        let mut out = Vec::with_capacity(1 + self.suffixes.len());
        for suffix in &self.suffixes {
            out.push(match &command {
                AnimCommand::Start { target, meta } => AnimCommand::Start {
                    target: *target,
                    meta: AnimationMeta {
                        animation: format!("{}{}", meta.animation, suffix),
                        ..meta.clone()
                    },
                },
                AnimCommand::Stop { target, animation } => AnimCommand::Stop {
                    target: *target,
                    animation: format!("{}{}", animation, suffix),
                },
            });
        }
        out.insert(0, command);
        out
    }
}

/// Animations currently playing on an entity (client side).
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct ActiveAnimations {
    active: BTreeMap<String, AnimationMeta>,
}

impl ActiveAnimations {
    pub fn apply(&mut self, command: &AnimCommand) {
        match command {
            AnimCommand::Start { meta, .. } => {
                self.active.insert(meta.animation.clone(), meta.clone());
            }
            AnimCommand::Stop { animation, .. } => {
                self.active.remove(animation);
            }
        }
    }

    pub fn is_active(&self, animation: &str) -> bool {
        self.active.contains_key(animation)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_missing_control() {
        let mut config = RideableConfig::default();
        for code in ControlCode::REQUIRED {
            config.controls.insert(code, ControlMeta::default());
        }
        assert_eq!(config.validate(), Ok(()));

        config.controls.remove(&ControlCode::WalkBack);
        assert_eq!(
            config.validate(),
            Err(RideError::MissingControl("walkback".to_string()))
        );
    }

    #[test]
    fn test_shadow_targets_mirror_mount_commands() {
        let shadows = ShadowTargets::new(vec!["-antlers".to_string()]);

        let start = AnimCommand::Start {
            target: AnimTarget::Mount,
            meta: AnimationMeta::named("walk"),
        };
        let expanded = shadows.expand(start);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].animation(), "walk");
        assert_eq!(expanded[1].animation(), "walk-antlers");

        let stop = AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "walk".into(),
        };
        assert_eq!(shadows.expand(stop)[1].animation(), "walk-antlers");

        let rider = AnimCommand::Stop {
            target: AnimTarget::Rider(3),
            animation: "ride-walk".into(),
        };
        assert_eq!(shadows.expand(rider).len(), 1);
    }

    #[test]
    fn test_active_animations_track_commands() {
        let mut active = ActiveAnimations::default();
        active.apply(&AnimCommand::Start {
            target: AnimTarget::Mount,
            meta: AnimationMeta::named("canter"),
        });
        assert!(active.is_active("canter"));
        active.apply(&AnimCommand::Stop {
            target: AnimTarget::Mount,
            animation: "canter".into(),
        });
        assert!(!active.is_active("canter"));
        assert_eq!(active.names().count(), 0);
    }
}
