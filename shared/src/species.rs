//! Per-species riding content
//!
//! Stamina defaults, control map, seat layout and shadow animation suffixes for each
//! rideable creature. Loaded from RON (or the built-in set) and validated once at load so
//! per-tick lookups can rely on a complete control map.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::animation::{AnimationMeta, ControlCode, ControlMeta, RideableConfig, ShadowTargets};
use crate::config::read_ron;
use crate::error::RideError;
use crate::seat::SeatConfig;
use crate::stamina::StaminaDefaults;

/// Default location of the species file.
pub const SPECIES_PATH: &str = "config/species.ron";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpeciesConfig {
    pub name: String,
    #[serde(default)]
    pub stamina: StaminaDefaults,
    pub rideable: RideableConfig,
    pub seats: Vec<SeatConfig>,
    #[serde(default)]
    pub shadow_suffixes: Vec<String>,
    /// Body half extents, used by the physics stand-in and the placeholder mesh.
    #[serde(default = "default_body")]
    pub body: Vec3,
    #[serde(default)]
    pub color: [f32; 3],
}

fn default_body() -> Vec3 {
    Vec3::new(0.5, 0.8, 1.1)
}

impl SpeciesConfig {
    pub fn validate(&self) -> Result<(), RideError> {
        self.rideable.validate()
    }

    pub fn shadows(&self) -> ShadowTargets {
        ShadowTargets::new(self.shadow_suffixes.clone())
    }

    fn hooved(name: &str, walk_speed: f32) -> RideableConfig {
        let control = |code: ControlCode, speed: f32, rider: &str| ControlMeta {
            anim: AnimationMeta::named(code.as_str()),
            move_speed: speed,
            rider_anim: AnimationMeta::named(rider),
        };
        let controls = [
            control(ControlCode::Idle, 0.0, "ride-idle"),
            control(ControlCode::Swim, walk_speed * 0.6, "ride-idle"),
            control(ControlCode::Walk, walk_speed, "ride-walk"),
            control(ControlCode::WalkBack, walk_speed * 0.5, "ride-walk"),
            control(ControlCode::Canter, walk_speed * 2.0, "ride-canter"),
            control(ControlCode::Sprint, walk_speed * 3.2, "ride-gallop"),
            control(ControlCode::Jump, walk_speed, "ride-jump"),
        ];
        debug!("Built-in control map for {}", name);
        RideableConfig {
            min_generation: 0,
            controls: ControlCode::REQUIRED.into_iter().zip(controls).collect(),
        }
    }

    pub fn horse() -> Self {
        Self {
            name: "horse".to_string(),
            stamina: StaminaDefaults::default(),
            rideable: Self::hooved("horse", 2.0),
            seats: vec![
                SeatConfig {
                    seat_id: "rider-front".to_string(),
                    attach_offset: Vec3::new(0.0, 1.45, 0.15),
                    ..default()
                },
                SeatConfig {
                    seat_id: "rider-back".to_string(),
                    attach_offset: Vec3::new(0.0, 1.45, -0.45),
                    ..default()
                },
            ],
            shadow_suffixes: Vec::new(),
            body: default_body(),
            color: [0.45, 0.3, 0.2],
        }
    }

    pub fn elk() -> Self {
        let mut rideable = Self::hooved("elk", 1.8);
        rideable.min_generation = 1;
        Self {
            name: "elk".to_string(),
            stamina: StaminaDefaults {
                max_stamina: 140.0,
                swim_fatigue: 0.1,
                regen_penalty_mounted: 0.2,
                ..default()
            },
            rideable,
            seats: vec![SeatConfig {
                seat_id: "rider".to_string(),
                attach_offset: Vec3::new(0.0, 1.7, 0.0),
                ..default()
            }],
            shadow_suffixes: vec!["-antlers".to_string()],
            body: Vec3::new(0.55, 0.95, 1.2),
            color: [0.55, 0.42, 0.3],
        }
    }
}

#[derive(Resource, Clone, Debug, Default)]
pub struct SpeciesRegistry {
    species: HashMap<String, SpeciesConfig>,
}

impl SpeciesRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for species in [SpeciesConfig::horse(), SpeciesConfig::elk()] {
            registry.species.insert(species.name.clone(), species);
        }
        registry
    }

    /// Validates every entry; an incomplete control map rejects the whole set.
    pub fn from_list(list: Vec<SpeciesConfig>) -> Result<Self, RideError> {
        let mut registry = Self::default();
        for species in list {
            species.validate()?;
            registry.species.insert(species.name.clone(), species);
        }
        Ok(registry)
    }

    /// Species file if present and valid, otherwise the built-in set.
    pub fn load_or_builtin(path: &Path) -> Self {
        match read_ron::<Vec<SpeciesConfig>>(path) {
            Ok(Some(list)) => match Self::from_list(list) {
                Ok(registry) => {
                    info!("Loaded {} species from {:?}", registry.len(), path);
                    registry
                }
                Err(e) => {
                    error!("Invalid species content in {:?}: {}", path, e);
                    Self::builtin()
                }
            },
            Ok(None) => Self::builtin(),
            Err(e) => {
                error!("Could not read species {:?}: {}", path, e);
                Self::builtin()
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&SpeciesConfig, RideError> {
        self.species
            .get(name)
            .ok_or_else(|| RideError::UnknownSpecies(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_species_are_valid() {
        let registry = SpeciesRegistry::builtin();
        assert_eq!(registry.len(), 2);
        for name in ["horse", "elk"] {
            let species = registry.get(name).expect("built in");
            assert_eq!(species.validate(), Ok(()));
        }
        assert_eq!(registry.get("elk").map(|s| s.shadows().suffixes.len()), Ok(1));
        assert!(matches!(registry.get("unicorn"), Err(RideError::UnknownSpecies(_))));
    }

    #[test]
    fn test_incomplete_species_rejected() {
        let mut broken = SpeciesConfig::horse();
        broken.rideable.controls.remove(&ControlCode::Jump);
        assert_eq!(
            SpeciesRegistry::from_list(vec![SpeciesConfig::elk(), broken]).map(|r| r.len()),
            Err(RideError::MissingControl("jump".to_string()))
        );
    }

    #[test]
    fn test_species_ron_round_trip() {
        let text = ron::ser::to_string(&vec![SpeciesConfig::horse()]).expect("serializes");
        let list: Vec<SpeciesConfig> = ron::de::from_str(&text).expect("parses");
        let registry = SpeciesRegistry::from_list(list).expect("valid");
        assert_eq!(registry.get("horse"), Ok(&SpeciesConfig::horse()));
    }
}
