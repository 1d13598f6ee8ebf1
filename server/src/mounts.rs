//! Server-side mount spawning and wander AI.
//!
//! Mounts wander around their home point while nobody rides them. The riding logic's
//! task blocker decides whether wandering (or idling) may run at all.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::Started;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shared::{
    ground_height, AccessoryMeta, AiTask, Mount, MountAccessories, MountBody, MountGait, MountPose,
    MountSeats, MoveIntent, Rideable, RidingConfig, SpeciesRegistry, StaminaState, StaminaTicker,
    WorldCalendar, CONTROL_SCHEME_ATTRIBUTE, FIXED_TIMESTEP_HZ,
};

use crate::persistence::MountStore;

/// Wander speed (units per second)
pub const MOUNT_WANDER_SPEED: f32 = 1.2;
/// Max turn rate while wandering (radians per second)
pub const MOUNT_TURN_SPEED: f32 = 1.5;
pub const MOUNT_WANDER_RADIUS: f32 = 14.0;
pub const MOUNT_MIN_TARGET_DIST: f32 = 4.0;
pub const MOUNT_IDLE_TIME_MIN: f32 = 4.0;
pub const MOUNT_IDLE_TIME_MAX: f32 = 10.0;

/// Tracks if mounts have been spawned
#[derive(Resource)]
pub struct MountsSpawned;

/// Body half extents, from the species.
#[derive(Component, Clone, Copy, Debug)]
pub struct BodyExtents(pub Vec3);

/// What the mount wants to do with its body this tick. Written by the riding tick and
/// the wander AI, consumed by the physics step.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct MountIntent(pub MoveIntent);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WanderState {
    Idle,
    Walking,
}

#[derive(Component)]
pub struct MountWander {
    pub home: Vec3,
    pub target: Vec3,
    pub state: WanderState,
    /// When > 0, the mount is idling. When it hits 0, pick a new target.
    pub idle_timer: f32,
    pub rng: StdRng,
}

impl MountWander {
    pub fn new(home: Vec3, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ 0xC0FFEE_u64);
        let idle_timer = rng.gen_range(1.0..3.0);
        Self {
            home,
            target: home,
            state: WanderState::Idle,
            idle_timer,
            rng,
        }
    }

    fn start_idle(&mut self) {
        self.idle_timer = self.rng.gen_range(MOUNT_IDLE_TIME_MIN..MOUNT_IDLE_TIME_MAX);
        self.state = WanderState::Idle;
    }

    /// Task the AI is about to run this tick.
    pub fn next_task(&self) -> AiTask {
        if self.state == WanderState::Walking || self.idle_timer <= 0.0 {
            AiTask::Wander
        } else {
            AiTask::Idle
        }
    }
}

struct MountSpawn {
    id: u64,
    species: &'static str,
    generation: u32,
    xz: (f32, f32),
    yaw: f32,
    saddle: Option<&'static str>,
}

const MOUNT_SPAWNS: [MountSpawn; 4] = [
    MountSpawn { id: 1, species: "horse", generation: 2, xz: (4.0, -2.0), yaw: 0.0, saddle: Some("Hold") },
    MountSpawn { id: 2, species: "horse", generation: 1, xz: (-5.0, -4.0), yaw: PI * 0.5, saddle: Some("Press") },
    MountSpawn { id: 3, species: "elk", generation: 0, xz: (10.0, 6.0), yaw: PI, saddle: None },
    MountSpawn { id: 4, species: "elk", generation: 3, xz: (18.0, -12.0), yaw: -PI * 0.5, saddle: None },
];

fn saddle(scheme: &str) -> AccessoryMeta {
    let mut meta = AccessoryMeta {
        item: "saddle".to_string(),
        ..default()
    };
    meta.attributes
        .insert(CONTROL_SCHEME_ATTRIBUTE.to_string(), scheme.to_string());
    meta
}

/// Spawn mounts once after the server starts, restoring saved stamina and dismount time.
pub fn spawn_mounts_once(
    mut commands: Commands,
    species: Res<SpeciesRegistry>,
    config: Res<RidingConfig>,
    store: Res<MountStore>,
    spawned: Option<Res<MountsSpawned>>,
    server_started: Query<(), With<Started>>,
) {
    if spawned.is_some() || server_started.is_empty() {
        return;
    }
    commands.insert_resource(MountsSpawned);

    let mut phase_rng = rand::thread_rng();
    for spawn in MOUNT_SPAWNS.iter() {
        let species_config = match species.get(spawn.species) {
            Ok(config) => config,
            Err(e) => {
                error!("Cannot spawn mount {}: {}", spawn.id, e);
                continue;
            }
        };

        let record = store.record(spawn.id);
        if let Some(record) = record {
            if record.species != spawn.species {
                warn!(
                    "Saved mount {} was a {}, now a {}; keeping saved stamina anyway",
                    spawn.id, record.species, spawn.species
                );
            }
        }
        let stamina = StaminaState::from_attributes(
            &species_config.stamina,
            record.map(|r| &r.attributes),
            config.global_max_stamina_multiplier,
        );
        let mut rideable = Rideable::new(species_config.rideable.clone(), species_config.shadows());
        rideable.last_dismount_total_hours = record.and_then(|r| r.last_dismount_total_hours);
        rideable.debug = config.debug_mode;

        let (x, z) = spawn.xz;
        let position = Vec3::new(x, ground_height(x, z) + species_config.body.y, z);
        let accessories = MountAccessories(vec![spawn.saddle.map(saddle), None]);

        commands.spawn((
            Mount {
                id: spawn.id,
                species: spawn.species.to_string(),
                generation: spawn.generation,
            },
            MountPose {
                position,
                yaw: spawn.yaw,
            },
            MountBody::default(),
            MountSeats::from_configs(&species_config.seats),
            MountGait::default(),
            stamina,
            accessories,
            Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
        ))
        .insert((
            rideable,
            StaminaTicker::randomised(&mut phase_rng),
            BodyExtents(species_config.body),
            MountIntent::default(),
            MountWander::new(position, spawn.id),
        ));

        info!(
            "Spawned {} {} (generation {}) at {:?}",
            spawn.species, spawn.id, spawn.generation, position
        );
    }
}

/// Smoothly rotate current angle toward target angle at a given speed.
fn smooth_rotate_toward(current: f32, target: f32, turn_speed: f32, dt: f32) -> f32 {
    // Normalize angle difference to [-PI, PI]
    let diff = (target - current + PI).rem_euclid(TAU) - PI;
    let max_turn = turn_speed * dt;
    if diff.abs() <= max_turn {
        target
    } else {
        current + diff.signum() * max_turn
    }
}

/// Pick a dry spot around home, at least the minimum distance from where we stand.
fn pick_wander_target(home: Vec3, current: Vec3, rng: &mut StdRng) -> Vec3 {
    for _ in 0..16 {
        let angle = rng.gen_range(0.0..TAU);
        let r = rng.gen_range(MOUNT_MIN_TARGET_DIST..MOUNT_WANDER_RADIUS);
        let candidate = Vec3::new(home.x + angle.cos() * r, current.y, home.z + angle.sin() * r);
        // Keep out of the lake
        if ground_height(candidate.x, candidate.z) < 0.0 {
            continue;
        }
        if Vec2::new(candidate.x - current.x, candidate.z - current.z).length() >= MOUNT_MIN_TARGET_DIST {
            return candidate;
        }
    }
    home
}

/// Tick wandering mount AI (server-authoritative). Runs after the riding tick so a
/// free mount's walk intent comes from here.
pub fn tick_mount_ai(
    calendar: Query<&WorldCalendar>,
    mut mounts: Query<(
        &Mount,
        &Rideable,
        &MountSeats,
        &MountBody,
        &mut MountPose,
        &mut MountIntent,
        &mut MountWander,
    )>,
) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;
    let total_hours = calendar.iter().next().map_or(0.0, |c| c.total_hours);

    for (mount, rideable, seats, body, mut pose, mut intent, mut wander) in mounts.iter_mut() {
        if !body.alive {
            continue;
        }

        let task = wander.next_task();
        if !rideable.should_execute_ai_task(task, total_hours, seats) {
            if seats.any_mounted() {
                // Wander around wherever the rider left us
                wander.home = pose.position;
            }
            if wander.state == WanderState::Walking {
                wander.state = WanderState::Idle;
                trace!("Mount {} stopped wandering ({:?} blocked)", mount.id, task);
            }
            continue;
        }

        match wander.state {
            WanderState::Idle => {
                wander.idle_timer -= dt;
                if wander.idle_timer <= 0.0 {
                    let home = wander.home;
                    wander.target = pick_wander_target(home, pose.position, &mut wander.rng);
                    wander.state = WanderState::Walking;
                    trace!("Mount {} wandering to {:?}", mount.id, wander.target);
                }
            }
            WanderState::Walking => {
                let to = wander.target - pose.position;
                let to_xz = Vec2::new(to.x, to.z);
                if to_xz.length() < 0.8 || body.collided_horizontally {
                    wander.start_idle();
                    continue;
                }
                let dir = to_xz.normalize_or_zero();
                let target_yaw = dir.x.atan2(dir.y);
                pose.yaw = smooth_rotate_toward(pose.yaw, target_yaw, MOUNT_TURN_SPEED, dt).rem_euclid(TAU);

                // Turn before walking in a new direction
                let facing = Vec2::new(pose.yaw.sin(), pose.yaw.cos());
                let alignment = dir.dot(facing).max(0.0);
                let step = facing * MOUNT_WANDER_SPEED * alignment;
                intent.0.walk = Vec3::new(step.x, 0.0, step.y);
                intent.0.fly = intent.0.walk;
            }
        }
    }
}
