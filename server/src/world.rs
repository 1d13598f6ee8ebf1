//! World calendar management
//!
//! Updated for Lightyear 0.25

use bevy::prelude::*;
use lightyear::prelude::*;
use shared::WorldCalendar;

use crate::persistence::MountStore;

/// One-shot resource to ensure we only spawn the calendar once.
#[derive(Resource)]
pub struct CalendarSpawned;

/// Spawn the server-authoritative calendar replicated to all clients, resuming the saved
/// time so dismount timestamps stay meaningful across restarts.
///
/// This should run **after** the server has started networking, so clients actually receive it.
pub fn spawn_calendar_once(
    mut commands: Commands,
    store: Res<MountStore>,
    spawned: Option<Res<CalendarSpawned>>,
) {
    if spawned.is_some() {
        return;
    }
    commands.insert_resource(CalendarSpawned);

    let mut calendar = WorldCalendar::new_default();
    if let Some(world) = &store.world {
        calendar.total_hours = world.total_hours;
    }
    info!(
        "Spawned world calendar at {:.2}h ({}x speed) replicated to all clients",
        calendar.total_hours,
        calendar.time_scale()
    );

    commands.spawn((
        calendar,
        Replicate::new(ReplicationMode::SingleServer(NetworkTarget::All)),
    ));
}

/// Advance the calendar every fixed tick (server-authoritative).
pub fn tick_calendar(mut calendars: Query<&mut WorldCalendar>) {
    let dt = 1.0 / shared::FIXED_TIMESTEP_HZ as f32;
    for mut calendar in calendars.iter_mut() {
        calendar.advance(dt);
    }
}
