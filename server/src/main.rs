//! Riding Server - Headless Bevy app that owns every mount
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod mounts;
mod persistence;
mod systems;
mod world;

use bevy::prelude::*;
use bevy::app::ScheduleRunnerPlugin;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
// UDP/Netcode types re-exported through prelude::server (when features enabled)
use shared::{
    protocol::*, FatigueHooks, ProtocolPlugin, RidePolicies, RidingConfigPlugin, SpeciesRegistry,
    MOD_ID, PRIVATE_KEY, PROTOCOL_ID, SERVER_PORT, SPECIES_PATH, get_server_bind_addr,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use persistence::MountStore;
use systems::ClientInputs;

/// Marker for our server entity
#[derive(Component)]
struct GameServer;

/// Spawn the server entity with all required networking components
fn spawn_server(mut commands: Commands) {
    let bind_addr = get_server_bind_addr();
    let server_addr: SocketAddr = match format!("{}:{}", bind_addr, SERVER_PORT).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server bind address {}:{}: {}", bind_addr, SERVER_PORT, e);
            return;
        }
    };

    info!("Spawning server entity, binding to {:?}", server_addr);

    // Spawn server entity with UDP + Netcode
    commands.spawn((
        GameServer,
        Server::default(),
        ServerUdpIo::default(),
        LocalAddr(server_addr),
        NetcodeServer::new(NetcodeConfig {
            protocol_id: PROTOCOL_ID,
            private_key: PRIVATE_KEY,
            ..default()
        }),
    ));
}

/// Start the server after it's spawned
fn start_server(
    mut commands: Commands,
    server_query: Query<Entity, (With<GameServer>, Without<Started>, Without<Starting>)>,
) {
    for server_entity in server_query.iter() {
        info!("Starting server...");
        // In Bevy 0.17 + Lightyear 0.25, trigger an EntityEvent
        commands.trigger(Start { entity: server_entity });
    }
}

/// Check if server is started (run condition)
fn server_is_started(server_query: Query<(), (With<GameServer>, With<Started>)>) -> bool {
    !server_query.is_empty()
}

fn main() {
    let mut app = App::new();

    // Headless plugins (no rendering)
    // IMPORTANT: run the main loop at the same rate as our fixed tick.
    //
    // If the headless app runs "as fast as possible", Bevy will clear `MessageReceiver` buffers every
    // frame (in `Last`), but our riding systems read messages in `FixedUpdate`.
    // When frames >> fixed ticks, most input and gait packets get cleared before `FixedUpdate` runs.
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());
    app.add_plugins(bevy::state::app::StatesPlugin);

    // Riding config (RON, hot reloaded) and per-species content
    app.add_plugins(RidingConfigPlugin::default());
    app.insert_resource(SpeciesRegistry::load_or_builtin(Path::new(SPECIES_PATH)));
    app.init_resource::<RidePolicies>();
    app.init_resource::<FatigueHooks>();

    // Saved mount state
    let save_dir = std::env::var("HOOFBEAT_SAVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("saves").join(MOD_ID));
    app.insert_resource(MountStore::open(save_dir));

    // Server-side input cache
    app.init_resource::<ClientInputs>();

    // Lightyear server plugins (tick_duration = 60Hz)
    app.add_plugins(ServerPlugins {
        tick_duration: tick_duration(),
    });

    // Protocol plugin (component/message registration)
    app.add_plugins(ProtocolPlugin);

    app.add_systems(Startup, spawn_server);

    // Start server after spawning
    app.add_systems(Update, start_server);

    // Spawn the calendar and mounts after server is started
    app.add_systems(
        Update,
        (world::spawn_calendar_once, mounts::spawn_mounts_once)
            .chain()
            .run_if(server_is_started),
    );

    app.add_observer(systems::handle_disconnections);

    // Fixed tick: receive inputs, handle interactions, then simulate every mount and rider.
    app.add_systems(
        FixedUpdate,
        (
            world::tick_calendar,
            systems::handle_connections,
            systems::receive_client_input,
            systems::handle_mount_interactions,
            systems::apply_seat_controls,
            systems::receive_mount_packets,
            systems::tick_stamina,
            systems::tick_riding,
            // Mount AI (only while nobody rides and the wander block has passed)
            mounts::tick_mount_ai,
            systems::simulate_mounts,
            systems::sync_riders,
            systems::simulate_players,
            persistence::autosave_mounts,
        )
            .chain()
            .run_if(server_is_started),
    );

    info!("Starting riding server on port {}", SERVER_PORT);
    app.run();
}
