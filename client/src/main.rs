//! Riding Client - Renders mounts and riders and mirrors the riding state locally
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod audio;
mod camera;
mod input;
mod riding;
mod states;
mod systems;
mod ui;

use bevy::prelude::*;
use bevy::audio::{AudioPlugin, SpatialScale};
use bevy::asset::AssetPlugin;
use bevy::window::WindowResolution;
use lightyear::prelude::client::ClientPlugins;
use shared::{
    protocol::*, ProtocolPlugin, RidePolicies, RidingConfigPlugin, SpeciesRegistry, SERVER_ADDR,
    SERVER_PORT, SPECIES_PATH,
};
use std::path::Path;
use states::GameState;

/// Marker component for our client entity
#[derive(Component)]
pub struct GameClient;

/// Get the asset path - for bundled macOS apps, use path relative to executable
fn get_asset_path() -> String {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let bundled_assets = exe_dir.join("assets");
            if bundled_assets.exists() {
                info!("Using bundled assets at: {:?}", bundled_assets);
                return bundled_assets.to_string_lossy().to_string();
            }
        }
    }
    // Fall back to default "assets" folder (for development)
    "assets".to_string()
}

fn main() {
    let asset_path = get_asset_path();

    let mut app = App::new();

    app.add_plugins(DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(Window {
                title: "Hoofbeat".to_string(),
                resolution: WindowResolution::new(1280, 720),
                ..default()
            }),
            ..default()
        })
        .set(AssetPlugin {
            file_path: asset_path,
            ..default()
        })
        // World units are meters; rodio's inverse-square falloff is too steep without scaling.
        .set(AudioPlugin {
            default_spatial_scale: SpatialScale::new(0.2),
            ..default()
        })
    );

    // Game state machine
    app.init_state::<GameState>();

    // Lightyear client plugins (tick_duration = 60Hz)
    app.add_plugins(ClientPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    // Same config and species content as the server, so the local mirror agrees with it
    app.add_plugins(RidingConfigPlugin::default());
    app.insert_resource(SpeciesRegistry::load_or_builtin(Path::new(SPECIES_PATH)));
    app.init_resource::<RidePolicies>();
    app.init_resource::<riding::RideRng>();
    app.init_resource::<input::InputState>();

    // UI plugins
    app.add_plugins(ui::MainMenuPlugin);
    app.add_plugins(ui::PauseMenuPlugin);
    app.add_plugins(ui::ToastPlugin);

    // Hoof loops and one-shots
    app.add_plugins(audio::HoofAudioPlugin);

    app.add_systems(Startup, systems::setup_rendering);

    // Ensure we clean up visuals when entering menu
    app.add_systems(OnEnter(GameState::MainMenu), systems::enter_main_menu);

    // Connection systems
    app.add_systems(OnEnter(GameState::Connecting), systems::start_connection);
    app.add_systems(
        Update,
        systems::check_connection.run_if(in_state(GameState::Connecting)),
    );
    app.add_systems(
        Update,
        systems::watch_disconnect.run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
    );

    app.add_systems(OnEnter(GameState::Playing), systems::spawn_world);

    // Replication-driven spawn/setup must NOT be gated solely to `Playing`.
    // Initial snapshots can arrive while we're still in `Connecting`, which would cause
    // `Added<T>` handlers to miss.
    app.add_systems(
        Update,
        (
            systems::handle_player_spawned,
            systems::handle_mount_spawned,
            riding::attach_riding_state,
            systems::ensure_local_player_tag,
        )
            .chain()
            .run_if(
                in_state(GameState::Connecting)
                    .or(in_state(GameState::Playing))
                    .or(in_state(GameState::Paused)),
            ),
    );

    // Input only while playing; the pause menu owns the keyboard otherwise
    app.add_systems(
        Update,
        (
            input::handle_keyboard_input,
            input::handle_mouse_input,
            systems::grab_cursor,
        )
            .run_if(in_state(GameState::Playing)),
    );

    // Render pose pipeline: mounts, then riders on them, then the camera.
    app.add_systems(
        Update,
        (
            (
                systems::sync_mount_transforms,
                systems::sync_player_transforms,
                camera::update_camera,
            )
                .chain(),
            systems::animate_mount_legs,
            systems::pose_riders,
            riding::update_riding_sounds,
            systems::update_day_night_cycle,
        )
            .run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
    );

    // Fixed tick: send input, then step the local riding mirror
    app.add_systems(
        FixedUpdate,
        (input::send_input_to_server, riding::tick_local_riding)
            .chain()
            .run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
    );

    info!("Starting client, server at {}:{}", SERVER_ADDR, SERVER_PORT);
    app.run();
}
