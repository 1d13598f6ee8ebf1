//! Connection systems
//!
//! Networking, connection handling, cursor management, and menu transitions.

use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};
use lightyear::prelude::*;
use lightyear::prelude::client::*;
use shared::{Mount, MountPacket, Player, PlayerInput, RideRejected, PRIVATE_KEY, PROTOCOL_ID, SERVER_ADDR, SERVER_PORT};
use std::net::SocketAddr;

use crate::states::GameState;
use super::world::ClientWorldRoot;

// =============================================================================
// CONNECTION
// =============================================================================

/// Where to connect. `HOOFBEAT_SERVER` overrides the default `ip:port`.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ServerAddress(pub String);

impl Default for ServerAddress {
    fn default() -> Self {
        let addr = std::env::var("HOOFBEAT_SERVER")
            .unwrap_or_else(|_| format!("{}:{}", SERVER_ADDR, SERVER_PORT));
        Self(addr)
    }
}

/// Start connection to server
/// In Lightyear 0.25, we spawn a Client entity with the appropriate networking components
/// and then trigger the Connect event to initiate the connection
pub fn start_connection(
    mut commands: Commands,
    existing_clients: Query<Entity, With<crate::GameClient>>,
    server_address: Res<ServerAddress>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    info!("Initiating connection to server at {}...", server_address.0);

    // Ensure we only ever have ONE GameClient entity, or `single()` lookups start failing.
    for e in existing_clients.iter() {
        commands.entity(e).despawn();
    }

    let server_addr: SocketAddr = match server_address.0.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address {}: {}", server_address.0, e);
            next_state.set(GameState::MainMenu);
            return;
        }
    };
    let local_addr = SocketAddr::from(([0, 0, 0, 0], 0));

    let client_id = rand::random::<u64>();

    // Build authentication (netcode connect token)
    let auth = Authentication::Manual {
        server_addr,
        protocol_id: PROTOCOL_ID,
        private_key: PRIVATE_KEY,
        client_id,
    };
    let netcode = match NetcodeClient::new(auth, NetcodeConfig::default()) {
        Ok(netcode) => netcode,
        Err(e) => {
            error!("Failed to create netcode client: {:?}", e);
            next_state.set(GameState::MainMenu);
            return;
        }
    };

    // Spawn client entity with UDP + Netcode
    let client_entity = commands
        .spawn((
            crate::GameClient,
            Client::default(),
            UdpIo::default(),
            LocalAddr(local_addr),
            PeerAddr(server_addr),
            netcode,
            // IMPORTANT: enable replication receive on this client.
            ReplicationReceiver::default(),
            // Client -> Server
            MessageSender::<PlayerInput>::default(),
            MessageSender::<MountPacket>::default(),
            // Server -> Client
            MessageReceiver::<RideRejected>::default(),
        ))
        .id();

    // Trigger the Connect event to actually initiate the connection
    commands.trigger(Connect { entity: client_entity });

    info!("Client entity spawned, client_id: {}", client_id);
}

/// Check connection status
/// In Lightyear 0.25, we query for Connected/Disconnected components on the client entity
pub fn check_connection(
    mut next_state: ResMut<NextState<GameState>>,
    new_connections: Query<Entity, (With<crate::GameClient>, Added<Connected>)>,
    new_disconnections: Query<Entity, (With<crate::GameClient>, Added<Disconnected>)>,
) {
    for _entity in new_connections.iter() {
        info!("Connected to server!");
        next_state.set(GameState::Playing);
    }

    for _entity in new_disconnections.iter() {
        warn!("Connection failed or disconnected");
        next_state.set(GameState::MainMenu);
    }
}

/// Drop back to the menu if the server goes away mid-game
pub fn watch_disconnect(
    mut next_state: ResMut<NextState<GameState>>,
    lost: Query<Entity, (With<crate::GameClient>, Added<Disconnected>)>,
) {
    if !lost.is_empty() {
        warn!("Lost connection to server");
        next_state.set(GameState::MainMenu);
    }
}

// =============================================================================
// CURSOR
// =============================================================================

/// Grab cursor for mouse look
pub fn grab_cursor(
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
    mouse_button: Res<ButtonInput<MouseButton>>,
) {
    let Ok(window_entity) = windows.single() else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Ok(mut cursor) = cursor_opts.get_mut(window_entity) {
            cursor.grab_mode = CursorGrabMode::Locked;
            cursor.visible = false;
        }
    }
}

pub fn release_cursor(
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
) {
    if let Ok(window_entity) = windows.single() {
        if let Ok(mut cursor) = cursor_opts.get_mut(window_entity) {
            cursor.grab_mode = CursorGrabMode::None;
            cursor.visible = true;
        }
    }
}

// =============================================================================
// MENU TRANSITIONS
// =============================================================================

/// Entering the main menu: release the cursor and drop every replicated leftover
pub fn enter_main_menu(
    mut commands: Commands,
    windows: Query<Entity, With<PrimaryWindow>>,
    cursor_opts: Query<&mut CursorOptions>,
    world_roots: Query<Entity, With<ClientWorldRoot>>,
    players: Query<Entity, With<Player>>,
    mounts: Query<Entity, With<Mount>>,
) {
    release_cursor(windows, cursor_opts);

    for entity in world_roots.iter().chain(players.iter()).chain(mounts.iter()) {
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_address_parses() {
        let addr = format!("{}:{}", SERVER_ADDR, SERVER_PORT);
        assert!(addr.parse::<SocketAddr>().is_ok());
    }
}
