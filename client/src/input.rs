//! Player input handling
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use lightyear::prelude::*;
use shared::{InputChannel, PlayerInput, SeatControls, MOUSE_SENSITIVITY};
use std::f32::consts::FRAC_PI_2;

use crate::states::GameState;

/// Client-side input state
#[derive(Resource, Default)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Jump request (spacebar)
    pub jump: bool,
    /// Gait key (left control). Cycles Walk / Canter / Gallop while riding.
    pub sprint: bool,
    /// Mouse-controlled yaw (orbits the camera, steers on foot)
    pub yaw: f32,
    /// Mouse-controlled pitch
    pub pitch: f32,
    /// Latched on key press, cleared once a tick has carried it to the server.
    pub interact: bool,
}

impl InputState {
    /// Snapshot of the keys that matter to a seat.
    pub fn seat_controls(&self) -> SeatControls {
        SeatControls {
            forward: self.forward,
            backward: self.backward,
            left: self.left,
            right: self.right,
            jump: self.jump,
            sprint: self.sprint,
        }
    }

    /// The message for this tick. Paused clients send an idle input so the mount stops; a
    /// dismount requested from the pause menu still goes through.
    pub fn to_player_input(&self, paused: bool) -> PlayerInput {
        if paused {
            return PlayerInput {
                yaw: self.yaw,
                interact: self.interact,
                ..default()
            };
        }
        PlayerInput {
            forward: self.forward,
            backward: self.backward,
            left: self.left,
            right: self.right,
            jump: self.jump,
            sprint: self.sprint,
            yaw: self.yaw,
            interact: self.interact,
        }
    }
}

/// Handle keyboard input for movement
pub fn handle_keyboard_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut input_state: ResMut<InputState>,
) {
    input_state.forward = keyboard.pressed(KeyCode::KeyW);
    input_state.backward = keyboard.pressed(KeyCode::KeyS);
    input_state.left = keyboard.pressed(KeyCode::KeyA);
    input_state.right = keyboard.pressed(KeyCode::KeyD);
    input_state.jump = keyboard.pressed(KeyCode::Space);
    input_state.sprint = keyboard.pressed(KeyCode::ControlLeft);

    // Update runs faster than the fixed tick; keep the press until it is sent.
    if keyboard.just_pressed(KeyCode::KeyE) {
        input_state.interact = true;
    }
}

/// Handle mouse input for looking around
pub fn handle_mouse_input(
    mut mouse_motion: MessageReader<MouseMotion>,
    mut input_state: ResMut<InputState>,
) {
    let mut delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        delta += motion.delta;
    }

    if delta != Vec2::ZERO {
        input_state.yaw -= delta.x * MOUSE_SENSITIVITY;
        input_state.pitch -= delta.y * MOUSE_SENSITIVITY;
        input_state.pitch = input_state.pitch.clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);
    }
}

/// Send input to server
pub fn send_input_to_server(
    mut input_state: ResMut<InputState>,
    game_state: Res<State<GameState>>,
    // In Lightyear 0.25, send messages via MessageSender component - typed on message type
    mut client_query: Query<&mut MessageSender<PlayerInput>, (With<crate::GameClient>, With<Connected>)>,
    time: Res<Time>,
    mut last_warn_time: Local<f32>,
) {
    let Ok(mut sender) = client_query.single_mut() else {
        // If this fires, input will *never* reach the server, so movement will be frozen.
        let now = time.elapsed_secs();
        if now - *last_warn_time > 1.0 {
            warn!("send_input_to_server: missing GameClient+Connected+MessageSender<PlayerInput>; not sending inputs");
            *last_warn_time = now;
        }
        return;
    };

    let paused = game_state.get() == &GameState::Paused;
    sender.send::<InputChannel>(input_state.to_player_input(paused));
    input_state.interact = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_input_is_idle() {
        let state = InputState {
            forward: true,
            sprint: true,
            interact: true,
            yaw: 1.25,
            ..default()
        };
        let input = state.to_player_input(true);
        assert!(!input.forward && !input.sprint);
        assert!(input.interact);
        assert_eq!(input.yaw, 1.25);

        let live = state.to_player_input(false);
        assert!(live.forward && live.sprint && live.interact);
        assert_eq!(live.seat_controls(), state.seat_controls());
    }
}
