//! Escape menu
//!
//! Pausing keeps the connection. The client sends idle input, so the mount halts, and the
//! hoof loops pause in place. While seated the menu shows the mount's gait and stamina and
//! offers a dismount.

use bevy::prelude::*;
use bevy::app::AppExit;
use lightyear::prelude::client::*;
use shared::{Gait, LocalPlayer, Mount, MountGait, Riding, StaminaState};

use crate::input::InputState;
use crate::states::GameState;
use crate::GameClient;
use super::styles::*;

pub struct PauseMenuPlugin;

impl Plugin for PauseMenuPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Paused),
            (spawn_pause_menu, crate::systems::release_cursor),
        );
        app.add_systems(OnExit(GameState::Paused), despawn_pause_menu);
        app.add_systems(
            Update,
            (button_interactions, handle_pause_actions).run_if(in_state(GameState::Paused)),
        );
        app.add_systems(
            Update,
            toggle_pause.run_if(in_state(GameState::Playing).or(in_state(GameState::Paused))),
        );
    }
}

#[derive(Component)]
struct PauseMenuRoot;

#[derive(Component, Clone, Copy)]
enum PauseButton {
    Resume,
    Dismount,
    Leave,
    Exit,
}

/// One line describing the mount the local player sits on.
pub fn ride_status(species: &str, gait: Gait, stamina: &StaminaState) -> String {
    let gait = match gait {
        Gait::Walk => "walking",
        Gait::Canter => "cantering",
        Gait::Gallop => "galloping",
    };
    let percent = if stamina.max_stamina() > 0.0 {
        (stamina.stamina() / stamina.max_stamina() * 100.0).round()
    } else {
        0.0
    };
    format!("Riding a {}, {} ({}% stamina)", species, gait, percent)
}

fn spawn_pause_menu(
    mut commands: Commands,
    local: Query<&Riding, With<LocalPlayer>>,
    mounts: Query<(&Mount, &MountGait, &StaminaState)>,
) {
    let status = local.iter().next().and_then(|riding| {
        mounts
            .iter()
            .find(|(mount, _, _)| mount.id == riding.mount_id)
            .map(|(mount, gait, stamina)| ride_status(&mount.species, gait.0, stamina))
    });

    commands
        .spawn((
            PauseMenuRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.7)),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("PAUSED"),
                title_text_style(),
                TextColor(TEXT_COLOR),
                Node {
                    margin: UiRect::bottom(Val::Px(12.0)),
                    ..default()
                },
            ));
            parent.spawn((
                Text::new(status.clone().unwrap_or_else(|| "On foot".to_string())),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(TEXT_MUTED),
                Node {
                    margin: UiRect::bottom(Val::Px(28.0)),
                    ..default()
                },
            ));

            spawn_button(parent, "RESUME", PauseButton::Resume);
            if status.is_some() {
                spawn_button(parent, "DISMOUNT", PauseButton::Dismount);
            }
            spawn_button(parent, "LEAVE SERVER", PauseButton::Leave);
            spawn_button(parent, "EXIT GAME", PauseButton::Exit);
        });
}

fn despawn_pause_menu(mut commands: Commands, query: Query<Entity, With<PauseMenuRoot>>) {
    for entity in query.iter() {
        commands.entity(entity).despawn();
    }
}

fn handle_pause_actions(
    buttons: Query<(&Interaction, &PauseButton), Changed<Interaction>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut input: ResMut<InputState>,
    mut exit: MessageWriter<AppExit>,
    mut commands: Commands,
    client_query: Query<Entity, With<GameClient>>,
) {
    for (interaction, action) in buttons.iter() {
        if *interaction != Interaction::Pressed {
            continue;
        }
        match action {
            PauseButton::Resume => next_state.set(GameState::Playing),
            PauseButton::Dismount => {
                // Carried by the next tick's input like a press of E
                input.interact = true;
                next_state.set(GameState::Playing);
            }
            PauseButton::Leave => {
                info!("Leaving server");
                if let Some(client_entity) = client_query.iter().next() {
                    commands.trigger(Disconnect { entity: client_entity });
                }
                next_state.set(GameState::MainMenu);
            }
            PauseButton::Exit => {
                info!("Exiting game...");
                exit.write(AppExit::Success);
            }
        }
    }
}

fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }
    match state.get() {
        GameState::Playing => next_state.set(GameState::Paused),
        GameState::Paused => next_state.set(GameState::Playing),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StaminaDefaults;

    #[test]
    fn test_ride_status() {
        let mut stamina = StaminaState::new(&StaminaDefaults::default());
        stamina.set_stamina(stamina.max_stamina() * 0.5);
        assert_eq!(
            ride_status("horse", Gait::Canter, &stamina),
            "Riding a horse, cantering (50% stamina)"
        );
    }
}
