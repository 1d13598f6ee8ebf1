//! Title screen: server address, ride / exit, and the species this build knows about.

use bevy::prelude::*;
use bevy::app::AppExit;
use shared::SpeciesRegistry;

use crate::states::GameState;
use crate::systems::ServerAddress;
use super::styles::*;

pub struct MainMenuPlugin;

impl Plugin for MainMenuPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ServerAddress>();

        app.add_systems(OnEnter(GameState::MainMenu), spawn_main_menu);
        app.add_systems(OnExit(GameState::MainMenu), despawn_main_menu);
        app.add_systems(
            Update,
            (button_interactions, handle_menu_input).run_if(in_state(GameState::MainMenu)),
        );
    }
}

#[derive(Component)]
struct MainMenuRoot;

#[derive(Component, Clone, Copy)]
enum MenuButton {
    Ride,
    Exit,
}

/// "horse, elk" style list of loaded species, sorted.
pub fn species_line(species: &SpeciesRegistry) -> String {
    let mut names: Vec<&str> = species.names().collect();
    names.sort_unstable();
    if names.is_empty() {
        return "No rideable species loaded".to_string();
    }
    format!("Rideable: {}", names.join(", "))
}

fn muted_line(text: String, font_size: f32, margin: UiRect) -> impl Bundle {
    (
        Text::new(text),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(TEXT_MUTED),
        Node {
            margin,
            ..default()
        },
    )
}

fn spawn_main_menu(
    mut commands: Commands,
    server_address: Res<ServerAddress>,
    species: Res<SpeciesRegistry>,
) {
    commands
        .spawn((
            MainMenuRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(MENU_BACKGROUND),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("HOOFBEAT"),
                title_text_style(),
                TextColor(ACCENT_COLOR),
                Node {
                    margin: UiRect::bottom(Val::Px(16.0)),
                    ..default()
                },
            ));
            parent.spawn(muted_line(
                format!("Server {}", server_address.0),
                16.0,
                UiRect::bottom(Val::Px(6.0)),
            ));
            parent.spawn(muted_line(species_line(&species), 14.0, UiRect::bottom(Val::Px(30.0))));

            spawn_button(parent, "RIDE", MenuButton::Ride);
            spawn_button(parent, "EXIT", MenuButton::Exit);

            parent.spawn(muted_line(
                "WASD move | Ctrl gait | Space jump | E mount / dismount".to_string(),
                14.0,
                UiRect::top(Val::Px(40.0)),
            ));
        });
}

fn despawn_main_menu(mut commands: Commands, query: Query<Entity, With<MainMenuRoot>>) {
    for entity in query.iter() {
        commands.entity(entity).despawn();
    }
}

/// Buttons, or Enter as a shortcut for RIDE
fn handle_menu_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    buttons: Query<(&Interaction, &MenuButton), Changed<Interaction>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit_writer: MessageWriter<AppExit>,
) {
    let pressed = buttons
        .iter()
        .find(|(interaction, _)| **interaction == Interaction::Pressed)
        .map(|(_, action)| *action)
        .or_else(|| keyboard.just_pressed(KeyCode::Enter).then_some(MenuButton::Ride));

    match pressed {
        Some(MenuButton::Ride) => {
            next_state.set(GameState::Connecting);
        }
        Some(MenuButton::Exit) => {
            info!("Exit pressed - quitting game");
            exit_writer.write(AppExit::Success);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_line_lists_builtin_species() {
        let line = species_line(&SpeciesRegistry::builtin());
        assert!(line.starts_with("Rideable: "));
        assert!(line.contains("horse"));
        assert_eq!(species_line(&SpeciesRegistry::default()), "No rideable species loaded");
    }
}
